//! LocalRunner: split, group and assemble on a single host.
//!
//! Input files are split concurrently, at most `worker_count` at a time. The
//! resulting sub-blocks are grouped in memory by partition and chunk, then one
//! assembler task per partition walks its chunks in ascending id order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::assembler::{AssemblerOptions, AssemblyReport, ChunkAssembler};
use crate::config::{MANIFEST_FILE, RunConfig};
use crate::error::RechunkError;
use crate::geometry::{ChunkGrid, ChunkId};
use crate::partition::{ChunkPartitioner, PartitionIndex};
use crate::record::{SubBlock, read_entries};
use crate::splitter::{RecordSplitter, SplitStats};
use crate::store::{ArtifactStore, ArtifactWriter, LocalFsArtifactStore, part_name};

type ChunkGroups = BTreeMap<PartitionIndex, BTreeMap<ChunkId, Vec<SubBlock>>>;

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files: usize,
    pub stats: SplitStats,
    /// Partitions the partitioner defines for this grid and mode.
    pub partitions: u64,
    pub assembler_invocations: u64,
    /// Bypass part files written.
    pub parts: usize,
    /// One report per assembled chunk, in ascending chunk id.
    pub reports: Vec<AssemblyReport>,
}

impl RunSummary {
    pub fn chunks(&self) -> usize {
        self.reports.len()
    }
}

/// Split output of one input file.
struct FileSplit {
    index: usize,
    stats: SplitStats,
    blocks: Vec<(ChunkId, SubBlock)>,
}

pub struct LocalRunner {
    cfg: RunConfig,
}

impl LocalRunner {
    pub fn new(cfg: RunConfig) -> Self {
        Self { cfg }
    }

    /// Runs against the output directory of the config.
    pub async fn run(&self) -> Result<RunSummary, RechunkError> {
        let store = Arc::new(LocalFsArtifactStore::new(&self.cfg.output_dir));
        self.run_with_store(store).await
    }

    pub async fn run_with_store<S>(&self, store: Arc<S>) -> Result<RunSummary, RechunkError>
    where
        S: ArtifactStore + 'static,
    {
        let grid = Arc::new(self.cfg.grid()?);
        let mode = self.cfg.partition_mode();
        let partitioner = ChunkPartitioner::new(mode, grid.num_chunks());
        let files = list_inputs(&self.cfg.input_dir).await?;
        info!(
            files = files.len(),
            chunks = grid.num_chunks(),
            ?mode,
            workers = self.cfg.worker_count,
            "starting rechunk run"
        );

        let splits = self.split_phase(&grid, &files).await?;
        let mut summary = RunSummary {
            files: files.len(),
            partitions: partitioner.partition_count(),
            ..Default::default()
        };
        for s in &splits {
            summary.stats.merge(&s.stats);
        }
        info!(
            records = summary.stats.records,
            skipped = summary.stats.skipped_records,
            sub_blocks = summary.stats.sub_blocks,
            bytes = summary.stats.bytes,
            "split phase done"
        );

        if !mode.groups() {
            summary.parts = write_parts(store.as_ref(), &self.cfg.output_dir, &splits).await?;
        } else {
            let groups = group(&partitioner, splits);
            summary.assembler_invocations = groups.len() as u64;
            summary.reports = self.assemble_phase(grid, store, groups).await?;
        }

        self.write_manifest().await?;
        info!(
            chunks = summary.chunks(),
            assemblers = summary.assembler_invocations,
            parts = summary.parts,
            "rechunk run finished"
        );
        Ok(summary)
    }

    async fn split_phase(
        &self,
        grid: &Arc<ChunkGrid>,
        files: &[PathBuf],
    ) -> Result<Vec<FileSplit>, RechunkError> {
        let sem = Arc::new(Semaphore::new(self.cfg.worker_count));
        let element_size = self.cfg.element_size;
        let mut tasks = JoinSet::new();
        for (index, path) in files.iter().cloned().enumerate() {
            let sem = sem.clone();
            let grid = grid.clone();
            tasks.spawn(async move {
                let _permit = sem
                    .acquire_owned()
                    .await
                    .map_err(|e| RechunkError::Worker(e.to_string()))?;
                let entries = read_entries(&path).await?;
                let (stats, blocks) = tokio::task::spawn_blocking(move || {
                    let mut blocks = Vec::new();
                    let stats = RecordSplitter::new(&grid, element_size)
                        .split_entries(entries, |id, b| blocks.push((id, b)));
                    (stats, blocks)
                })
                .await
                .map_err(|e| RechunkError::Worker(e.to_string()))?;
                debug!(file = %path.display(), records = stats.records, "file split");
                Ok::<_, RechunkError>(FileSplit {
                    index,
                    stats,
                    blocks,
                })
            });
        }

        let mut splits = Vec::with_capacity(files.len());
        while let Some(res) = tasks.join_next().await {
            splits.push(res.map_err(|e| RechunkError::Worker(e.to_string()))??);
        }
        splits.sort_by_key(|s| s.index);
        Ok(splits)
    }

    async fn assemble_phase<S>(
        &self,
        grid: Arc<ChunkGrid>,
        store: Arc<S>,
        groups: ChunkGroups,
    ) -> Result<Vec<AssemblyReport>, RechunkError>
    where
        S: ArtifactStore + 'static,
    {
        let sem = Arc::new(Semaphore::new(self.cfg.worker_count));
        let options = AssemblerOptions::from(&self.cfg);
        let element_size = self.cfg.element_size;
        let max_attempts = self.cfg.max_attempts;
        let mut tasks = JoinSet::new();
        for (partition, chunks) in groups {
            let sem = sem.clone();
            let grid = grid.clone();
            let store = store.clone();
            tasks.spawn(async move {
                let _permit = sem
                    .acquire_owned()
                    .await
                    .map_err(|e| RechunkError::Worker(e.to_string()))?;
                let assembler = ChunkAssembler::new(&grid, store.as_ref(), element_size, options);
                let mut reports = Vec::with_capacity(chunks.len());
                for (chunk_id, blocks) in chunks {
                    reports.push(
                        assemble_with_retry(&assembler, chunk_id, &blocks, max_attempts).await?,
                    );
                }
                debug!(partition, chunks = reports.len(), "assembler finished");
                Ok::<_, RechunkError>(reports)
            });
        }

        let mut reports = Vec::new();
        while let Some(res) = tasks.join_next().await {
            reports.extend(res.map_err(|e| RechunkError::Worker(e.to_string()))??);
        }
        reports.sort_by_key(|r| r.chunk_id);
        Ok(reports)
    }

    async fn write_manifest(&self) -> Result<(), RechunkError> {
        let dir = &self.cfg.output_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| RechunkError::io(dir, e))?;
        let path = dir.join(MANIFEST_FILE);
        tokio::fs::write(&path, self.cfg.to_yaml()?)
            .await
            .map_err(|e| RechunkError::io(&path, e))
    }
}

async fn assemble_with_retry<S: ArtifactStore>(
    assembler: &ChunkAssembler<'_, S>,
    chunk_id: ChunkId,
    blocks: &[SubBlock],
    max_attempts: u32,
) -> Result<AssemblyReport, RechunkError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match assembler.assemble(chunk_id, blocks).await {
            Ok(report) => return Ok(report),
            Err(e) if attempt < max_attempts => {
                warn!(chunk_id, attempt, "assembly failed, retrying: {e}");
            }
            Err(source) => {
                return Err(RechunkError::Artifact {
                    chunk_id,
                    attempts: attempt,
                    source,
                });
            }
        }
    }
}

/// Regular, non-hidden files of `dir`, sorted by name.
pub async fn list_inputs(dir: &Path) -> Result<Vec<PathBuf>, RechunkError> {
    let mut rd = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| RechunkError::io(dir, e))?;
    let mut files = Vec::new();
    while let Some(entry) = rd.next_entry().await.map_err(|e| RechunkError::io(dir, e))? {
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| RechunkError::io(entry.path(), e))?;
        if file_type.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn group(partitioner: &ChunkPartitioner, splits: Vec<FileSplit>) -> ChunkGroups {
    let mut groups = ChunkGroups::new();
    for split in splits {
        for (chunk_id, block) in split.blocks {
            if let Some(p) = partitioner.choose_partition(chunk_id) {
                groups
                    .entry(p)
                    .or_default()
                    .entry(chunk_id)
                    .or_default()
                    .push(block);
            }
        }
    }
    groups
}

/// Bypass mode: each input file's sub-blocks go straight into its own part file.
async fn write_parts<S: ArtifactStore>(
    store: &S,
    output_dir: &Path,
    splits: &[FileSplit],
) -> Result<usize, RechunkError> {
    for split in splits {
        let name = part_name(split.index);
        let path = output_dir.join(&name);
        let mut writer = store
            .create(&name)
            .await
            .map_err(|e| RechunkError::io(&path, e))?;
        for (_, block) in &split.blocks {
            writer
                .append(&block.key(), &block.payload)
                .await
                .map_err(|e| RechunkError::io(&path, e))?;
        }
        writer.finish().await.map_err(|e| RechunkError::io(&path, e))?;
        debug!(part = %name, sub_blocks = split.blocks.len(), "part written");
    }
    Ok(splits.len())
}
