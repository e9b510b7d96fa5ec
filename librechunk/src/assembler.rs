//! ChunkAssembler: validates and persists the complete sub-block set of a chunk.
//!
//! Sub-blocks of one chunk arrive in no particular order. Validation is
//! order-independent (counts, coverage, and a checksum over the dense chunk)
//! and persistence appends entries in arrival order to a single artifact.

use std::io;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::geometry::{ChunkGrid, ChunkId, HyperRectangle, embed_sub_block, intersect};
use crate::record::SubBlock;
use crate::store::{ArtifactStore, ArtifactWriter, artifact_name};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerOptions {
    /// Persist an artifact per chunk; otherwise validate only.
    pub write_enabled: bool,
    /// Compute a SHA-256 of the materialised chunk. Skipped when sub-blocks
    /// overlap or spill out of the chunk.
    pub checksum: bool,
    /// Artificial delay before finalizing a chunk.
    pub delay: Duration,
}

impl From<&RunConfig> for AssemblerOptions {
    fn from(cfg: &RunConfig) -> Self {
        Self {
            write_enabled: cfg.write_enabled,
            checksum: cfg.checksum,
            delay: cfg.assembler_delay(),
        }
    }
}

/// How the sub-blocks of a chunk tile the chunk box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coverage {
    Complete,
    /// Elements of the chunk no sub-block covers.
    Gaps { missing: u64 },
    /// Elements covered by more than one sub-block.
    Overlaps { duplicated: u64 },
    /// A sub-block reaching outside the chunk.
    OutOfBounds { key: String },
}

impl Coverage {
    /// Every sub-block lies inside the chunk and no two of them overlap.
    pub fn is_disjoint(&self) -> bool {
        matches!(self, Coverage::Complete | Coverage::Gaps { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyReport {
    pub chunk_id: ChunkId,
    pub sub_blocks: usize,
    pub bytes: u64,
    pub coverage: Coverage,
    pub checksum: Option<String>,
    pub persisted: bool,
}

pub struct ChunkAssembler<'a, S: ArtifactStore> {
    grid: &'a ChunkGrid,
    store: &'a S,
    element_size: usize,
    options: AssemblerOptions,
}

impl<'a, S: ArtifactStore> ChunkAssembler<'a, S> {
    pub fn new(
        grid: &'a ChunkGrid,
        store: &'a S,
        element_size: usize,
        options: AssemblerOptions,
    ) -> Self {
        Self {
            grid,
            store,
            element_size,
            options,
        }
    }

    /// Runs one assembly attempt. Each call writes a fresh artifact, so a
    /// retry after a failure never appends to the earlier attempt.
    pub async fn assemble(&self, chunk_id: ChunkId, blocks: &[SubBlock]) -> io::Result<AssemblyReport> {
        let chunk = self.grid.chunk_at(chunk_id).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("chunk {chunk_id} is outside a grid of {} chunks", self.grid.num_chunks()),
            )
        })?;

        let coverage = coverage(&chunk, blocks);
        if coverage != Coverage::Complete {
            warn!(chunk_id, chunk = %chunk, ?coverage, "chunk is not exactly covered");
        }
        let checksum = if self.options.checksum && coverage.is_disjoint() {
            Some(self.checksum(&chunk, blocks))
        } else {
            None
        };

        let mut writer = if self.options.write_enabled {
            Some(self.store.create(&artifact_name(chunk_id)).await?)
        } else {
            None
        };
        let mut bytes = 0u64;
        for block in blocks {
            bytes += block.payload.len() as u64;
            let key = block.key();
            debug!(chunk_id, sub_block = %key, bytes = block.payload.len(), "assemble");
            if let Some(w) = writer.as_mut() {
                w.append(&key, &block.payload).await?;
            }
        }

        if !self.options.delay.is_zero() {
            tokio::time::sleep(self.options.delay).await;
        }
        if let Some(w) = writer.as_mut() {
            w.finish().await?;
        }

        info!(
            chunk_id,
            sub_blocks = blocks.len(),
            bytes,
            persisted = self.options.write_enabled,
            "chunk assembled"
        );
        Ok(AssemblyReport {
            chunk_id,
            sub_blocks: blocks.len(),
            bytes,
            coverage,
            checksum,
            persisted: self.options.write_enabled,
        })
    }

    /// SHA-256 of the dense chunk with every sub-block embedded at its
    /// relative offset. Independent of arrival order as long as the
    /// sub-blocks are disjoint.
    fn checksum(&self, chunk: &HyperRectangle, blocks: &[SubBlock]) -> String {
        let mut dense = vec![0u8; chunk.volume() as usize * self.element_size];
        for block in blocks {
            embed_sub_block(
                &block.payload,
                block.absolute_box.length(),
                &mut dense,
                chunk.length(),
                &block.chunk_relative_offset,
                self.element_size,
            );
        }
        hex::encode(Sha256::digest(&dense))
    }
}

/// Single assembly attempt for `chunk_id` with the options of `cfg`.
pub async fn assemble<S: ArtifactStore>(
    chunk_id: ChunkId,
    blocks: &[SubBlock],
    grid: &ChunkGrid,
    store: &S,
    cfg: &RunConfig,
) -> io::Result<AssemblyReport> {
    ChunkAssembler::new(grid, store, cfg.element_size, cfg.into())
        .assemble(chunk_id, blocks)
        .await
}

/// Checks that the union of the sub-block boxes is exactly `chunk`.
pub fn coverage(chunk: &HyperRectangle, blocks: &[SubBlock]) -> Coverage {
    if let Some(b) = blocks.iter().find(|b| !chunk.contains(&b.absolute_box)) {
        return Coverage::OutOfBounds { key: b.key() };
    }
    let mut duplicated = 0u64;
    for (i, a) in blocks.iter().enumerate() {
        for b in &blocks[i + 1..] {
            if let Some(overlap) = intersect(&a.absolute_box, &b.absolute_box) {
                duplicated += overlap.volume();
            }
        }
    }
    if duplicated > 0 {
        return Coverage::Overlaps { duplicated };
    }
    let covered: u64 = blocks.iter().map(|b| b.absolute_box.volume()).sum();
    match chunk.volume() - covered {
        0 => Coverage::Complete,
        missing => Coverage::Gaps { missing },
    }
}
