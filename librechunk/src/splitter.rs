//! RecordSplitter: cuts one record into one sub-block per overlapping chunk.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::geometry::{ChunkGrid, ChunkId, extract_sub_block, intersect};
use crate::record::{Entry, Record, SubBlock};

/// Counters of one split pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SplitStats {
    pub records: u64,
    /// Records dropped because their key or payload could not be decoded.
    pub skipped_records: u64,
    pub sub_blocks: u64,
    pub bytes: u64,
}

impl SplitStats {
    pub fn merge(&mut self, other: &SplitStats) {
        self.records += other.records;
        self.skipped_records += other.skipped_records;
        self.sub_blocks += other.sub_blocks;
        self.bytes += other.bytes;
    }
}

pub struct RecordSplitter<'a> {
    grid: &'a ChunkGrid,
    element_size: usize,
}

impl<'a> RecordSplitter<'a> {
    pub fn new(grid: &'a ChunkGrid, element_size: usize) -> Self {
        Self { grid, element_size }
    }

    /// Sub-blocks of `record`, in row-major chunk order. Chunks the record
    /// does not touch are skipped; the record itself is left untouched.
    pub fn process<'r>(&'r self, record: &'r Record) -> impl Iterator<Item = (ChunkId, SubBlock)> + 'r {
        let bbox = record.bbox();
        self.grid.overlapping(bbox).filter_map(move |chunk| {
            let overlap = intersect(bbox, &chunk)?;
            let chunk_relative_offset = overlap.relative_offset(&chunk);
            let payload = if &overlap == bbox {
                record.payload().clone()
            } else {
                let record_relative_offset = overlap.relative_offset(bbox);
                let mut buf = vec![0u8; overlap.volume() as usize * self.element_size];
                extract_sub_block(
                    record.payload(),
                    bbox.length(),
                    &mut buf,
                    &record_relative_offset,
                    overlap.length(),
                    self.element_size,
                );
                Bytes::from(buf)
            };
            let chunk_id = self.grid.chunk_id_of(&chunk);
            debug!(
                chunk_id,
                chunk = %chunk,
                sub_block = %overlap,
                bytes = payload.len(),
                "split"
            );
            Some((
                chunk_id,
                SubBlock {
                    absolute_box: overlap,
                    chunk_relative_offset,
                    payload,
                },
            ))
        })
    }

    /// Splits every entry of a container, handing sub-blocks to `sink`.
    /// Undecodable records are logged, counted and skipped.
    pub fn split_entries<I, F>(&self, entries: I, mut sink: F) -> SplitStats
    where
        I: IntoIterator<Item = Entry>,
        F: FnMut(ChunkId, SubBlock),
    {
        let mut stats = SplitStats::default();
        for entry in entries {
            stats.records += 1;
            let record =
                match Record::from_entry(entry, self.grid.dimensions(), self.element_size) {
                    Ok(r) => r,
                    Err(e) => {
                        warn!("skipping record: {e}");
                        stats.skipped_records += 1;
                        continue;
                    }
                };
            for (chunk_id, block) in self.process(&record) {
                stats.sub_blocks += 1;
                stats.bytes += block.payload.len() as u64;
                sink(chunk_id, block);
            }
        }
        stats
    }
}

/// Split one record against `grid`.
pub fn split(record: &Record, grid: &ChunkGrid, element_size: usize) -> Vec<(ChunkId, SubBlock)> {
    RecordSplitter::new(grid, element_size).process(record).collect()
}
