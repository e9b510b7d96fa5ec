//! Routing of chunks to assemblers.

use serde::{Deserialize, Serialize};

use crate::geometry::ChunkId;

pub type PartitionIndex = u64;

/// How sub-blocks are grouped before assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartitionMode {
    /// One assembler per chunk.
    #[default]
    PerChunk,
    /// Every chunk goes to assembler 0.
    SingleAssembler,
    /// No grouping stage: split output is the final output.
    Bypass,
}

impl PartitionMode {
    /// Bypass wins over single-assembler, which wins over per-chunk.
    pub fn from_flags(bypass_assembly: bool, single_assembler: bool) -> Self {
        if bypass_assembly {
            PartitionMode::Bypass
        } else if single_assembler {
            PartitionMode::SingleAssembler
        } else {
            PartitionMode::PerChunk
        }
    }

    pub fn groups(self) -> bool {
        self != PartitionMode::Bypass
    }
}

/// Partition owning `chunk_id`, or `None` when the mode has no grouping stage.
///
/// Depends on nothing but `chunk_id` and `mode`, so every sub-block of a
/// chunk lands in the same partition.
pub fn choose_partition(chunk_id: ChunkId, mode: PartitionMode) -> Option<PartitionIndex> {
    match mode {
        PartitionMode::PerChunk => Some(chunk_id),
        PartitionMode::SingleAssembler => Some(0),
        PartitionMode::Bypass => None,
    }
}

/// Partitioner bound to a grid size.
#[derive(Debug, Clone, Copy)]
pub struct ChunkPartitioner {
    mode: PartitionMode,
    num_chunks: u64,
}

impl ChunkPartitioner {
    pub fn new(mode: PartitionMode, num_chunks: u64) -> Self {
        Self { mode, num_chunks }
    }

    pub fn mode(&self) -> PartitionMode {
        self.mode
    }

    /// Number of assemblers the mode calls for.
    pub fn partition_count(&self) -> u64 {
        match self.mode {
            PartitionMode::PerChunk => self.num_chunks,
            PartitionMode::SingleAssembler => 1,
            PartitionMode::Bypass => 0,
        }
    }

    pub fn choose_partition(&self, chunk_id: ChunkId) -> Option<PartitionIndex> {
        debug_assert!(chunk_id < self.num_chunks);
        choose_partition(chunk_id, self.mode)
    }
}
