//! Rechunking of N-dimensional datasets: records are split along a regular
//! chunk grid and the pieces reassembled into one artifact per chunk.

pub mod assembler;
pub mod config;
pub mod error;
pub mod generate;
pub mod geometry;
pub mod key;
pub mod partition;
pub mod record;
pub mod runner;
pub mod splitter;
pub mod store;

pub use assembler::{AssemblerOptions, AssemblyReport, ChunkAssembler, Coverage};
pub use config::RunConfig;
pub use error::{ConfigError, FormatError, RecordError, RechunkError};
pub use geometry::{ChunkGrid, ChunkId, HyperRectangle};
pub use partition::{ChunkPartitioner, PartitionMode};
pub use record::{Record, SubBlock};
pub use runner::{LocalRunner, RunSummary};
pub use splitter::{RecordSplitter, SplitStats};
