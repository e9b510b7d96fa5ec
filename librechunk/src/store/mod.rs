//! Artifact persistence.
//!
//! An artifact is a named container of `(sub-block key, payload)` entries in
//! write order. Writers are single-use: `create` always starts from an empty
//! artifact (a retry never sees a previous attempt's entries) and `finish`
//! publishes it exactly once.
//!
//! Submodules:
//! - `localfs`: one file per artifact under a root directory
//! - `memory`: in-process store for tests and dry runs
pub mod localfs;
pub mod memory;

use std::io;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::RechunkError;
use crate::geometry::ChunkId;
use crate::record::read_entries;

pub use localfs::LocalFsArtifactStore;
pub use memory::InMemoryArtifactStore;

/// Artifact name of a chunk: its decimal id.
pub fn artifact_name(chunk_id: ChunkId) -> String {
    chunk_id.to_string()
}

/// Artifact name of the bypass output of the `index`-th input file.
pub fn part_name(index: usize) -> String {
    format!("part-{index:05}")
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    type Writer: ArtifactWriter;

    /// Opens a fresh, empty artifact, discarding any unfinished one of the same name.
    async fn create(&self, name: &str) -> io::Result<Self::Writer>;
}

#[async_trait]
pub trait ArtifactWriter: Send {
    async fn append(&mut self, key: &str, payload: &[u8]) -> io::Result<()>;

    /// Flushes and publishes the artifact. Fails if called twice.
    async fn finish(&mut self) -> io::Result<()>;
}

pub(crate) fn already_finished() -> io::Error {
    io::Error::other("artifact writer already finished")
}

/// Reads back a finished artifact file.
pub async fn read_artifact(path: &Path) -> Result<Vec<(String, Bytes)>, RechunkError> {
    read_entries(path)
        .await?
        .into_iter()
        .map(|e| {
            let key = e
                .key_str()
                .map_err(|source| RechunkError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                })?
                .to_string();
            Ok((key, e.payload))
        })
        .collect()
}
