//! Local directory backend: one file per artifact.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};

use super::{ArtifactStore, ArtifactWriter, already_finished};
use crate::record::put_entry;

const PARTIAL_SUFFIX: &str = ".partial";

pub struct LocalFsArtifactStore {
    root: PathBuf,
}

impl LocalFsArtifactStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn partial_path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}{PARTIAL_SUFFIX}"))
    }
}

#[async_trait]
impl ArtifactStore for LocalFsArtifactStore {
    type Writer = LocalFsArtifactWriter;

    async fn create(&self, name: &str) -> io::Result<Self::Writer> {
        fs::create_dir_all(&self.root).await?;
        let partial = self.partial_path_for(name);
        // File::create truncates whatever an earlier attempt left behind.
        let file = File::create(&partial).await?;
        Ok(LocalFsArtifactWriter {
            file: Some(BufWriter::new(file)),
            partial,
            target: self.path_for(name),
        })
    }
}

pub struct LocalFsArtifactWriter {
    file: Option<BufWriter<File>>,
    partial: PathBuf,
    target: PathBuf,
}

#[async_trait]
impl ArtifactWriter for LocalFsArtifactWriter {
    async fn append(&mut self, key: &str, payload: &[u8]) -> io::Result<()> {
        let file = self.file.as_mut().ok_or_else(already_finished)?;
        let mut buf = BytesMut::new();
        put_entry(&mut buf, key.as_bytes(), payload)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        file.write_all(&buf).await
    }

    async fn finish(&mut self) -> io::Result<()> {
        let mut file = self.file.take().ok_or_else(already_finished)?;
        file.flush().await?;
        file.get_ref().sync_all().await?;
        drop(file);
        fs::rename(&self.partial, &self.target).await
    }
}
