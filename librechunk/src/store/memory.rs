//! In-process artifact store: used for local development and tests.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;

use super::{ArtifactStore, ArtifactWriter, already_finished};

#[derive(Default)]
struct State {
    artifacts: BTreeMap<String, Vec<(String, Bytes)>>,
    opened: HashMap<String, u32>,
    finished: HashMap<String, u32>,
    /// Number of upcoming attempts per name whose first append fails.
    failures: HashMap<String, u32>,
}

/// Artifacts become visible on `finish`; unfinished attempts leave no trace.
#[derive(Clone, Default)]
pub struct InMemoryArtifactStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `attempts` writers created for `name` fail on their
    /// first append.
    pub async fn fail_next(&self, name: &str, attempts: u32) {
        self.state
            .lock()
            .await
            .failures
            .insert(name.to_string(), attempts);
    }

    pub async fn get(&self, name: &str) -> Option<Vec<(String, Bytes)>> {
        self.state.lock().await.artifacts.get(name).cloned()
    }

    pub async fn names(&self) -> Vec<String> {
        self.state.lock().await.artifacts.keys().cloned().collect()
    }

    pub async fn opened(&self, name: &str) -> u32 {
        self.state.lock().await.opened.get(name).copied().unwrap_or(0)
    }

    pub async fn finished(&self, name: &str) -> u32 {
        self.state.lock().await.finished.get(name).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    type Writer = InMemoryArtifactWriter;

    async fn create(&self, name: &str) -> io::Result<Self::Writer> {
        let mut state = self.state.lock().await;
        *state.opened.entry(name.to_string()).or_default() += 1;
        let fail = match state.failures.get_mut(name) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        };
        Ok(InMemoryArtifactWriter {
            state: self.state.clone(),
            name: name.to_string(),
            entries: Vec::new(),
            fail,
            done: false,
        })
    }
}

pub struct InMemoryArtifactWriter {
    state: Arc<Mutex<State>>,
    name: String,
    entries: Vec<(String, Bytes)>,
    fail: bool,
    done: bool,
}

#[async_trait]
impl ArtifactWriter for InMemoryArtifactWriter {
    async fn append(&mut self, key: &str, payload: &[u8]) -> io::Result<()> {
        if self.done {
            return Err(already_finished());
        }
        if self.fail {
            return Err(io::Error::other(format!("injected failure on {}", self.name)));
        }
        self.entries
            .push((key.to_string(), Bytes::copy_from_slice(payload)));
        Ok(())
    }

    async fn finish(&mut self) -> io::Result<()> {
        if self.done {
            return Err(already_finished());
        }
        self.done = true;
        let mut state = self.state.lock().await;
        *state.finished.entry(self.name.clone()).or_default() += 1;
        state
            .artifacts
            .insert(self.name.clone(), std::mem::take(&mut self.entries));
        Ok(())
    }
}
