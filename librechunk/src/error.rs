use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Malformed or inconsistent run configuration. Always fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is empty")]
    EmptyVector { name: &'static str },

    #[error("{name}: `{value}` is not an integer")]
    InvalidInteger { name: &'static str, value: String },

    #[error("{name} has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{name}[{axis}] must be positive, got {value}")]
    NonPositive {
        name: &'static str,
        axis: usize,
        value: i64,
    },

    #[error("chunk offset base {base} is not below global extent {extent} on axis {axis}")]
    BaseOutOfRange { axis: usize, base: i64, extent: i64 },

    #[error("grid of {0} chunks does not fit the address space")]
    GridTooLarge(String),

    #[error("invalid flag `{0}`, expected true or false")]
    InvalidFlag(String),

    #[error("{0} must be at least 1")]
    ZeroCount(&'static str),
}

/// A key or container entry that cannot be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("expected `{expected}` at byte {position} of `{text}`")]
    MissingBracket {
        text: String,
        position: usize,
        expected: char,
    },

    #[error("unexpected trailing input in `{0}`")]
    TrailingInput(String),

    #[error("offset has {offset} elements but length has {length}")]
    LengthMismatch { offset: usize, length: usize },

    #[error("empty vector in `{0}`")]
    EmptyVector(String),

    #[error("`{0}` is not an integer")]
    InvalidElement(String),

    #[error("key is not valid UTF-8")]
    InvalidUtf8,

    #[error("truncated entry at byte {position}: need {needed} more bytes")]
    Truncated { position: usize, needed: usize },

    #[error("key of {0} bytes does not fit a u32 length prefix")]
    KeyTooLong(usize),
}

/// A single input record that must be skipped. Never aborts a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("undecodable record key: {0}")]
    Format(#[from] FormatError),

    #[error("record {key} has {actual} dimensions, grid has {expected}")]
    Dimensionality {
        key: String,
        expected: usize,
        actual: usize,
    },

    #[error("record {key} does not fit the address space")]
    Overflow { key: String },

    #[error("record {key} carries {actual} payload bytes, expected {expected}")]
    PayloadSize {
        key: String,
        expected: usize,
        actual: usize,
    },
}

#[derive(Error, Debug)]
pub enum RechunkError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("corrupt container {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: FormatError,
    },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("artifact for chunk {chunk_id} failed after {attempts} attempts: {source}")]
    Artifact {
        chunk_id: u64,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("worker task failed: {0}")]
    Worker(String),

    #[error("manifest error: {0}")]
    Manifest(#[from] serde_yaml::Error),
}

impl RechunkError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        RechunkError::Io {
            path: path.into(),
            source,
        }
    }
}
