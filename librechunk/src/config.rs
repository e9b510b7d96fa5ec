use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, RechunkError};
use crate::geometry::ChunkGrid;
use crate::partition::PartitionMode;

/// File name of the run manifest written next to the artifacts.
pub const MANIFEST_FILE: &str = "_rechunk.yaml";

/// Immutable configuration of one rechunking run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub global_extent: Vec<i64>,
    pub chunk_offset_base: Vec<i64>,
    pub chunk_shape: Vec<i64>,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Parallelism of both the split and the assembly phase.
    pub worker_count: usize,
    /// Bytes per dataset element.
    #[serde(default = "default_element_size")]
    pub element_size: usize,
    #[serde(default)]
    pub write_enabled: bool,
    #[serde(default)]
    pub bypass_assembly: bool,
    #[serde(default)]
    pub single_assembler: bool,
    #[serde(default)]
    pub assembler_delay_secs: u64,
    #[serde(default)]
    pub checksum: bool,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_element_size() -> usize {
    1
}

fn default_max_attempts() -> u32 {
    1
}

impl RunConfig {
    /// Config with the required fields set and every option at its default.
    pub fn new(
        global_extent: Vec<i64>,
        chunk_offset_base: Vec<i64>,
        chunk_shape: Vec<i64>,
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            global_extent,
            chunk_offset_base,
            chunk_shape,
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            worker_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            element_size: default_element_size(),
            write_enabled: false,
            bypass_assembly: false,
            single_assembler: false,
            assembler_delay_secs: 0,
            checksum: false,
            max_attempts: default_max_attempts(),
        }
    }

    /// Checks every field and builds the chunk grid.
    pub fn grid(&self) -> Result<ChunkGrid, ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::ZeroCount("WorkerCount"));
        }
        if self.element_size == 0 {
            return Err(ConfigError::ZeroCount("ElementSize"));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroCount("MaxAttempts"));
        }
        ChunkGrid::new(
            self.global_extent.clone(),
            self.chunk_offset_base.clone(),
            self.chunk_shape.clone(),
        )
    }

    pub fn partition_mode(&self) -> PartitionMode {
        PartitionMode::from_flags(self.bypass_assembly, self.single_assembler)
    }

    pub fn assembler_delay(&self) -> Duration {
        Duration::from_secs(self.assembler_delay_secs)
    }

    pub fn load(path: &Path) -> Result<Self, RechunkError> {
        let content = std::fs::read_to_string(path).map_err(|e| RechunkError::io(path, e))?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn to_yaml(&self) -> Result<String, RechunkError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Parses a comma-separated integer vector such as `32,64,128`.
pub fn parse_vector(name: &'static str, text: &str) -> Result<Vec<i64>, ConfigError> {
    if text.trim().is_empty() {
        return Err(ConfigError::EmptyVector { name });
    }
    text.split(',')
        .map(|v| {
            v.trim().parse::<i64>().map_err(|_| ConfigError::InvalidInteger {
                name,
                value: v.to_string(),
            })
        })
        .collect()
}

/// Parses a boolean switch given as a positional word.
pub fn parse_flag(text: &str) -> Result<bool, ConfigError> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag(text.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vector() {
        assert_eq!(parse_vector("DataSize", "32,64,128"), Ok(vec![32, 64, 128]));
        assert_eq!(parse_vector("ChunkOffset", " -1, 0 "), Ok(vec![-1, 0]));
        assert_eq!(
            parse_vector("DataSize", ""),
            Err(ConfigError::EmptyVector { name: "DataSize" })
        );
        assert_eq!(
            parse_vector("DataSize", "32,,8"),
            Err(ConfigError::InvalidInteger {
                name: "DataSize",
                value: String::new()
            })
        );
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Ok(true));
        assert_eq!(parse_flag("false"), Ok(false));
        assert!(parse_flag("maybe").is_err());
    }

    #[test]
    fn test_grid_validation() {
        let mut cfg = RunConfig::new(vec![64, 64], vec![0, 0], vec![32, 32], "in", "out");
        assert_eq!(cfg.grid().unwrap().num_chunks(), 4);

        cfg.chunk_shape = vec![32];
        assert!(matches!(
            cfg.grid(),
            Err(ConfigError::DimensionMismatch {
                name: "ChunkShape",
                ..
            })
        ));

        cfg.chunk_shape = vec![32, 32];
        cfg.worker_count = 0;
        assert_eq!(cfg.grid(), Err(ConfigError::ZeroCount("WorkerCount")));
    }

    #[test]
    fn test_manifest_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = RunConfig::new(vec![8], vec![0], vec![4], "in", "out");
        cfg.single_assembler = true;
        cfg.element_size = 4;
        let path = tmp.path().join(MANIFEST_FILE);
        std::fs::write(&path, cfg.to_yaml().unwrap()).unwrap();
        assert_eq!(RunConfig::load(&path).unwrap(), cfg);
        assert_eq!(cfg.partition_mode(), PartitionMode::SingleAssembler);
    }
}
