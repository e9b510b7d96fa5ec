use std::path::PathBuf;

use clap::Parser;
use librechunk::config::{RunConfig, parse_flag, parse_vector};
use librechunk::error::ConfigError;

#[derive(Parser, Debug)]
#[command(
    name = "rechunk",
    version,
    about = "Split N-d records and reassemble them into grid chunks"
)]
pub struct Cli {
    /// Global extent, comma separated (e.g. 1024,1024,64)
    #[arg(value_name = "DATA_SIZE", allow_hyphen_values = true)]
    pub data_size: String,

    /// Origin of the chunk grid, comma separated
    #[arg(value_name = "CHUNK_OFFSET", allow_hyphen_values = true)]
    pub chunk_offset: String,

    /// Chunk shape, comma separated
    #[arg(value_name = "CHUNK_SIZE", allow_hyphen_values = true)]
    pub chunk_size: String,

    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: PathBuf,

    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Persist one artifact per chunk (true/false)
    #[arg(value_name = "ENABLE")]
    pub enable: String,

    /// Skip grouping and assembly entirely (true/false)
    #[arg(value_name = "BYPASS")]
    pub bypass: Option<String>,

    /// Route every chunk to a single assembler (true/false)
    #[arg(value_name = "SINGLE_ASSEMBLER")]
    pub single_assembler: Option<String>,

    /// Worker tasks for splitting and assembling [default: available cores]
    #[arg(short, long, env = "RECHUNK_WORKERS")]
    pub workers: Option<usize>,

    /// Bytes per dataset element
    #[arg(long, env = "RECHUNK_ELEMENT_SIZE", default_value_t = 1)]
    pub element_size: usize,

    /// Seconds each assembler waits before finalizing a chunk
    #[arg(long, env = "RECHUNK_ASSEMBLER_DELAY_SECS", default_value_t = 0)]
    pub assembler_delay_secs: u64,

    /// Checksum every assembled chunk
    #[arg(long, env = "RECHUNK_CHECKSUM")]
    pub checksum: bool,

    /// Attempts per chunk artifact before the run fails
    #[arg(long, env = "RECHUNK_MAX_ATTEMPTS", default_value_t = 1)]
    pub max_attempts: u32,
}

impl Cli {
    pub fn into_config(self) -> Result<RunConfig, ConfigError> {
        let mut cfg = RunConfig::new(
            parse_vector("DataSize", &self.data_size)?,
            parse_vector("ChunkOffset", &self.chunk_offset)?,
            parse_vector("ChunkSize", &self.chunk_size)?,
            self.input_dir,
            self.output_dir,
        );
        cfg.write_enabled = parse_flag(&self.enable)?;
        cfg.bypass_assembly = self
            .bypass
            .as_deref()
            .map(parse_flag)
            .transpose()?
            .unwrap_or(false);
        cfg.single_assembler = self
            .single_assembler
            .as_deref()
            .map(parse_flag)
            .transpose()?
            .unwrap_or(false);
        if let Some(workers) = self.workers {
            cfg.worker_count = workers;
        }
        cfg.element_size = self.element_size;
        cfg.assembler_delay_secs = self.assembler_delay_secs;
        cfg.checksum = self.checksum;
        cfg.max_attempts = self.max_attempts;
        Ok(cfg)
    }
}
