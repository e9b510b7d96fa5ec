use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use librechunk::config::parse_vector;
use librechunk::generate::{DatasetSpec, write_dataset};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Writes synthetic record files for `rechunk`.
#[derive(Parser, Debug)]
#[command(name = "rechunk-gen", version)]
struct Args {
    /// Global extent, comma separated
    #[arg(value_name = "DATA_SIZE", allow_hyphen_values = true)]
    data_size: String,

    /// Any point of the record lattice, comma separated
    #[arg(value_name = "RECORD_OFFSET", allow_hyphen_values = true)]
    record_offset: String,

    /// Shape of one record, comma separated
    #[arg(value_name = "RECORD_SIZE", allow_hyphen_values = true)]
    record_size: String,

    #[arg(value_name = "OUTPUT_DIR")]
    output_dir: PathBuf,

    /// Number of record files
    #[arg(short, long, env = "RECHUNK_GEN_FILES", default_value_t = 4)]
    files: usize,

    /// Bytes per dataset element
    #[arg(long, env = "RECHUNK_ELEMENT_SIZE", default_value_t = 1)]
    element_size: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let spec = DatasetSpec {
        global_extent: parse_vector("DataSize", &args.data_size)?,
        record_offset: parse_vector("RecordOffset", &args.record_offset)?,
        record_shape: parse_vector("RecordSize", &args.record_size)?,
        element_size: args.element_size,
        files: args.files,
    };
    let summary = write_dataset(&args.output_dir, &spec)
        .await
        .with_context(|| format!("failed to generate dataset in {}", args.output_dir.display()))?;
    info!(records = summary.records, "generated {} files", summary.files.len());
    Ok(())
}
