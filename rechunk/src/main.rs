mod cli;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use librechunk::runner::LocalRunner;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = Cli::parse().into_config().context("invalid arguments")?;
    let output_dir = cfg.output_dir.clone();
    let summary = match LocalRunner::new(cfg).run().await {
        Ok(s) => s,
        Err(e) => {
            error!("rechunk run failed: {e}");
            return Err(e).context("rechunk run failed");
        }
    };

    let persisted = summary.reports.iter().filter(|r| r.persisted).count();
    info!(
        files = summary.files,
        records = summary.stats.records,
        skipped = summary.stats.skipped_records,
        sub_blocks = summary.stats.sub_blocks,
        bytes = summary.stats.bytes,
        partitions = summary.partitions,
        assemblers = summary.assembler_invocations,
        chunks = summary.chunks(),
        persisted,
        parts = summary.parts,
        output = %output_dir.display(),
        "done"
    );
    for report in summary.reports.iter().filter(|r| r.checksum.is_some()) {
        println!(
            "{}\t{}\t{}",
            report.chunk_id,
            report.bytes,
            report.checksum.as_deref().unwrap_or_default()
        );
    }
    Ok(())
}
