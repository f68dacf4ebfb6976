mod bootstrap_helpers;

use anyhow::{Context, Result};
use clap::Parser;
use stor_cli::{Cli, CliTransportMode};
use stor_runtime::{serve_ndjson, StorageService};
use tokio::io::BufReader;
use tracing::{info, warn};

use crate::bootstrap_helpers::{init_tracing, service_config_from_cli};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run_cli(cli).await
}

async fn run_cli(cli: Cli) -> Result<()> {
    let service = StorageService::new(service_config_from_cli(&cli));
    info!(
        shell = %service.config().shell.display(),
        max_reply_bytes = service.config().max_reply_bytes,
        max_line_bytes = service.config().max_line_bytes,
        "storage service starting"
    );

    match cli.transport {
        CliTransportMode::Stdio => {
            let reader = BufReader::new(tokio::io::stdin());
            let writer = tokio::io::stdout();
            tokio::select! {
                report = serve_ndjson(&service, reader, writer) => {
                    let report = report.context("stdio transport failed")?;
                    info!(
                        processed_lines = report.processed_lines,
                        error_count = report.error_count,
                        "stdio transport finished"
                    );
                }
                signal = tokio::signal::ctrl_c() => {
                    signal.context("failed to listen for ctrl-c")?;
                    warn!("interrupted; stopping service");
                    if service.resize_coordinator().cancel_active().await {
                        info!("active resize cancelled");
                    }
                }
            }
        }
    }
    Ok(())
}
