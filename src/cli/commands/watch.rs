//! Run the server core until interrupted.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::application::ShutdownOutcome;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::services::DiagnosticsReport;

use super::demo_server;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Manifest to watch instead of the configured one
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct WatchOutput {
    pub initial_version: u64,
    pub final_version: u64,
    pub drained: bool,
    pub abandoned_requests: usize,
    pub diagnostics: DiagnosticsReport,
}

impl CommandOutput for WatchOutput {
    fn to_human(&self) -> String {
        let mut lines = vec!["Server stopped.".to_string()];
        lines.push(format!(
            "  Registry versions: {} -> {}",
            self.initial_version, self.final_version
        ));
        lines.push(format!(
            "  Requests served:   {}",
            self.diagnostics.admission.total_served
        ));
        lines.push(format!("  Events observed:   {}", self.diagnostics.events.total()));
        if self.drained {
            lines.push("  Drain:             complete".to_string());
        } else {
            lines.push(format!(
                "  Drain:             timed out with {} request(s) running",
                self.abandoned_requests
            ));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: WatchArgs, config: &Config, json_mode: bool) -> Result<()> {
    let mut config = config.clone();
    if let Some(manifest) = args.manifest {
        config.registry.manifest_path = manifest.display().to_string();
    }

    let server = demo_server(&config);
    let initial_version = server
        .start()
        .await
        .with_context(|| format!("Failed to watch registry {}", config.registry.manifest_path))?;

    info!(version = initial_version, "Watching registry, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    let outcome = server.shutdown().await;
    let (drained, abandoned_requests) = match outcome {
        ShutdownOutcome::Drained => (true, 0),
        ShutdownOutcome::TimedOut { in_flight } => (false, in_flight),
    };

    output(
        &WatchOutput {
            initial_version,
            final_version: server.store().current_version(),
            drained,
            abandoned_requests,
            diagnostics: server.diagnostics(),
        },
        json_mode,
    );
    Ok(())
}
