//! One-shot registry validation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::output::{list_table, output, truncate, CommandOutput};
use crate::domain::models::{Config, ConfigSnapshot, ReloadReason, ReloadTrigger};
use crate::services::RegistryLoader;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Manifest to validate instead of the configured one
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct ValidateOutput {
    pub manifest: PathBuf,
    pub agents: Vec<AgentRow>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct AgentRow {
    pub name: String,
    pub public: bool,
    pub tools: usize,
    pub front_man: Option<String>,
    pub description: Option<String>,
    pub source: PathBuf,
}

impl ValidateOutput {
    fn from_snapshot(manifest: PathBuf, snapshot: &ConfigSnapshot) -> Self {
        let agents: Vec<AgentRow> = snapshot
            .manifest
            .values()
            .map(|agent| AgentRow {
                name: agent.name.clone(),
                public: agent.public,
                tools: agent.network.tools.len(),
                front_man: agent.network.front_man().map(|spec| spec.name.clone()),
                description: agent.network.description().map(str::to_string),
                source: agent.source.clone(),
            })
            .collect();
        let total = agents.len();
        Self {
            manifest,
            agents,
            total,
        }
    }
}

impl CommandOutput for ValidateOutput {
    fn to_human(&self) -> String {
        if self.agents.is_empty() {
            return format!("Registry {} is valid but serves no agents.", self.manifest.display());
        }

        let mut table = list_table(&["agent", "public", "tools", "front man", "description"]);
        for agent in &self.agents {
            table.add_row(vec![
                agent.name.clone(),
                if agent.public { "yes" } else { "no" }.to_string(),
                agent.tools.to_string(),
                agent.front_man.clone().unwrap_or_else(|| "-".to_string()),
                agent
                    .description
                    .as_deref()
                    .map_or_else(|| "-".to_string(), |d| truncate(d, 60)),
            ]);
        }

        format!(
            "Registry {} is valid: {} agent{}\n{}",
            self.manifest.display(),
            self.total,
            if self.total == 1 { "" } else { "s" },
            table
        )
    }
}

pub async fn execute(args: ValidateArgs, config: &Config, json_mode: bool) -> Result<()> {
    let manifest = args
        .manifest
        .unwrap_or_else(|| PathBuf::from(&config.registry.manifest_path));
    let result = validate(manifest).await?;
    output(&result, json_mode);
    Ok(())
}

/// Load every definition the manifest lists and validate the result.
pub async fn validate(manifest: PathBuf) -> Result<ValidateOutput> {
    let loader = RegistryLoader::new(manifest.clone());
    let snapshot = tokio::task::spawn_blocking(move || {
        loader.load(
            &ReloadTrigger::full(ReloadReason::Manual),
            &ConfigSnapshot::empty(),
        )
    })
    .await
    .context("Registry load task failed")?
    .with_context(|| format!("Registry {} is invalid", manifest.display()))?;

    Ok(ValidateOutput::from_snapshot(manifest, &snapshot))
}
