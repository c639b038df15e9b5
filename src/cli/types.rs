//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::commands::{chat::ChatArgs, validate::ValidateArgs, watch::WatchArgs};

#[derive(Parser, Debug)]
#[command(name = "neurohost")]
#[command(about = "Neurohost - hot-reloading agent network server", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this YAML file instead of .neurohost/
    #[arg(short, long, global = true, env = "NEUROHOST_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load the registry once and report the agents it serves
    Validate(ValidateArgs),

    /// Watch the registry and serve until interrupted
    Watch(WatchArgs),

    /// Run one chat request end-to-end against the demo engine
    Chat(ChatArgs),

    /// Print the effective configuration
    Config,
}
