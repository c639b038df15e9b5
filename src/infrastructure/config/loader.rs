use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::services::MIN_RETAINED_VERSIONS;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_concurrent_requests: {0}. Must be at least 1")]
    InvalidMaxConcurrentRequests(usize),

    #[error("Invalid retained_versions: {0}. Must be at least {MIN_RETAINED_VERSIONS}")]
    InvalidRetainedVersions(usize),

    #[error("Invalid buffer_capacity: {0}. Must be at least 1")]
    InvalidBufferCapacity(usize),

    #[error("Invalid event_channel_capacity: {0}. Must be at least 1")]
    InvalidEventChannelCapacity(usize),

    #[error("Registry manifest path cannot be empty")]
    EmptyManifestPath,

    #[error("At least one definition extension is required")]
    NoDefinitionExtensions,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .neurohost/config.yaml (project config)
    /// 3. .neurohost/local.yaml (local overrides, optional)
    /// 4. Environment variables (NEUROHOST_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Same as [`ConfigLoader::load`] with `.neurohost/` resolved under `base`.
    pub fn load_from_dir(base: impl AsRef<Path>) -> Result<Config> {
        let dir = base.as_ref().join(".neurohost");
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed("NEUROHOST_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.server.max_concurrent_requests == 0 {
            return Err(ConfigError::InvalidMaxConcurrentRequests(
                config.server.max_concurrent_requests,
            ));
        }

        let registry = &config.registry;
        if registry.manifest_path.trim().is_empty() {
            return Err(ConfigError::EmptyManifestPath);
        }
        if registry.retained_versions < MIN_RETAINED_VERSIONS {
            return Err(ConfigError::InvalidRetainedVersions(
                registry.retained_versions,
            ));
        }
        if registry.event_channel_capacity == 0 {
            return Err(ConfigError::InvalidEventChannelCapacity(0));
        }
        if registry.definition_extensions.is_empty() {
            return Err(ConfigError::NoDefinitionExtensions);
        }

        if config.streaming.buffer_capacity == 0 {
            return Err(ConfigError::InvalidBufferCapacity(0));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }
}
