//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading (`.neurohost/config.yaml`, `.neurohost/local.yaml`)
//! - Environment variable overrides (`NEUROHOST_*`)
//! - Configuration validation

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
