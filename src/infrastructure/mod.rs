//! Infrastructure layer module
//!
//! Adapters between the core and the outside world:
//! - Configuration management (figment)
//! - Logging infrastructure (tracing-subscriber, tracing-appender)
//! - Filesystem watching (notify)
//! - Registry document format (HOCON subset via serde_yaml)
//! - Built-in agent engines

pub mod config;
pub mod engine;
pub mod fs_watch;
pub mod logging;
pub mod registry_format;
