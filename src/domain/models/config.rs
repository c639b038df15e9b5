use serde::{Deserialize, Serialize};

use super::change_event::WatcherPolicy;

/// Main configuration structure for neurohost
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Admission and shutdown settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Agent registry location and watcher behaviour
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Per-request streaming settings
    #[serde(default)]
    pub streaming: StreamingConfig,

    /// Periodic diagnostics reporting
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Admission and shutdown configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Maximum number of requests in flight at once
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// How long shutdown waits for in-flight requests before giving up
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

const fn default_max_concurrent_requests() -> usize {
    50
}

const fn default_drain_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

/// Agent registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RegistryConfig {
    /// Path to the registry manifest file
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,

    /// Coalescing window for bursts of filesystem events
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Number of snapshots retained for pinned requests (at least 2)
    #[serde(default = "default_retained_versions")]
    pub retained_versions: usize,

    /// Capacity of the channel between the filesystem watcher and the debouncer
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// File extensions treated as agent network definitions
    #[serde(default = "default_definition_extensions")]
    pub definition_extensions: Vec<String>,

    /// Which mutation kinds trigger a reload
    #[serde(default)]
    pub policy: WatcherPolicy,
}

fn default_manifest_path() -> String {
    "registries/manifest.hocon".to_string()
}

const fn default_debounce_ms() -> u64 {
    300
}

const fn default_retained_versions() -> usize {
    4
}

const fn default_event_channel_capacity() -> usize {
    256
}

fn default_definition_extensions() -> Vec<String> {
    ["hocon", "json", "yaml", "yml"]
        .iter()
        .map(|ext| (*ext).to_string())
        .collect()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            manifest_path: default_manifest_path(),
            debounce_ms: default_debounce_ms(),
            retained_versions: default_retained_versions(),
            event_channel_capacity: default_event_channel_capacity(),
            definition_extensions: default_definition_extensions(),
            policy: WatcherPolicy::default(),
        }
    }
}

/// Streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StreamingConfig {
    /// Messages buffered between an agent engine and its consumer
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Cancel requests that run longer than this (no limit when unset)
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

const fn default_buffer_capacity() -> usize {
    64
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            request_timeout_secs: None,
        }
    }
}

/// Diagnostics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DiagnosticsConfig {
    /// Seconds between diagnostics reports; 0 disables reporting
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
}

const fn default_report_interval_secs() -> u64 {
    60
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: default_report_interval_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rotated JSON log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation policy for file logs: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
