//! Domain errors for the neurohost agent server.

use std::path::PathBuf;

use thiserror::Error;

use super::models::ServerState;

/// Errors raised while watching, loading or publishing the agent registry.
///
/// None of these cross into the request-serving path except
/// [`RegistryError::SnapshotRetired`], which a request can observe when it asks
/// for a version the store no longer keeps.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Manifest file not found: {}", .0.display())]
    ManifestMissing(PathBuf),

    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid definition in {}: {reason}", path.display())]
    InvalidDefinition { path: PathBuf, reason: String },

    #[error("Stale snapshot rejected: version {offered} is not newer than {current}")]
    StaleVersion { offered: u64, current: u64 },

    #[error("Snapshot version {0} has been retired")]
    SnapshotRetired(u64),

    #[error("Failed to establish filesystem subscription: {0}")]
    WatchFailed(String),

    #[error("Registry watcher is not running")]
    WatcherStopped,
}

impl RegistryError {
    pub fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Admission refusals. Both are surfaced to the caller and never retried internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("Capacity exceeded: {limit} requests already in flight")]
    CapacityExceeded { limit: usize },

    #[error("Server is not accepting requests (state: {0})")]
    NotServing(ServerState),
}

/// Streaming bridge failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("Stream already closed")]
    StreamAlreadyClosed,

    #[error("Stream cancelled")]
    Cancelled,

    #[error("Producer went away without closing the stream")]
    ProducerAborted,
}

/// Errors returned by an [`AgentEngine`](crate::domain::ports::AgentEngine).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Agent execution failed: {0}")]
    ExecutionFailed(String),

    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// Request-path errors surfaced to the transport layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Caller is not authorized to use agent '{agent}'")]
    Unauthorized { agent: String },

    #[error("Agent '{agent}' not found in registry version {version}")]
    AgentNotFound { agent: String, version: u64 },

    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
pub type ServiceResult<T> = Result<T, ServiceError>;
