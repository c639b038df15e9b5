//! Request lifecycle and admission models.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::{ChatContext, ChatFilter};
use super::snapshot::ConfigSnapshot;

/// Admission lifecycle: `Serving → Draining → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    Serving,
    Draining,
    Stopped,
}

impl ServerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Serving => "serving",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }

    pub(crate) const fn to_u8(self) -> u8 {
        match self {
            Self::Serving => 0,
            Self::Draining => 1,
            Self::Stopped => 2,
        }
    }

    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Serving,
            1 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is calling. Identity is opaque to the core and only handed to the authorizer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerIdentity(pub String);

impl CallerIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn anonymous() -> Self {
        Self("anonymous".to_string())
    }
}

impl std::fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How an admitted request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    Completed,
    Failed,
    Cancelled,
}

impl RequestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RequestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request state created at admission.
///
/// The context holds the snapshot it was admitted under, so every registry
/// read the request performs sees exactly that version, regardless of reloads
/// that complete while it runs.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub caller: CallerIdentity,
    pub snapshot: Arc<ConfigSnapshot>,
    pub started_at: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(caller: CallerIdentity, snapshot: Arc<ConfigSnapshot>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            caller,
            snapshot,
            started_at: Utc::now(),
        }
    }

    pub fn pinned_version(&self) -> u64 {
        self.snapshot.version
    }

    /// Registry read against the pinned snapshot.
    pub fn agent(&self, name: &str) -> Option<&super::snapshot::RegisteredAgent> {
        self.snapshot.get(name)
    }
}

/// An inbound streaming chat request, as handed over by the transport.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub agent_name: String,
    pub caller: CallerIdentity,
    pub user_message: String,
    pub chat_context: Option<ChatContext>,
    pub chat_filter: ChatFilter,
    /// Registry version to run against; `None` means the current one.
    pub version: Option<u64>,
}

impl ChatRequest {
    pub fn new(agent_name: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            caller: CallerIdentity::anonymous(),
            user_message: user_message.into(),
            chat_context: None,
            chat_filter: ChatFilter::default(),
            version: None,
        }
    }

    #[must_use]
    pub fn with_caller(mut self, caller: CallerIdentity) -> Self {
        self.caller = caller;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, chat_filter: ChatFilter) -> Self {
        self.chat_filter = chat_filter;
        self
    }

    #[must_use]
    pub fn at_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }
}

/// Read-only view of the admission controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionStats {
    pub state: ServerState,
    pub total_served: u64,
    pub in_flight: usize,
    pub limit: usize,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_state_round_trips_through_u8() {
        for state in [ServerState::Serving, ServerState::Draining, ServerState::Stopped] {
            assert_eq!(ServerState::from_u8(state.to_u8()), state);
        }
    }

    #[test]
    fn test_context_pins_snapshot_version() {
        let snapshot = Arc::new(ConfigSnapshot::empty());
        let ctx = RequestContext::new(CallerIdentity::anonymous(), snapshot);
        assert_eq!(ctx.pinned_version(), 0);
        assert!(ctx.agent("anything").is_none());
    }
}
