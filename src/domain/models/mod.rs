pub mod agent_network;
pub mod change_event;
pub mod config;
pub mod manifest;
pub mod message;
pub mod request;
pub mod snapshot;

pub use agent_network::{AgentNetwork, AgentSpec, ToolReference};
pub use change_event::{ChangeEvent, ChangeKind, ReloadReason, ReloadTrigger, WatcherPolicy};
pub use config::{
    Config, DiagnosticsConfig, LoggingConfig, RegistryConfig, ServerConfig, StreamingConfig,
};
pub use manifest::{Manifest, ManifestAgent, ManifestEntry};
pub use message::{
    ChatContext, ChatFilter, ChatHistory, ChatMessage, ChatMessageType, Origin, StreamMessage,
};
pub use request::{
    AdmissionStats, CallerIdentity, ChatRequest, RequestContext, RequestOutcome, ServerState,
};
pub use snapshot::{ConfigSnapshot, RegisteredAgent, SnapshotSummary};
