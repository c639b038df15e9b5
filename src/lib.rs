//! Neurohost - agent network server core
//!
//! Neurohost serves conversational agent networks to concurrent clients and
//! streams each agent's incremental output back over a long-lived request,
//! while the registry of agent networks changes on disk underneath it.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): registry, request and message models, errors, ports
//! - **Service Layer** (`services`): registry watching and loading, versioned
//!   config store, admission control, streaming bridge, response shaping
//! - **Application Layer** (`application`): request orchestration and server lifecycle
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging,
//!   filesystem notifications, registry file format, demo engine
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use neurohost::{AgentServer, AllowAllAuthorizer, ChatRequest, Config, EchoEngine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = AgentServer::new(
//!         &Config::default(),
//!         Arc::new(EchoEngine::new()),
//!         Arc::new(AllowAllAuthorizer),
//!     );
//!     server.start().await?;
//!
//!     let mut stream = server
//!         .requests()
//!         .streaming_chat(ChatRequest::new("hello_world", "hi"))
//!         .await?;
//!     while let Some(response) = stream.next().await {
//!         println!("{}", response?.response);
//!     }
//!
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{
    AgentInfo, AgentServer, ChatResponse, RequestService, ResponseStream, ShutdownOutcome,
};
pub use domain::errors::{
    AdmissionError, EngineError, RegistryError, ServiceError, StreamError,
};
pub use domain::models::{
    CallerIdentity, ChatFilter, ChatMessage, ChatRequest, Config, ConfigSnapshot,
    RequestOutcome, ServerState,
};
pub use domain::ports::{AgentEngine, AllowAllAuthorizer, Authorizer, MessageSink};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::engine::EchoEngine;
pub use services::{AdmissionController, ConfigStore, RegistryLoader, RegistryWatcher};
