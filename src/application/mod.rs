//! Application layer: request orchestration and server lifecycle.

pub mod request_service;
pub mod server;

pub use request_service::{AgentInfo, ChatResponse, RequestService, RequestSettings, ResponseStream};
pub use server::{AgentServer, ShutdownOutcome};
