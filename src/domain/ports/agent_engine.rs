//! Agent engine port - interface for whatever executes agent networks.

use async_trait::async_trait;

use crate::domain::errors::{EngineError, StreamError};
use crate::domain::models::{ChatContext, ChatMessage, RegisteredAgent, RequestContext};

/// Producer side of a streaming bridge.
///
/// `send` suspends while the consumer is behind and fails once the request
/// has been cancelled, so an engine that awaits it cannot outlive its consumer.
#[async_trait]
pub trait MessageSink: Send {
    /// Emit one message to the consumer, in order.
    async fn send(&mut self, message: ChatMessage) -> Result<(), StreamError>;

    /// Signal end of stream. Further sends fail with `StreamAlreadyClosed`.
    async fn close(&mut self) -> Result<(), StreamError>;

    /// Whether the consumer has gone away or the request was cancelled.
    fn is_cancelled(&self) -> bool;

    fn is_closed(&self) -> bool;
}

/// Everything an engine needs to run one request.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// Admission context; its snapshot is the registry version to run against.
    pub context: RequestContext,
    pub agent: RegisteredAgent,
    pub user_message: String,
    pub chat_context: Option<ChatContext>,
}

/// Trait for agent execution engines.
///
/// The core hands an engine one request and the producer side of a bridge
/// and never looks inside the engine's reasoning.
#[async_trait]
pub trait AgentEngine: Send + Sync {
    /// Engine name for logs.
    fn name(&self) -> &'static str;

    /// Run the request, emitting messages through `sink`.
    ///
    /// Returning `Ok` without closing the sink is allowed; the caller closes it.
    async fn run(&self, request: EngineRequest, sink: &mut dyn MessageSink)
        -> Result<(), EngineError>;
}
