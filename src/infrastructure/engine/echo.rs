//! Echo engine: a stand-in for a real agent runtime.
//!
//! Walks the front man's tool list, reporting one progress message per
//! downstream tool, then answers with the user's own text. Useful for
//! exercising the request path end to end without an LLM.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::errors::{EngineError, StreamError};
use crate::domain::models::ChatMessage;
use crate::domain::ports::{AgentEngine, EngineRequest, MessageSink};

#[derive(Debug, Clone, Default)]
pub struct EchoEngine {
    step_delay: Option<Duration>,
}

impl EchoEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause between messages, to simulate a slow agent.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = Some(delay);
        self
    }

    async fn emit(&self, sink: &mut dyn MessageSink, message: ChatMessage) -> Result<(), EngineError> {
        if sink.is_cancelled() {
            return Err(StreamError::Cancelled.into());
        }
        if let Some(delay) = self.step_delay {
            tokio::time::sleep(delay).await;
        }
        sink.send(message).await?;
        Ok(())
    }
}

#[async_trait]
impl AgentEngine for EchoEngine {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn run(
        &self,
        request: EngineRequest,
        sink: &mut dyn MessageSink,
    ) -> Result<(), EngineError> {
        let front_man = request.agent.network.front_man().ok_or_else(|| {
            EngineError::ExecutionFailed(format!("agent '{}' has no front man", request.agent.name))
        })?;
        debug!(
            agent = %request.agent.name,
            front_man = %front_man.name,
            version = request.context.pinned_version(),
            "Echo engine running"
        );

        for tool in &front_man.tools {
            let progress = ChatMessage::progress(format!("{} consulting {tool}", front_man.name))
                .with_origin(front_man.name.clone());
            self.emit(sink, progress).await?;
        }

        let mut answer = ChatMessage::ai(request.user_message).with_origin(front_man.name.clone());
        answer.chat_context = request.chat_context;
        self.emit(sink, answer).await?;

        sink.close().await?;
        Ok(())
    }
}
