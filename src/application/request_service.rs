//! Request orchestration for streaming chat.
//!
//! One call to [`RequestService::streaming_chat`] takes a request from the
//! transport through authorization, snapshot pinning and admission, starts
//! the agent engine as the producer side of a streaming bridge, and returns
//! the consumer side as a [`ResponseStream`] of shaped responses.
//!
//! The admission permit travels with the response stream. Whichever way the
//! stream ends (end marker, engine failure, cancellation, or the transport
//! simply dropping it) the request is released exactly once.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{EngineError, ServiceError, ServiceResult, StreamError};
use crate::domain::models::{
    ChatFilter, ChatRequest, ConfigSnapshot, RequestOutcome, StreamingConfig,
};
use crate::domain::ports::{AgentEngine, Authorizer, EngineRequest, MessageFilter};
use crate::services::streaming_bridge::{self, MessageReceiver};
use crate::services::{shape_message, AdmissionController, AdmissionPermit, ConfigStore};

/// One shaped message, tagged with the request it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub request_id: Uuid,
    pub version: u64,
    pub response: Value,
}

/// Public description of a served agent network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentInfo {
    pub name: String,
    pub description: Option<String>,
    pub public: bool,
    pub version: u64,
}

/// Per-request settings derived from [`StreamingConfig`].
#[derive(Debug, Clone, Copy)]
pub struct RequestSettings {
    pub buffer_capacity: usize,
    pub request_timeout: Option<Duration>,
}

impl From<&StreamingConfig> for RequestSettings {
    fn from(config: &StreamingConfig) -> Self {
        Self {
            buffer_capacity: config.buffer_capacity,
            request_timeout: config.request_timeout_secs.map(Duration::from_secs),
        }
    }
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self::from(&StreamingConfig::default())
    }
}

pub struct RequestService {
    store: Arc<ConfigStore>,
    admission: Arc<AdmissionController>,
    engine: Arc<dyn AgentEngine>,
    authorizer: Arc<dyn Authorizer>,
    settings: RequestSettings,
}

impl RequestService {
    pub fn new(
        store: Arc<ConfigStore>,
        admission: Arc<AdmissionController>,
        engine: Arc<dyn AgentEngine>,
        authorizer: Arc<dyn Authorizer>,
        settings: RequestSettings,
    ) -> Self {
        Self {
            store,
            admission,
            engine,
            authorizer,
            settings,
        }
    }

    /// Public agent networks in the current snapshot.
    pub fn list_agents(&self) -> Vec<AgentInfo> {
        let snapshot = self.store.current();
        snapshot
            .manifest
            .values()
            .filter(|agent| agent.public)
            .map(|agent| AgentInfo {
                name: agent.name.clone(),
                description: agent.network.description().map(str::to_string),
                public: agent.public,
                version: snapshot.version,
            })
            .collect()
    }

    /// The front man's function description for `agent`.
    pub fn function(&self, agent: &str) -> ServiceResult<Option<String>> {
        let snapshot = self.store.current();
        let registered = snapshot
            .get(agent)
            .ok_or_else(|| ServiceError::AgentNotFound {
                agent: agent.to_string(),
                version: snapshot.version,
            })?;
        Ok(registered.network.description().map(str::to_string))
    }

    /// Start a streaming chat request.
    ///
    /// Errors returned here mean the request never started: it was not
    /// authorized, the agent does not exist in the pinned snapshot, the pinned
    /// version has been retired, or admission refused it.
    #[instrument(skip(self, request), fields(agent = %request.agent_name, caller = %request.caller))]
    pub async fn streaming_chat(&self, request: ChatRequest) -> ServiceResult<ResponseStream> {
        if !self
            .authorizer
            .is_authorized(&request.caller, &request.agent_name)
            .await
        {
            warn!("Request not authorized");
            return Err(ServiceError::Unauthorized {
                agent: request.agent_name,
            });
        }

        let snapshot = self.resolve_snapshot(request.version)?;
        let agent = snapshot
            .get(&request.agent_name)
            .cloned()
            .ok_or_else(|| ServiceError::AgentNotFound {
                agent: request.agent_name.clone(),
                version: snapshot.version,
            })?;

        let permit = self.admission.admit(request.caller.clone(), snapshot)?;
        let request_id = permit.request_id();
        let version = permit.context().pinned_version();

        let token = CancellationToken::new();
        let (mut sender, receiver) =
            streaming_bridge::channel_with_token(self.settings.buffer_capacity, token.clone());

        let engine_request = EngineRequest {
            context: permit.context().clone(),
            agent,
            user_message: request.user_message,
            chat_context: request.chat_context,
        };
        let engine = Arc::clone(&self.engine);
        let producer = tokio::spawn(async move {
            engine.run(engine_request, &mut sender).await?;
            if !sender.is_closed() {
                sender.close().await?;
            }
            Ok::<(), EngineError>(())
        });

        if let Some(limit) = self.settings.request_timeout {
            spawn_timeout(request_id, limit, token);
        }

        info!(%request_id, version, engine = self.engine.name(), "Streaming chat started");
        Ok(ResponseStream {
            request_id,
            version,
            receiver,
            filter: request.chat_filter,
            permit: Some(permit),
            producer: Some(producer),
            done: false,
        })
    }

    fn resolve_snapshot(&self, version: Option<u64>) -> ServiceResult<Arc<ConfigSnapshot>> {
        match version {
            Some(version) => Ok(self.store.get(version)?),
            None => Ok(self.store.current()),
        }
    }
}

fn spawn_timeout(request_id: Uuid, limit: Duration, token: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            () = token.cancelled() => {}
            () = tokio::time::sleep(limit) => {
                warn!(%request_id, timeout_secs = limit.as_secs(), "Request timed out, cancelling");
                token.cancel();
            }
        }
    });
}

/// Consumer side of a streaming chat request.
///
/// Dropping the stream cancels the request and releases its admission.
pub struct ResponseStream {
    request_id: Uuid,
    version: u64,
    receiver: MessageReceiver,
    filter: ChatFilter,
    permit: Option<AdmissionPermit>,
    producer: Option<JoinHandle<Result<(), EngineError>>>,
    done: bool,
}

impl ResponseStream {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Registry version the request is pinned to.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Cancel the request from the transport side.
    pub fn cancel(&self) {
        self.receiver.cancel();
    }

    /// Next shaped response.
    ///
    /// Returns `None` after the last message. A cancelled or failed request
    /// yields one error and then `None`.
    pub async fn next(&mut self) -> Option<ServiceResult<ChatResponse>> {
        if self.done {
            return None;
        }

        loop {
            match self.receiver.receive_next().await {
                Ok(Some(message)) => {
                    if !self.filter.allows(&message) {
                        continue;
                    }
                    return Some(Ok(ChatResponse {
                        request_id: self.request_id,
                        version: self.version,
                        response: shape_message(&message),
                    }));
                }
                Ok(None) => {
                    self.finish(RequestOutcome::Completed);
                    return None;
                }
                Err(StreamError::Cancelled) => {
                    self.finish(RequestOutcome::Cancelled);
                    return Some(Err(StreamError::Cancelled.into()));
                }
                Err(err) => {
                    let error = self.producer_error(err).await;
                    warn!(request_id = %self.request_id, error = %error, "Streaming chat failed");
                    self.finish(RequestOutcome::Failed);
                    return Some(Err(error));
                }
            }
        }
    }

    /// Adapt into a `Stream` of responses.
    pub fn into_stream(self) -> impl Stream<Item = ServiceResult<ChatResponse>> {
        futures::stream::unfold(self, |mut responses| async move {
            let item = responses.next().await?;
            Some((item, responses))
        })
    }

    /// Why the producer went away without closing the stream.
    async fn producer_error(&mut self, fallback: StreamError) -> ServiceError {
        let Some(producer) = self.producer.take() else {
            return fallback.into();
        };
        match producer.await {
            Ok(Err(err)) => err.into(),
            Ok(Ok(())) => fallback.into(),
            Err(join_err) => {
                EngineError::ExecutionFailed(format!("engine task failed: {join_err}")).into()
            }
        }
    }

    fn finish(&mut self, outcome: RequestOutcome) {
        self.done = true;
        // Stops the timeout watchdog; the producer is already done or must stop.
        self.receiver.cancel();
        if let Some(permit) = self.permit.take() {
            debug!(request_id = %self.request_id, %outcome, "Streaming chat finished");
            permit.release(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::AllowAllAuthorizer;
    use crate::infrastructure::engine::EchoEngine;
    use crate::domain::models::{AgentNetwork, AgentSpec, RegisteredAgent};
    use serde_json::json;
    use std::path::PathBuf;

    fn registered(name: &str, public: bool) -> RegisteredAgent {
        RegisteredAgent {
            name: name.to_string(),
            source: PathBuf::from(format!("/registry/{name}.hocon")),
            public,
            network: Arc::new(AgentNetwork {
                llm_config: None,
                commondefs: None,
                metadata: None,
                tools: vec![AgentSpec {
                    name: "Front".to_string(),
                    function: Some(json!({ "description": format!("{name} front man") })),
                    instructions: None,
                    command: None,
                    class: None,
                    tools: vec!["Helper".to_string()],
                    llm_config: None,
                }, AgentSpec {
                    name: "Helper".to_string(),
                    function: None,
                    instructions: None,
                    command: None,
                    class: None,
                    tools: Vec::new(),
                    llm_config: None,
                }],
            }),
        }
    }

    fn service() -> (Arc<AdmissionController>, RequestService) {
        let store = Arc::new(ConfigStore::new(2));
        store
            .publish(ConfigSnapshot::new(
                1,
                vec![registered("hello_world", true), registered("internal", false)],
            ))
            .unwrap();
        let admission = Arc::new(AdmissionController::new(4));
        let service = RequestService::new(
            store,
            Arc::clone(&admission),
            Arc::new(EchoEngine::new()),
            Arc::new(AllowAllAuthorizer),
            RequestSettings::default(),
        );
        (admission, service)
    }

    #[test]
    fn test_list_agents_shows_public_only() {
        let (_admission, service) = service();
        let agents = service.list_agents();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].name, "hello_world");
        assert_eq!(agents[0].description.as_deref(), Some("hello_world front man"));
        assert_eq!(agents[0].version, 1);
    }

    #[test]
    fn test_function_lookup() {
        let (_admission, service) = service();
        assert_eq!(
            service.function("internal").unwrap().as_deref(),
            Some("internal front man")
        );
        assert!(matches!(
            service.function("missing"),
            Err(ServiceError::AgentNotFound { version: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_minimal_filter_yields_answer_only() {
        let (admission, service) = service();
        let mut stream = service
            .streaming_chat(ChatRequest::new("hello_world", "hi there").with_filter(ChatFilter::Minimal))
            .await
            .unwrap();

        let response = stream.next().await.unwrap().unwrap();
        assert_eq!(response.version, 1);
        assert_eq!(response.response["type"], "AI");
        assert_eq!(response.response["text"], "hi there");
        assert!(stream.next().await.is_none());
        assert!(stream.next().await.is_none());

        let stats = admission.stats();
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.completed, 1);
    }

    #[tokio::test]
    async fn test_unknown_agent_is_not_admitted() {
        let (admission, service) = service();
        let err = service
            .streaming_chat(ChatRequest::new("nope", "hi"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ServiceError::AgentNotFound { .. }));
        assert_eq!(admission.stats().total_served, 0);
    }
}
