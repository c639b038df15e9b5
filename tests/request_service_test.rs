//! Request path end to end: authorization, pinning, admission, streaming
//! and release on every exit path.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use common::snapshot;
use neurohost::application::{RequestService, RequestSettings};
use neurohost::domain::errors::{
    AdmissionError, EngineError, RegistryError, ServiceError, StreamError,
};
use neurohost::domain::models::{CallerIdentity, ChatMessage, ChatRequest};
use neurohost::domain::ports::{AgentEngine, AllowAllAuthorizer, Authorizer, EngineRequest, MessageSink};
use neurohost::infrastructure::engine::EchoEngine;
use neurohost::services::{AdmissionController, ConfigStore};

/// Waits for the gate to open, then reports what its pinned snapshot contains.
struct SnapshotReportingEngine {
    gate: watch::Receiver<bool>,
}

#[async_trait]
impl AgentEngine for SnapshotReportingEngine {
    fn name(&self) -> &'static str {
        "snapshot-reporting"
    }

    async fn run(&self, request: EngineRequest, sink: &mut dyn MessageSink) -> Result<(), EngineError> {
        let mut gate = self.gate.clone();
        gate.wait_for(|open| *open)
            .await
            .map_err(|e| EngineError::ExecutionFailed(e.to_string()))?;

        let names: Vec<&str> = request.context.snapshot.agent_names().collect();
        sink.send(ChatMessage::ai(format!(
            "v{} {}",
            request.context.pinned_version(),
            names.join(",")
        )))
        .await?;
        sink.close().await?;
        Ok(())
    }
}

/// Emits one progress message and then fails.
struct FailingEngine;

#[async_trait]
impl AgentEngine for FailingEngine {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn run(&self, _request: EngineRequest, sink: &mut dyn MessageSink) -> Result<(), EngineError> {
        sink.send(ChatMessage::progress("warming up")).await?;
        Err(EngineError::ExecutionFailed("model unavailable".to_string()))
    }
}

/// Only the caller named `admin` may use anything.
struct AdminOnly;

#[async_trait]
impl Authorizer for AdminOnly {
    async fn is_authorized(&self, caller: &CallerIdentity, _agent_name: &str) -> bool {
        caller.0 == "admin"
    }
}

struct Fixture {
    store: Arc<ConfigStore>,
    admission: Arc<AdmissionController>,
    service: RequestService,
}

fn fixture(
    limit: usize,
    engine: Arc<dyn AgentEngine>,
    authorizer: Arc<dyn Authorizer>,
    settings: RequestSettings,
) -> Fixture {
    let store = Arc::new(ConfigStore::new(2));
    store.publish(snapshot(1, &["hello_world"])).unwrap();
    let admission = Arc::new(AdmissionController::new(limit));
    let service = RequestService::new(
        Arc::clone(&store),
        Arc::clone(&admission),
        engine,
        authorizer,
        settings,
    );
    Fixture {
        store,
        admission,
        service,
    }
}

fn echo_fixture(limit: usize) -> Fixture {
    fixture(
        limit,
        Arc::new(EchoEngine::new()),
        Arc::new(AllowAllAuthorizer),
        RequestSettings::default(),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pinned_request_keeps_its_version_across_a_reload() {
    let (open, gate) = watch::channel(false);
    let f = fixture(
        4,
        Arc::new(SnapshotReportingEngine { gate }),
        Arc::new(AllowAllAuthorizer),
        RequestSettings::default(),
    );

    let mut before = f
        .service
        .streaming_chat(ChatRequest::new("hello_world", "what do you know?"))
        .await
        .unwrap();
    assert_eq!(before.version(), 1);

    f.store
        .publish(snapshot(2, &["hello_world", "music_nerd_pro"]))
        .unwrap();
    let mut after = f
        .service
        .streaming_chat(ChatRequest::new("music_nerd_pro", "and now?"))
        .await
        .unwrap();
    assert_eq!(after.version(), 2);

    open.send(true).unwrap();

    let old = before.next().await.unwrap().unwrap();
    assert_eq!(old.version, 1);
    assert_eq!(old.response["text"], "v1 hello_world");
    assert!(before.next().await.is_none());

    let new = after.next().await.unwrap().unwrap();
    assert_eq!(new.version, 2);
    assert_eq!(new.response["text"], "v2 hello_world,music_nerd_pro");
    assert!(after.next().await.is_none());

    assert_eq!(f.admission.stats().completed, 2);
}

#[tokio::test]
async fn test_explicit_version_and_retired_version() {
    let f = echo_fixture(4);
    f.store.publish(snapshot(2, &["hello_world"])).unwrap();

    let mut pinned = f
        .service
        .streaming_chat(ChatRequest::new("hello_world", "hi").at_version(1))
        .await
        .unwrap();
    assert_eq!(pinned.version(), 1);
    assert!(pinned.next().await.unwrap().is_ok());
    assert!(pinned.next().await.is_none());

    f.store.publish(snapshot(3, &["hello_world"])).unwrap();
    let err = f
        .service
        .streaming_chat(ChatRequest::new("hello_world", "hi").at_version(1))
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        ServiceError::Registry(RegistryError::SnapshotRetired(1))
    ));
    assert_eq!(f.admission.stats().total_served, 1);
}

#[tokio::test]
async fn test_unauthorized_caller_is_refused_before_admission() {
    let f = fixture(
        4,
        Arc::new(EchoEngine::new()),
        Arc::new(AdminOnly),
        RequestSettings::default(),
    );

    let err = f
        .service
        .streaming_chat(ChatRequest::new("hello_world", "hi").with_caller(CallerIdentity::new("guest")))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ServiceError::Unauthorized { ref agent } if agent == "hello_world"));
    assert_eq!(f.admission.stats().total_served, 0);

    let mut allowed = f
        .service
        .streaming_chat(ChatRequest::new("hello_world", "hi").with_caller(CallerIdentity::new("admin")))
        .await
        .unwrap();
    assert!(allowed.next().await.unwrap().is_ok());
}

#[tokio::test]
async fn test_capacity_is_shared_by_open_streams() {
    let f = echo_fixture(1);

    let first = f
        .service
        .streaming_chat(ChatRequest::new("hello_world", "one"))
        .await
        .unwrap();
    let err = f
        .service
        .streaming_chat(ChatRequest::new("hello_world", "two"))
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        ServiceError::Admission(AdmissionError::CapacityExceeded { limit: 1 })
    ));

    drop(first);
    assert!(f
        .service
        .streaming_chat(ChatRequest::new("hello_world", "three"))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_engine_failure_is_reported_and_released_as_failed() {
    let f = fixture(
        4,
        Arc::new(FailingEngine),
        Arc::new(AllowAllAuthorizer),
        RequestSettings::default(),
    );
    let mut stream = f
        .service
        .streaming_chat(ChatRequest::new("hello_world", "hi"))
        .await
        .unwrap();

    let progress = stream.next().await.unwrap().unwrap();
    assert_eq!(progress.response["type"], "AGENT_PROGRESS");

    let err = stream.next().await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Engine(EngineError::ExecutionFailed(ref reason)) if reason == "model unavailable"
    ));
    assert!(stream.next().await.is_none());

    let stats = f.admission.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.in_flight, 0);
}

#[tokio::test(start_paused = true)]
async fn test_request_timeout_cancels_the_request() {
    let f = fixture(
        4,
        Arc::new(EchoEngine::new().with_step_delay(Duration::from_secs(60))),
        Arc::new(AllowAllAuthorizer),
        RequestSettings {
            buffer_capacity: 4,
            request_timeout: Some(Duration::from_millis(50)),
        },
    );
    let mut stream = f
        .service
        .streaming_chat(ChatRequest::new("hello_world", "hi"))
        .await
        .unwrap();

    let err = stream.next().await.unwrap().unwrap_err();
    assert!(matches!(err, ServiceError::Stream(StreamError::Cancelled)));
    assert!(stream.next().await.is_none());

    let stats = f.admission.stats();
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.in_flight, 0);
}

#[tokio::test]
async fn test_dropping_the_stream_cancels_and_releases() {
    let f = fixture(
        4,
        Arc::new(EchoEngine::new().with_step_delay(Duration::from_secs(60))),
        Arc::new(AllowAllAuthorizer),
        RequestSettings::default(),
    );
    let stream = f
        .service
        .streaming_chat(ChatRequest::new("hello_world", "hi"))
        .await
        .unwrap();
    assert_eq!(f.admission.stats().in_flight, 1);

    drop(stream);

    let stats = f.admission.stats();
    assert_eq!(stats.in_flight, 0);
    assert_eq!(stats.cancelled, 1);
}
