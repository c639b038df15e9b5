//! Server lifecycle: wiring, startup and graceful shutdown.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::errors::RegistryResult;
use crate::domain::models::{Config, ReloadReason, ServerState};
use crate::domain::ports::{AgentEngine, Authorizer};
use crate::services::{
    AdmissionController, ConfigStore, DiagnosticsReport, DiagnosticsReporter, RegistryLoader,
    RegistryWatcher, WatcherSettings,
};

use super::request_service::{RequestService, RequestSettings};

/// Outcome of a graceful shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every in-flight request finished before the deadline.
    Drained,
    /// The drain deadline passed with requests still running.
    TimedOut { in_flight: usize },
}

/// The server core: registry, admission and request path, without a transport.
pub struct AgentServer {
    store: Arc<ConfigStore>,
    admission: Arc<AdmissionController>,
    watcher: Arc<RegistryWatcher>,
    requests: Arc<RequestService>,
    diagnostics: Arc<DiagnosticsReporter>,
    report_interval: Option<Duration>,
    drain_timeout: Duration,
    background: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl AgentServer {
    pub fn new(
        config: &Config,
        engine: Arc<dyn AgentEngine>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        let store = Arc::new(ConfigStore::new(config.registry.retained_versions));
        let admission = Arc::new(AdmissionController::new(
            config.server.max_concurrent_requests,
        ));
        let watcher = Arc::new(RegistryWatcher::new(
            RegistryLoader::new(PathBuf::from(&config.registry.manifest_path)),
            Arc::clone(&store),
            WatcherSettings::from(&config.registry),
        ));
        let requests = Arc::new(RequestService::new(
            Arc::clone(&store),
            Arc::clone(&admission),
            engine,
            authorizer,
            RequestSettings::from(&config.streaming),
        ));
        let diagnostics = Arc::new(DiagnosticsReporter::new(
            Arc::clone(&store),
            Arc::clone(&admission),
            Arc::clone(&watcher),
        ));
        let report_interval = match config.diagnostics.report_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            store,
            admission,
            watcher,
            requests,
            diagnostics,
            report_interval,
            drain_timeout: Duration::from_secs(config.server.drain_timeout_secs),
            background: Mutex::new(None),
        }
    }

    /// Subscribe to the registry, load the initial snapshot and start reporting.
    ///
    /// Only a missing manifest or a failed subscription is fatal. An invalid
    /// initial registry is logged and the server keeps serving version 0
    /// until a later edit loads cleanly. Returns the published version.
    pub async fn start(&self) -> RegistryResult<u64> {
        self.watcher.start()?;

        let version = match self.watcher.reload(ReloadReason::Startup).await {
            Ok(version) => version,
            Err(err) => {
                warn!(error = %err, "Initial registry load failed, serving an empty registry");
                self.store.current_version()
            }
        };

        if let Some(period) = self.report_interval {
            let mut background = self.background.lock().unwrap_or_else(PoisonError::into_inner);
            if background.is_none() {
                let token = CancellationToken::new();
                let handle = Arc::clone(&self.diagnostics).spawn(period, token.clone());
                *background = Some((token, handle));
            }
        }

        info!(
            version,
            manifest = %self.watcher.manifest_path().display(),
            "Agent server started"
        );
        Ok(version)
    }

    /// Drain in-flight requests, then stop the watcher and the reporter.
    ///
    /// Waits at most the configured drain timeout. Calling it again after it
    /// returned is harmless.
    pub async fn shutdown(&self) -> ShutdownOutcome {
        info!(in_flight = self.admission.stats().in_flight, "Shutting down agent server");
        self.admission.begin_drain();

        let outcome =
            match tokio::time::timeout(self.drain_timeout, self.admission.wait_stopped()).await {
                Ok(()) => ShutdownOutcome::Drained,
                Err(_) => {
                    let in_flight = self.admission.stats().in_flight;
                    warn!(
                        in_flight,
                        timeout_secs = self.drain_timeout.as_secs(),
                        "Drain timed out with requests still running"
                    );
                    ShutdownOutcome::TimedOut { in_flight }
                }
            };

        self.watcher.stop().await;

        let background = self
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((token, handle)) = background {
            token.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "Diagnostics reporter ended abnormally");
            }
        }

        let report = self.diagnostics.collect(false);
        info!(
            total_served = report.admission.total_served,
            state = %report.admission.state,
            "Agent server stopped"
        );
        outcome
    }

    pub fn requests(&self) -> &Arc<RequestService> {
        &self.requests
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn admission(&self) -> &Arc<AdmissionController> {
        &self.admission
    }

    pub fn watcher(&self) -> &Arc<RegistryWatcher> {
        &self.watcher
    }

    pub fn state(&self) -> ServerState {
        self.admission.state()
    }

    pub fn diagnostics(&self) -> DiagnosticsReport {
        self.diagnostics.collect(false)
    }
}
