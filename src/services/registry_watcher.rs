//! Registry watcher: filesystem events in, published snapshots out.
//!
//! ```text
//!   notify thread ──ChangeEvent──▶ Debouncer ──ReloadTrigger──▶ reload lane ──▶ ConfigStore
//!                                                                    ▲
//!                                                   reload(reason) ──┘
//! ```
//!
//! The reload lane is the only place snapshots are built and published, so
//! loads run one at a time in arrival order. Triggers that queue up behind a
//! running load are merged into the next one. A failed load is logged and
//! the current snapshot stays in place; its affected paths are folded into
//! the next trigger so an edit is never skipped by a later incremental load.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use notify::RecommendedWatcher;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::errors::{RegistryError, RegistryResult};
use crate::domain::models::{
    ChangeEvent, ChangeKind, RegistryConfig, ReloadReason, ReloadTrigger, WatcherPolicy,
};
use crate::infrastructure::fs_watch::{self, RegistryPathFilter};

use super::config_store::ConfigStore;
use super::debouncer::Debouncer;
use super::registry_loader::RegistryLoader;

const TRIGGER_QUEUE_CAPACITY: usize = 16;

/// Observed filesystem events by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventCounts {
    pub created: u64,
    pub modified: u64,
    pub deleted: u64,
}

impl EventCounts {
    pub fn total(&self) -> u64 {
        self.created + self.modified + self.deleted
    }
}

#[derive(Debug, Default)]
struct EventCounters {
    created: AtomicU64,
    modified: AtomicU64,
    deleted: AtomicU64,
}

impl EventCounters {
    fn counter(&self, kind: ChangeKind) -> &AtomicU64 {
        match kind {
            ChangeKind::Created => &self.created,
            ChangeKind::Modified => &self.modified,
            ChangeKind::Deleted => &self.deleted,
        }
    }

    fn record(&self, kind: ChangeKind) {
        self.counter(kind).fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> EventCounts {
        EventCounts {
            created: self.created.load(Ordering::Relaxed),
            modified: self.modified.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) -> EventCounts {
        EventCounts {
            created: self.created.swap(0, Ordering::Relaxed),
            modified: self.modified.swap(0, Ordering::Relaxed),
            deleted: self.deleted.swap(0, Ordering::Relaxed),
        }
    }
}

/// Tunables for the watcher pipeline.
#[derive(Debug, Clone)]
pub struct WatcherSettings {
    pub debounce: Duration,
    pub event_channel_capacity: usize,
    pub definition_extensions: Vec<String>,
    pub policy: WatcherPolicy,
}

impl From<&RegistryConfig> for WatcherSettings {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            debounce: Duration::from_millis(config.debounce_ms),
            event_channel_capacity: config.event_channel_capacity,
            definition_extensions: config.definition_extensions.clone(),
            policy: config.policy,
        }
    }
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self::from(&RegistryConfig::default())
    }
}

struct ReloadRequest {
    trigger: ReloadTrigger,
    reply: oneshot::Sender<RegistryResult<u64>>,
}

struct Running {
    // Dropping the watcher ends the subscription and closes the event channel.
    watcher: RecommendedWatcher,
    requests: mpsc::Sender<ReloadRequest>,
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Owns the filesystem subscription and the reload pipeline.
pub struct RegistryWatcher {
    loader: RegistryLoader,
    store: Arc<ConfigStore>,
    settings: WatcherSettings,
    counters: Arc<EventCounters>,
    running: Mutex<Option<Running>>,
}

impl RegistryWatcher {
    pub fn new(loader: RegistryLoader, store: Arc<ConfigStore>, settings: WatcherSettings) -> Self {
        Self {
            loader,
            store,
            settings,
            counters: Arc::new(EventCounters::default()),
            running: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn manifest_path(&self) -> &Path {
        self.loader.manifest_path()
    }

    /// Establish the filesystem subscription and start the reload pipeline.
    ///
    /// Fails only if the manifest is missing or the subscription cannot be
    /// created. Does not load anything; call [`RegistryWatcher::reload`] for
    /// the initial snapshot. Starting a running watcher is a no-op.
    pub fn start(&self) -> RegistryResult<()> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            debug!("Registry watcher already running");
            return Ok(());
        }

        let manifest_path = self.loader.manifest_path();
        if !manifest_path.is_file() {
            return Err(RegistryError::ManifestMissing(manifest_path.to_path_buf()));
        }
        let dir = self.loader.base_dir().to_path_buf();
        let manifest_name = manifest_path.file_name().unwrap_or_default().to_os_string();
        let filter = RegistryPathFilter::new(
            &dir,
            manifest_name,
            &self.settings.definition_extensions,
        );

        let (event_tx, event_rx) = mpsc::channel(self.settings.event_channel_capacity.max(1));
        let counters = Arc::clone(&self.counters);
        let policy = self.settings.policy;

        let watcher = fs_watch::watch_directory(&dir, move |path, kind| {
            if !filter.is_relevant(&path) {
                return;
            }
            counters.record(kind);
            if !policy.allows(kind) {
                debug!(path = %path.display(), %kind, "Change ignored by watcher policy");
                return;
            }
            // Runs on the notify thread: block rather than drop events when the debouncer lags.
            if event_tx.blocking_send(ChangeEvent::new(path, kind)).is_err() {
                debug!("Change dropped: registry pipeline stopped");
            }
        })
        .map_err(|e| RegistryError::WatchFailed(e.to_string()))?;

        let token = CancellationToken::new();
        let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_QUEUE_CAPACITY);
        let (request_tx, request_rx) = mpsc::channel(TRIGGER_QUEUE_CAPACITY);

        let debouncer = Debouncer::new(event_rx, self.settings.debounce);
        let lane = ReloadLane::new(self.loader.clone(), Arc::clone(&self.store));
        let tasks = vec![
            tokio::spawn(debouncer.run(trigger_tx)),
            tokio::spawn(lane.run(trigger_rx, request_rx, token.clone())),
        ];

        info!(
            directory = %dir.display(),
            debounce_ms = self.settings.debounce.as_millis() as u64,
            "Registry watcher started"
        );
        *running = Some(Running {
            watcher,
            requests: request_tx,
            token,
            tasks,
        });
        Ok(())
    }

    /// Run a full reload through the reload lane and return the published version.
    pub async fn reload(&self, reason: ReloadReason) -> RegistryResult<u64> {
        let requests = {
            let running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
            running
                .as_ref()
                .map(|r| r.requests.clone())
                .ok_or(RegistryError::WatcherStopped)?
        };

        let (reply, response) = oneshot::channel();
        requests
            .send(ReloadRequest {
                trigger: ReloadTrigger::full(reason),
                reply,
            })
            .await
            .map_err(|_| RegistryError::WatcherStopped)?;
        response.await.map_err(|_| RegistryError::WatcherStopped)?
    }

    /// Tear down the subscription and the pipeline. Safe to call repeatedly.
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(running) = running else {
            return;
        };

        running.token.cancel();
        drop(running.watcher);
        drop(running.requests);
        for task in running.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Registry watcher task ended abnormally");
            }
        }
        info!("Registry watcher stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Observed events since start or the last reset.
    pub fn event_counts(&self) -> EventCounts {
        self.counters.snapshot()
    }

    /// Return the observed counts and reset them to zero.
    pub fn reset_event_counters(&self) -> EventCounts {
        self.counters.reset()
    }
}

struct ReloadLane {
    loader: RegistryLoader,
    store: Arc<ConfigStore>,
    /// Changes from failed loads that no published snapshot reflects yet.
    unapplied: Option<ReloadTrigger>,
}

impl ReloadLane {
    fn new(loader: RegistryLoader, store: Arc<ConfigStore>) -> Self {
        Self {
            loader,
            store,
            unapplied: None,
        }
    }

    async fn run(
        mut self,
        mut triggers: mpsc::Receiver<ReloadTrigger>,
        mut requests: mpsc::Receiver<ReloadRequest>,
        token: CancellationToken,
    ) {
        loop {
            let (mut trigger, mut reply) = tokio::select! {
                biased;
                () = token.cancelled() => break,
                Some(request) = requests.recv() => (request.trigger, Some(request.reply)),
                Some(trigger) = triggers.recv() => (trigger, None),
                else => break,
            };

            if reply.is_none() {
                if let Ok(request) = requests.try_recv() {
                    trigger.merge(request.trigger);
                    reply = Some(request.reply);
                }
            }
            let mut merged = 0usize;
            while let Ok(queued) = triggers.try_recv() {
                trigger.merge(queued);
                merged += 1;
            }
            if merged > 0 {
                debug!(merged, "Merged queued reload triggers");
            }

            let result = self.apply(trigger).await;
            if let Some(reply) = reply {
                let _ = reply.send(result);
            }
        }
        debug!("Reload lane stopped");
    }

    /// Load and publish `trigger` together with any changes a failed load left behind.
    async fn apply(&mut self, trigger: ReloadTrigger) -> RegistryResult<u64> {
        let trigger = match self.unapplied.take() {
            Some(mut earlier) => {
                debug!(
                    carried = earlier.changes.len(),
                    "Carrying changes from a rejected reload"
                );
                earlier.merge(trigger);
                earlier
            }
            None => trigger,
        };

        let result = self.reload(trigger.clone()).await;
        if result.is_err() {
            self.unapplied = Some(trigger);
        }
        result
    }

    async fn reload(&self, trigger: ReloadTrigger) -> RegistryResult<u64> {
        let reason = trigger.reason;
        let previous = self.store.current();
        let loader = self.loader.clone();
        let started = Instant::now();

        let loaded = tokio::task::spawn_blocking(move || loader.load(&trigger, &previous))
            .await
            .unwrap_or_else(|e| {
                Err(RegistryError::invalid(
                    self.loader.manifest_path(),
                    format!("registry load task failed: {e}"),
                ))
            });

        match loaded.and_then(|snapshot| self.store.publish(snapshot)) {
            Ok(snapshot) => {
                info!(
                    version = snapshot.version,
                    agents = snapshot.len(),
                    %reason,
                    latency_ms = started.elapsed().as_millis() as u64,
                    "Registry reloaded"
                );
                Ok(snapshot.version)
            }
            Err(err) => {
                warn!(
                    error = %err,
                    %reason,
                    current_version = self.store.current_version(),
                    "Registry reload rejected, keeping current snapshot"
                );
                Err(err)
            }
        }
    }
}
