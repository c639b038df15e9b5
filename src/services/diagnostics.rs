//! Periodic diagnostics.
//!
//! Emits one structured record per interval with the admission counters,
//! the registry version, and the filesystem events observed since the
//! previous report.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domain::models::AdmissionStats;

use super::admission_controller::AdmissionController;
use super::config_store::ConfigStore;
use super::registry_watcher::{EventCounts, RegistryWatcher};

/// Point-in-time view of the server core.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsReport {
    pub timestamp: DateTime<Utc>,
    pub registry_version: u64,
    pub retained_versions: Vec<u64>,
    pub agents: usize,
    pub admission: AdmissionStats,
    pub events: EventCounts,
}

/// Collects and logs [`DiagnosticsReport`]s.
pub struct DiagnosticsReporter {
    store: Arc<ConfigStore>,
    admission: Arc<AdmissionController>,
    watcher: Arc<RegistryWatcher>,
}

impl DiagnosticsReporter {
    pub fn new(
        store: Arc<ConfigStore>,
        admission: Arc<AdmissionController>,
        watcher: Arc<RegistryWatcher>,
    ) -> Self {
        Self {
            store,
            admission,
            watcher,
        }
    }

    /// Build a report. With `reset_events` the event counters restart from zero.
    pub fn collect(&self, reset_events: bool) -> DiagnosticsReport {
        let snapshot = self.store.current();
        let events = if reset_events {
            self.watcher.reset_event_counters()
        } else {
            self.watcher.event_counts()
        };

        DiagnosticsReport {
            timestamp: Utc::now(),
            registry_version: snapshot.version,
            retained_versions: self.store.retained(),
            agents: snapshot.len(),
            admission: self.admission.stats(),
            events,
        }
    }

    /// Log a report every `period` until `token` is cancelled.
    pub fn spawn(self: Arc<Self>, period: Duration, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            info!(interval_secs = period.as_secs(), "Diagnostics reporter started");
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let report = self.collect(true);
                        log_report(&report);
                    }
                }
            }
            debug!("Diagnostics reporter stopped");
        })
    }
}

fn log_report(report: &DiagnosticsReport) {
    info!(
        registry_version = report.registry_version,
        agents = report.agents,
        state = %report.admission.state,
        in_flight = report.admission.in_flight,
        limit = report.admission.limit,
        total_served = report.admission.total_served,
        completed = report.admission.completed,
        failed = report.admission.failed,
        cancelled = report.admission.cancelled,
        events_created = report.events.created,
        events_modified = report.events.modified,
        events_deleted = report.events.deleted,
        "Server diagnostics"
    );
}
