//! Admission control and drain lifecycle.
//!
//! State machine:
//!
//! ```text
//!   Serving ──begin_drain()──▶ Draining ──in_flight == 0──▶ Stopped
//! ```
//!
//! Counters are updated with atomic compare-and-increment so concurrent
//! admits and releases never push `in_flight` past the limit or below zero.
//! Every admitted request must be released exactly once; [`AdmissionPermit`]
//! does that on drop for callers that cannot guarantee it on every path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::AdmissionError;
use crate::domain::models::{
    AdmissionStats, CallerIdentity, ConfigSnapshot, RequestContext, RequestOutcome, ServerState,
};

/// Gatekeeper for new requests.
#[derive(Debug)]
pub struct AdmissionController {
    limit: usize,
    state: AtomicU8,
    in_flight: AtomicUsize,
    total_served: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    /// Admitted, not yet released request ids.
    active: Mutex<HashMap<Uuid, DateTime<Utc>>>,
    stopped: Notify,
}

impl AdmissionController {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            state: AtomicU8::new(ServerState::Serving.to_u8()),
            in_flight: AtomicUsize::new(0),
            total_served: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            active: Mutex::new(HashMap::new()),
            stopped: Notify::new(),
        }
    }

    pub fn state(&self) -> ServerState {
        ServerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Admit a request pinned to `snapshot`.
    pub fn try_admit(
        &self,
        caller: CallerIdentity,
        snapshot: Arc<ConfigSnapshot>,
    ) -> Result<RequestContext, AdmissionError> {
        let state = self.state();
        if state != ServerState::Serving {
            return Err(AdmissionError::NotServing(state));
        }

        let reserved = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.limit).then_some(n + 1)
            });
        if reserved.is_err() {
            debug!(limit = self.limit, caller = %caller, "Admission refused: at capacity");
            return Err(AdmissionError::CapacityExceeded { limit: self.limit });
        }

        // A drain may have started between the state check and the reservation.
        let state = self.state();
        if state != ServerState::Serving {
            self.decrement_in_flight();
            return Err(AdmissionError::NotServing(state));
        }

        let context = RequestContext::new(caller, snapshot);
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(context.request_id, context.started_at);
        self.total_served.fetch_add(1, Ordering::SeqCst);

        debug!(
            request_id = %context.request_id,
            version = context.pinned_version(),
            "Request admitted"
        );
        Ok(context)
    }

    /// Admit a request and wrap it in a permit that releases itself on drop.
    pub fn admit(
        self: &Arc<Self>,
        caller: CallerIdentity,
        snapshot: Arc<ConfigSnapshot>,
    ) -> Result<AdmissionPermit, AdmissionError> {
        let context = self.try_admit(caller, snapshot)?;
        Ok(AdmissionPermit {
            controller: Arc::clone(self),
            context,
            released: false,
        })
    }

    /// Release an admitted request.
    ///
    /// Returns `false` (and changes nothing) for an id that is unknown or was
    /// already released.
    pub fn release(&self, request_id: Uuid, outcome: RequestOutcome) -> bool {
        let started_at = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&request_id);
        let Some(started_at) = started_at else {
            warn!(%request_id, "Release of unknown or already released request ignored");
            return false;
        };

        match outcome {
            RequestOutcome::Completed => &self.completed,
            RequestOutcome::Failed => &self.failed,
            RequestOutcome::Cancelled => &self.cancelled,
        }
        .fetch_add(1, Ordering::SeqCst);

        let elapsed_ms = (Utc::now() - started_at).num_milliseconds();
        debug!(%request_id, %outcome, elapsed_ms, "Request released");

        self.decrement_in_flight();
        true
    }

    /// Stop admitting new requests; already admitted ones may finish.
    pub fn begin_drain(&self) -> ServerState {
        if self
            .state
            .compare_exchange(
                ServerState::Serving.to_u8(),
                ServerState::Draining.to_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
        {
            info!(
                in_flight = self.in_flight.load(Ordering::SeqCst),
                "Draining: no new requests will be admitted"
            );
        }
        self.stop_if_drained();
        self.state()
    }

    /// Wait until the controller reaches `Stopped`.
    pub async fn wait_stopped(&self) {
        loop {
            let notified = self.stopped.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.state() == ServerState::Stopped {
                return;
            }
            notified.await;
        }
    }

    /// `begin_drain` followed by `wait_stopped`.
    pub async fn drain(&self) {
        self.begin_drain();
        self.wait_stopped().await;
    }

    pub fn stats(&self) -> AdmissionStats {
        AdmissionStats {
            state: self.state(),
            total_served: self.total_served.load(Ordering::SeqCst),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            limit: self.limit,
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            cancelled: self.cancelled.load(Ordering::SeqCst),
        }
    }

    fn decrement_in_flight(&self) {
        let previous = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if previous == Ok(1) {
            self.stop_if_drained();
        }
    }

    fn stop_if_drained(&self) {
        if self.in_flight.load(Ordering::SeqCst) != 0 {
            return;
        }
        if self
            .state
            .compare_exchange(
                ServerState::Draining.to_u8(),
                ServerState::Stopped.to_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
        {
            info!(
                total_served = self.total_served.load(Ordering::SeqCst),
                "Drain complete, admission stopped"
            );
            self.stopped.notify_waiters();
        }
    }
}

/// Scoped admission: releases its request when dropped.
///
/// A permit dropped without [`AdmissionPermit::release`] counts as cancelled,
/// which is what happens when a consumer disconnects mid-stream.
#[derive(Debug)]
pub struct AdmissionPermit {
    controller: Arc<AdmissionController>,
    context: RequestContext,
    released: bool,
}

impl AdmissionPermit {
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn request_id(&self) -> Uuid {
        self.context.request_id
    }

    /// Release with an explicit outcome.
    pub fn release(mut self, outcome: RequestOutcome) {
        self.finish(outcome);
    }

    pub(crate) fn finish(&mut self, outcome: RequestOutcome) {
        if !self.released {
            self.released = true;
            self.controller.release(self.context.request_id, outcome);
        }
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.finish(RequestOutcome::Cancelled);
    }
}
