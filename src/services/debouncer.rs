//! Coalesces bursts of filesystem events into reload triggers.
//!
//! The window is fixed and starts at the first event of a burst, so a
//! continuous stream of writes still produces one trigger per window rather
//! than postponing the reload indefinitely.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use crate::domain::models::{ChangeEvent, ReloadTrigger};

pub struct Debouncer {
    events: mpsc::Receiver<ChangeEvent>,
    window: Duration,
}

impl Debouncer {
    pub fn new(events: mpsc::Receiver<ChangeEvent>, window: Duration) -> Self {
        Self { events, window }
    }

    /// Wait for the next burst and return it as one trigger.
    ///
    /// Returns `None` once the event channel is closed and drained.
    pub async fn next_trigger(&mut self) -> Option<ReloadTrigger> {
        let first = self.events.recv().await?;
        let deadline = Instant::now() + self.window;
        let mut burst = vec![first];

        loop {
            tokio::select! {
                () = tokio::time::sleep_until(deadline) => break,
                event = self.events.recv() => match event {
                    Some(event) => burst.push(event),
                    None => break,
                },
            }
        }

        let raw_events = burst.len();
        let trigger = ReloadTrigger::from_events(burst);
        debug!(
            raw_events,
            paths = trigger.changes.len(),
            reason = %trigger.reason,
            "Coalesced filesystem events"
        );
        Some(trigger)
    }

    /// Forward triggers until either side of the pipeline goes away.
    pub async fn run(mut self, triggers: mpsc::Sender<ReloadTrigger>) {
        while let Some(trigger) = self.next_trigger().await {
            if triggers.send(trigger).await.is_err() {
                break;
            }
        }
        debug!("Debouncer stopped");
    }
}
