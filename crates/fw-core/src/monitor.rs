//! Session lifecycle: start, periodic polling, the booking handoff, and stop.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::time::{self, Instant};
use uuid::Uuid;

use crate::client::{AvailabilityClient, BookingClient, BookingRequest};
use crate::poller::{AvailabilityPoller, AvailableSlotHit};
use crate::session::{CancelEffect, MonitorSession, MonitorState, SessionOutcome};
use crate::status::{StatusSink, StatusUpdate, StopReason};
use crate::types::{PartyDetails, SlotWatchSpec, ValidationError, validate_selection};

/// Time between the schedule points of consecutive cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Why `start` refused to create a session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StartError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// Only one session may be active per controller.
    #[error("session {session_id} is still active")]
    AlreadyActive { session_id: Uuid },

    /// `start` spawns the polling task and needs a Tokio runtime.
    #[error("start must be called from within a Tokio runtime")]
    NoRuntime,
}

/// A live view of a started session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    session: Arc<MonitorSession>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.session.id()
    }

    pub fn state(&self) -> MonitorState {
        self.session.state()
    }

    pub fn booking_attempted(&self) -> bool {
        self.session.booking_attempted()
    }

    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.session.outcome()
    }

    /// Resolves once the session is stopped.
    pub async fn wait(&self) -> SessionOutcome {
        let mut rx = self.session.subscribe_outcome();
        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return SessionOutcome::Cancelled;
            }
        }
    }
}

/// Owns the monitoring lifecycle.
///
/// At most one session is active at a time. Each session runs on its own
/// Tokio task that sleeps until the next schedule point, runs a cycle, and
/// either hands a hit to the booking client or schedules the next cycle.
/// Dropping the controller stops the active session.
pub struct MonitorController {
    availability: Arc<dyn AvailabilityClient>,
    booking: Arc<dyn BookingClient>,
    sink: Arc<dyn StatusSink>,
    poll_interval: Duration,
    current: Mutex<Option<Arc<MonitorSession>>>,
}

impl MonitorController {
    pub fn new(
        availability: Arc<dyn AvailabilityClient>,
        booking: Arc<dyn BookingClient>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            availability,
            booking,
            sink,
            poll_interval: DEFAULT_POLL_INTERVAL,
            current: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// State of the current session, or `Idle` if none was started.
    pub fn state(&self) -> MonitorState {
        self.current()
            .as_ref()
            .map_or(MonitorState::Idle, |session| session.state())
    }

    /// Validates the request and starts polling with an immediate first cycle.
    pub fn start(
        &self,
        specs: Vec<SlotWatchSpec>,
        party: PartyDetails,
    ) -> Result<SessionHandle, StartError> {
        validate_selection(&specs, &party)?;
        let runtime = Handle::try_current().map_err(|_| StartError::NoRuntime)?;

        let mut current = self.current();
        if let Some(active) = current.as_ref() {
            if active.state() != MonitorState::Stopped {
                return Err(StartError::AlreadyActive {
                    session_id: active.id(),
                });
            }
        }

        let session = Arc::new(MonitorSession::new(specs, party));
        *current = Some(Arc::clone(&session));
        drop(current);

        tracing::info!(
            session_id = %session.id(),
            slots = session.watched_slots().len(),
            interval_secs = self.poll_interval.as_secs(),
            "monitoring started"
        );
        self.sink.notify(&StatusUpdate::Started {
            session_id: session.id(),
            slot_count: session.watched_slots().len(),
            interval_secs: self.poll_interval.as_secs(),
        });

        let task = SessionTask {
            session: Arc::clone(&session),
            poller: AvailabilityPoller::new(Arc::clone(&self.availability), Arc::clone(&self.sink)),
            booking: Arc::clone(&self.booking),
            sink: Arc::clone(&self.sink),
            poll_interval: self.poll_interval,
        };
        runtime.spawn(task.run());

        Ok(SessionHandle { session })
    }

    /// Cancels the active session. Idempotent.
    ///
    /// A query already in flight finishes, but its result cannot trigger a
    /// booking. A booking already in flight cannot be recalled; the session
    /// stops once it resolves.
    pub fn stop(&self) {
        let current = self.current().clone();
        let Some(session) = current else {
            return;
        };
        match session.request_cancel() {
            CancelEffect::Stopped => {
                tracing::info!(session_id = %session.id(), "monitoring cancelled");
                self.sink.notify(&StatusUpdate::Stopped {
                    reason: StopReason::Cancelled,
                });
            }
            CancelEffect::Deferred => {
                tracing::info!(session_id = %session.id(), "stop requested during booking");
                self.sink.notify(&StatusUpdate::Progress {
                    message: "stop requested; waiting for the booking attempt in flight".to_string(),
                });
            }
            CancelEffect::NoOp => {}
        }
    }

    fn current(&self) -> MutexGuard<'_, Option<Arc<MonitorSession>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for MonitorController {
    fn drop(&mut self) {
        self.stop();
    }
}

struct SessionTask {
    session: Arc<MonitorSession>,
    poller: AvailabilityPoller,
    booking: Arc<dyn BookingClient>,
    sink: Arc<dyn StatusSink>,
    poll_interval: Duration,
}

impl SessionTask {
    async fn run(self) {
        let mut cancel = self.session.subscribe_cancel();
        let mut next = Instant::now();
        let mut cycle = 0_u64;

        loop {
            tokio::select! {
                biased;
                _ = cancel.wait_for(|cancelled| *cancelled) => break,
                () = time::sleep_until(next) => {}
            }
            if self.session.is_cancel_requested() {
                break;
            }

            let scheduled = next;
            cycle += 1;
            let report = self.poller.run_cycle(&self.session, cycle).await;
            if let Some(hit) = report.hit {
                self.hand_off(hit).await;
                break;
            }
            // An overrunning cycle is followed by exactly one immediate cycle;
            // missed schedule points are dropped, not replayed.
            next = (scheduled + self.poll_interval).max(Instant::now());
        }

        tracing::debug!(session_id = %self.session.id(), cycles = cycle, "session task finished");
    }

    async fn hand_off(&self, hit: AvailableSlotHit) {
        let slot_id = hit.slot.slot_id.clone();
        if !self.session.authorize_booking() {
            tracing::debug!(
                session_id = %self.session.id(),
                slot_id = %slot_id,
                "discarding hit after stop"
            );
            return;
        }

        tracing::info!(
            session_id = %self.session.id(),
            slot_id = %slot_id,
            available_units = hit.available_units,
            "attempting booking"
        );
        self.sink.notify(&StatusUpdate::BookingStarted {
            slot_id: slot_id.clone(),
            available_units: hit.available_units,
        });

        let request = BookingRequest::for_slot(&hit.slot, self.session.party());
        let outcome = match self.booking.attempt_booking(&request).await {
            Ok(confirmation) => {
                tracing::info!(
                    session_id = %self.session.id(),
                    slot_id = %slot_id,
                    booking_reference = %confirmation.booking_reference,
                    "booking succeeded"
                );
                self.sink.notify(&StatusUpdate::BookingSucceeded {
                    slot_id: slot_id.clone(),
                    confirmation: confirmation.clone(),
                });
                SessionOutcome::Booked {
                    slot_id,
                    confirmation,
                }
            }
            Err(error) => {
                tracing::error!(
                    session_id = %self.session.id(),
                    slot_id = %slot_id,
                    %error,
                    "booking failed"
                );
                self.sink.notify(&StatusUpdate::BookingFailed {
                    slot_id: slot_id.clone(),
                    message: error.to_string(),
                });
                SessionOutcome::BookingFailed { slot_id, error }
            }
        };

        let reason = outcome.stop_reason();
        self.session.finish(outcome);
        self.sink.notify(&StatusUpdate::Stopped { reason });
    }
}
