//! Per-session state shared between the controller and its polling task.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use uuid::Uuid;

use crate::client::{BookingConfirmation, BookingError};
use crate::status::StopReason;
use crate::types::{PartyDetails, SlotId, SlotWatchSpec};

/// Lifecycle state reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorState {
    /// No session has been started.
    Idle,
    /// Slots are being polled.
    Running,
    /// A booking attempt is in flight; polling has ended.
    Stopping,
    /// The session is over.
    Stopped,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Stopped before any booking attempt was authorized.
    Cancelled,
    Booked {
        slot_id: SlotId,
        confirmation: BookingConfirmation,
    },
    BookingFailed {
        slot_id: SlotId,
        error: BookingError,
    },
}

impl SessionOutcome {
    pub const fn stop_reason(&self) -> StopReason {
        match self {
            Self::Cancelled => StopReason::Cancelled,
            Self::Booked { .. } => StopReason::Booked,
            Self::BookingFailed { .. } => StopReason::BookingFailed,
        }
    }
}

/// Result of a `stop` request against a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CancelEffect {
    /// The session was polling and is now stopped.
    Stopped,
    /// A booking is in flight; the session stops once it resolves.
    Deferred,
    /// Nothing changed.
    NoOp,
}

#[derive(Debug)]
struct SessionFlags {
    state: MonitorState,
    booking_attempted: bool,
    cancel_requested: bool,
}

/// One monitoring request, from `start` to `Stopped`.
///
/// The slot list and party are fixed at creation. `state`,
/// `booking_attempted` and `cancel_requested` are guarded by a single mutex
/// so the check-then-mark in [`MonitorSession::authorize_booking`] cannot
/// interleave with a concurrent stop.
#[derive(Debug)]
pub struct MonitorSession {
    id: Uuid,
    watched_slots: Vec<SlotWatchSpec>,
    party: PartyDetails,
    flags: Mutex<SessionFlags>,
    cancel_tx: watch::Sender<bool>,
    outcome_tx: watch::Sender<Option<SessionOutcome>>,
}

impl MonitorSession {
    /// Creates a session in the `Running` state. Inputs must already be validated.
    pub(crate) fn new(watched_slots: Vec<SlotWatchSpec>, party: PartyDetails) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        let (outcome_tx, _) = watch::channel(None);
        Self {
            id: Uuid::new_v4(),
            watched_slots,
            party,
            flags: Mutex::new(SessionFlags {
                state: MonitorState::Running,
                booking_attempted: false,
                cancel_requested: false,
            }),
            cancel_tx,
            outcome_tx,
        }
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Slots in registration order.
    pub fn watched_slots(&self) -> &[SlotWatchSpec] {
        &self.watched_slots
    }

    pub const fn party(&self) -> &PartyDetails {
        &self.party
    }

    pub fn state(&self) -> MonitorState {
        self.flags().state
    }

    pub fn booking_attempted(&self) -> bool {
        self.flags().booking_attempted
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.flags().cancel_requested
    }

    /// The terminal outcome, once the session is stopped.
    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.outcome_tx.borrow().clone()
    }

    pub(crate) fn subscribe_cancel(&self) -> watch::Receiver<bool> {
        self.cancel_tx.subscribe()
    }

    pub(crate) fn subscribe_outcome(&self) -> watch::Receiver<Option<SessionOutcome>> {
        self.outcome_tx.subscribe()
    }

    /// Records a stop request and wakes the polling task.
    pub(crate) fn request_cancel(&self) -> CancelEffect {
        let effect = {
            let mut flags = self.flags();
            if flags.cancel_requested {
                CancelEffect::NoOp
            } else {
                match flags.state {
                    MonitorState::Running => {
                        flags.cancel_requested = true;
                        flags.state = MonitorState::Stopped;
                        self.outcome_tx.send_replace(Some(SessionOutcome::Cancelled));
                        CancelEffect::Stopped
                    }
                    MonitorState::Stopping => {
                        flags.cancel_requested = true;
                        CancelEffect::Deferred
                    }
                    MonitorState::Idle | MonitorState::Stopped => CancelEffect::NoOp,
                }
            }
        };
        if effect != CancelEffect::NoOp {
            self.cancel_tx.send_replace(true);
        }
        effect
    }

    /// The single authorization point for a booking attempt.
    ///
    /// Returns `true` at most once per session, and never after a stop
    /// request. On success the session moves to `Stopping`.
    pub(crate) fn authorize_booking(&self) -> bool {
        let mut flags = self.flags();
        if flags.cancel_requested
            || flags.booking_attempted
            || flags.state != MonitorState::Running
        {
            return false;
        }
        flags.booking_attempted = true;
        flags.state = MonitorState::Stopping;
        true
    }

    /// Moves the session to `Stopped` with the booking outcome.
    pub(crate) fn finish(&self, outcome: SessionOutcome) {
        let mut flags = self.flags();
        flags.state = MonitorState::Stopped;
        self.outcome_tx.send_replace(Some(outcome));
    }

    fn flags(&self) -> MutexGuard<'_, SessionFlags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::{party, slot};

    fn session() -> MonitorSession {
        MonitorSession::new(vec![slot("a"), slot("b")], party())
    }

    #[test]
    fn new_session_is_running() {
        let session = session();
        assert_eq!(session.state(), MonitorState::Running);
        assert!(!session.booking_attempted());
        assert!(!session.is_cancel_requested());
        assert_eq!(session.outcome(), None);
    }

    #[test]
    fn booking_is_authorized_once() {
        let session = session();
        assert!(session.authorize_booking());
        assert!(!session.authorize_booking());
        assert_eq!(session.state(), MonitorState::Stopping);
        assert!(session.booking_attempted());
    }

    #[test]
    fn cancel_blocks_authorization() {
        let session = session();
        assert_eq!(session.request_cancel(), CancelEffect::Stopped);
        assert!(!session.authorize_booking());
        assert!(!session.booking_attempted());
        assert_eq!(session.outcome(), Some(SessionOutcome::Cancelled));
    }

    #[test]
    fn cancel_is_idempotent() {
        let session = session();
        assert_eq!(session.request_cancel(), CancelEffect::Stopped);
        assert_eq!(session.request_cancel(), CancelEffect::NoOp);
        assert_eq!(session.state(), MonitorState::Stopped);
    }

    #[test]
    fn cancel_during_booking_is_deferred() {
        let session = session();
        assert!(session.authorize_booking());
        assert_eq!(session.request_cancel(), CancelEffect::Deferred);
        assert_eq!(session.request_cancel(), CancelEffect::NoOp);
        assert_eq!(session.state(), MonitorState::Stopping);

        session.finish(SessionOutcome::BookingFailed {
            slot_id: SlotId::new("a").unwrap(),
            error: BookingError::Transport("timeout".to_string()),
        });
        assert_eq!(session.state(), MonitorState::Stopped);
        assert_eq!(
            session.outcome().map(|o| o.stop_reason()),
            Some(StopReason::BookingFailed)
        );
    }

    #[test]
    fn cancel_signal_reaches_subscribers() {
        let session = session();
        let rx = session.subscribe_cancel();
        assert!(!*rx.borrow());
        session.request_cancel();
        assert!(*rx.borrow());
    }
}
