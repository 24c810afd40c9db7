//! Status notifications pushed while a session runs.

use std::fmt;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::client::{BookingConfirmation, QueryError};
use crate::types::SlotId;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// `stop` was called.
    Cancelled,
    /// The booking attempt succeeded.
    Booked,
    /// The booking attempt failed. Monitoring does not resume.
    BookingFailed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cancelled => "cancelled",
            Self::Booked => "booking completed",
            Self::BookingFailed => "booking failed",
        };
        write!(f, "{s}")
    }
}

/// One progress notification.
///
/// Every variant renders a human-readable line through `Display`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Started {
        session_id: Uuid,
        slot_count: usize,
        interval_secs: u64,
    },
    Progress {
        message: String,
    },
    SlotAvailability {
        slot_id: SlotId,
        available_units: i64,
    },
    QueryFailed {
        slot_id: SlotId,
        error: QueryError,
    },
    CycleCompleted {
        cycle: u64,
        queried: usize,
        failed: usize,
        hit: Option<SlotId>,
    },
    BookingStarted {
        slot_id: SlotId,
        available_units: i64,
    },
    BookingSucceeded {
        slot_id: SlotId,
        confirmation: BookingConfirmation,
    },
    BookingFailed {
        slot_id: SlotId,
        message: String,
    },
    Stopped {
        reason: StopReason,
    },
}

impl fmt::Display for StatusUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started {
                slot_count,
                interval_secs,
                ..
            } => write!(
                f,
                "monitoring {slot_count} slot(s), checking every {interval_secs}s"
            ),
            Self::Progress { message } => write!(f, "{message}"),
            Self::SlotAvailability {
                slot_id,
                available_units,
            } => write!(f, "slot {slot_id}: {available_units} unit(s) available"),
            Self::QueryFailed { slot_id, error } => {
                write!(f, "slot {slot_id}: query failed: {error}")
            }
            Self::CycleCompleted {
                cycle,
                queried,
                failed,
                hit,
            } => match hit {
                Some(slot_id) => write!(f, "cycle {cycle}: slot {slot_id} has capacity"),
                None => write!(
                    f,
                    "cycle {cycle}: checked {queried} slot(s), {failed} failed, no capacity"
                ),
            },
            Self::BookingStarted {
                slot_id,
                available_units,
            } => write!(
                f,
                "slot {slot_id} has {available_units} unit(s) available, attempting booking"
            ),
            Self::BookingSucceeded {
                slot_id,
                confirmation,
            } => {
                write!(
                    f,
                    "booked slot {slot_id}: reference {}",
                    confirmation.booking_reference
                )?;
                if let Some(checkout) = &confirmation.checkout_reference {
                    write!(f, ", checkout at {checkout}")?;
                }
                Ok(())
            }
            Self::BookingFailed { slot_id, message } => {
                write!(f, "booking slot {slot_id} failed: {message}")
            }
            Self::Stopped { reason } => write!(f, "monitoring stopped: {reason}"),
        }
    }
}

/// Receives progress notifications from the monitor.
///
/// Called from the session task; implementations must not block for long.
pub trait StatusSink: Send + Sync {
    fn notify(&self, update: &StatusUpdate);
}

/// Writes every update to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn notify(&self, update: &StatusUpdate) {
        match update {
            StatusUpdate::QueryFailed { slot_id, .. } => {
                tracing::warn!(slot_id = %slot_id, "{update}");
            }
            StatusUpdate::BookingFailed { slot_id, .. } => {
                tracing::error!(slot_id = %slot_id, "{update}");
            }
            StatusUpdate::SlotAvailability { slot_id, .. } => {
                tracing::debug!(slot_id = %slot_id, "{update}");
            }
            StatusUpdate::CycleCompleted { cycle, .. } => tracing::debug!(cycle, "{update}"),
            _ => tracing::info!("{update}"),
        }
    }
}

/// Forwards updates into an unbounded channel.
///
/// Updates sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StatusUpdate>,
}

impl ChannelSink {
    /// Creates a sink and the receiver that observes it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StatusSink for ChannelSink {
    fn notify(&self, update: &StatusUpdate) {
        let _ = self.tx.send(update.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot_id(id: &str) -> SlotId {
        SlotId::new(id).unwrap()
    }

    #[test]
    fn booking_success_includes_checkout() {
        let update = StatusUpdate::BookingSucceeded {
            slot_id: slot_id("evt-1"),
            confirmation: BookingConfirmation {
                booking_reference: "B-42".to_string(),
                checkout_reference: Some("https://example.test/checkout".to_string()),
                message: None,
            },
        };
        assert_eq!(
            update.to_string(),
            "booked slot evt-1: reference B-42, checkout at https://example.test/checkout"
        );
    }

    #[test]
    fn cycle_summary_without_hit() {
        let update = StatusUpdate::CycleCompleted {
            cycle: 3,
            queried: 2,
            failed: 1,
            hit: None,
        };
        assert_eq!(
            update.to_string(),
            "cycle 3: checked 2 slot(s), 1 failed, no capacity"
        );
    }

    #[test]
    fn query_failure_names_slot_and_cause() {
        let update = StatusUpdate::QueryFailed {
            slot_id: slot_id("evt-2"),
            error: QueryError::Transport("connection reset".to_string()),
        };
        assert_eq!(
            update.to_string(),
            "slot evt-2: query failed: transport error: connection reset"
        );
    }

    #[test]
    fn channel_sink_forwards_and_tolerates_closed_receiver() {
        let (sink, mut rx) = ChannelSink::new();
        sink.notify(&StatusUpdate::Stopped {
            reason: StopReason::Cancelled,
        });
        assert_eq!(
            rx.try_recv().unwrap().to_string(),
            "monitoring stopped: cancelled"
        );

        drop(rx);
        sink.notify(&StatusUpdate::Progress {
            message: "ignored".to_string(),
        });
    }
}
