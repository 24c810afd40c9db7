//! Core slot-monitoring engine for ferry watch.
//!
//! This crate contains the fundamental types and logic for:
//! - Slot selection: validated descriptions of departures to watch
//! - Polling: periodic availability cycles across the watched slots
//! - Booking: the single, authorized reservation attempt per session
//!
//! Network collaborators are abstracted behind [`AvailabilityClient`] and
//! [`BookingClient`]; progress is pushed to a [`StatusSink`].

pub mod client;
pub mod monitor;
pub mod poller;
pub mod session;
pub mod status;
#[cfg(test)]
mod testing;
pub mod types;

pub use client::{
    Availability, AvailabilityClient, BookingClient, BookingConfirmation, BookingError,
    BookingRequest, QueryError,
};
pub use monitor::{DEFAULT_POLL_INTERVAL, MonitorController, SessionHandle, StartError};
pub use poller::{AvailabilityPoller, AvailableSlotHit, CycleReport, SlotProbe};
pub use session::{MonitorSession, MonitorState, SessionOutcome};
pub use status::{ChannelSink, StatusSink, StatusUpdate, StopReason, TracingSink};
pub use types::{
    PartyDetails, RouteDirection, SlotId, SlotWatchSpec, ValidationError, validate_selection,
};
