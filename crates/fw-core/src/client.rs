//! Collaborator interfaces for availability queries and booking attempts.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{PartyDetails, RouteDirection, SlotId, SlotWatchSpec};

/// A single availability query failed.
///
/// These are transient: the slot is treated as "no hit" for the current
/// cycle and queried again on the next one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
    /// The service answered with a non-success status.
    #[error("availability service returned {status}: {message}")]
    Status { status: u16, message: String },
    /// The response could not be understood.
    #[error("invalid availability response: {0}")]
    InvalidResponse(String),
    /// The schedule no longer lists the slot.
    #[error("slot {slot_id} not found in schedule")]
    SlotNotFound { slot_id: String },
}

/// The booking attempt failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// The service rejected the reservation.
    #[error("booking rejected: {message}")]
    Rejected {
        status: Option<u16>,
        message: String,
    },
    /// The booking request could not be assembled.
    #[error("booking could not be prepared: {0}")]
    Preparation(String),
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
    /// The response could not be understood.
    #[error("invalid booking response: {0}")]
    InvalidResponse(String),
}

/// Current capacity for one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub available_units: i64,
    pub is_available: bool,
}

impl Availability {
    /// Builds an availability reading from a raw unit count.
    pub const fn from_units(available_units: i64) -> Self {
        Self {
            available_units,
            is_available: available_units > 0,
        }
    }
}

/// Everything the booking service needs for one reservation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingRequest {
    pub slot_id: SlotId,
    pub raw_schedule_record: serde_json::Value,
    pub route_direction: RouteDirection,
    pub departure_date: NaiveDate,
    pub fare_code: Option<String>,
    pub vehicle_count: u32,
    pub adult_count: u32,
    pub contact_email: String,
    pub contact_phone: String,
    pub vehicle_registration: Option<String>,
}

impl BookingRequest {
    /// Combines a watched slot with the session's party.
    pub fn for_slot(slot: &SlotWatchSpec, party: &PartyDetails) -> Self {
        let vehicle_registration = if party.vehicle_count > 0 {
            party.vehicle_registration.clone()
        } else {
            None
        };
        Self {
            slot_id: slot.slot_id.clone(),
            raw_schedule_record: slot.raw_schedule_record.clone(),
            route_direction: slot.route_direction.clone(),
            departure_date: slot.departure_date,
            fare_code: slot.fare_code.clone(),
            vehicle_count: party.vehicle_count,
            adult_count: party.adult_count,
            contact_email: party.contact_email.clone(),
            contact_phone: party.contact_phone.clone(),
            vehicle_registration,
        }
    }
}

/// A successful reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub booking_reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Reports the current capacity of a slot.
#[async_trait]
pub trait AvailabilityClient: Send + Sync {
    async fn get_availability(
        &self,
        direction: &RouteDirection,
        departure_date: NaiveDate,
        slot_id: &SlotId,
    ) -> Result<Availability, QueryError>;
}

/// Performs a reservation.
///
/// Implementations must not retry internally; the monitor issues at most one
/// call per session.
#[async_trait]
pub trait BookingClient: Send + Sync {
    async fn attempt_booking(
        &self,
        request: &BookingRequest,
    ) -> Result<BookingConfirmation, BookingError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::{party, slot};

    #[test]
    fn availability_from_units_sets_flag() {
        assert!(Availability::from_units(2).is_available);
        assert!(!Availability::from_units(0).is_available);
        assert!(!Availability::from_units(-1).is_available);
    }

    #[test]
    fn booking_request_carries_slot_record_and_party() {
        let slot = slot("evt-9");
        let request = BookingRequest::for_slot(&slot, &party());

        assert_eq!(request.slot_id.as_str(), "evt-9");
        assert_eq!(request.raw_schedule_record, slot.raw_schedule_record);
        assert_eq!(request.fare_code.as_deref(), Some("PL-2026"));
        assert_eq!(request.vehicle_registration.as_deref(), Some("123ABC"));
        assert_eq!(request.contact_email, "driver@example.com");
    }

    #[test]
    fn booking_request_drops_registration_without_vehicle() {
        let mut details = party();
        details.vehicle_count = 0;
        let request = BookingRequest::for_slot(&slot("evt-1"), &details);
        assert_eq!(request.vehicle_registration, None);
    }
}
