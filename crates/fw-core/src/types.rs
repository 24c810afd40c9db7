//! Core type definitions with validation.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for watch selections and party details.
///
/// These are returned synchronously from `start` and never reach a status sink.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// No slots were selected for monitoring.
    #[error("at least one slot must be selected")]
    NoSlots,

    /// The same slot was selected more than once.
    #[error("slot {slot_id} is selected more than once")]
    DuplicateSlot { slot_id: String },

    /// A vehicle is being booked without a registration number.
    #[error("vehicle registration is required when booking {vehicle_count} vehicle(s)")]
    MissingVehicleRegistration { vehicle_count: u32 },

    /// The party has no adult passenger.
    #[error("at least one adult is required, got {adult_count}")]
    NoAdults { adult_count: u32 },

    /// The direction code is not a plain alphanumeric code.
    #[error("invalid route direction: {value}")]
    InvalidDirection { value: String },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated schedule-entry identifier.
    ///
    /// Slot IDs are opaque, non-empty strings assigned by the schedule
    /// service. They are unique within one route and date.
    SlotId, "slot ID"
);

/// A route direction code such as `HR` (Heltermaa → Rohuküla).
///
/// Codes are normalized to upper case on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RouteDirection(String);

impl RouteDirection {
    /// Creates a direction code after validation.
    pub fn new(code: impl Into<String>) -> Result<Self, ValidationError> {
        let code = code.into();
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty {
                field: "route direction",
            });
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError::InvalidDirection { value: code });
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Returns the direction code.
    pub fn code(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RouteDirection {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RouteDirection> for String {
    fn from(direction: RouteDirection) -> Self {
        direction.0
    }
}

impl std::str::FromStr for RouteDirection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for RouteDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One departure selected for monitoring.
///
/// `slot_id`, `route_direction` and `departure_date` together address the
/// remote availability query. `raw_schedule_record` is the schedule entry
/// exactly as the schedule service returned it; the booking service requires
/// it verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotWatchSpec {
    pub slot_id: SlotId,
    pub departure_time_utc: DateTime<Utc>,
    pub route_direction: RouteDirection,
    pub departure_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fare_code: Option<String>,
    #[serde(default)]
    pub raw_schedule_record: serde_json::Value,
}

/// Contact and passenger details used for the booking attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyDetails {
    pub contact_email: String,
    pub contact_phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_registration: Option<String>,
    pub vehicle_count: u32,
    pub adult_count: u32,
}

impl PartyDetails {
    /// Checks the booking preconditions, reporting the first violation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.contact_email.trim().is_empty() {
            return Err(ValidationError::Empty {
                field: "contact email",
            });
        }
        if self.contact_phone.trim().is_empty() {
            return Err(ValidationError::Empty {
                field: "contact phone",
            });
        }
        let has_registration = self
            .vehicle_registration
            .as_deref()
            .is_some_and(|reg| !reg.trim().is_empty());
        if self.vehicle_count > 0 && !has_registration {
            return Err(ValidationError::MissingVehicleRegistration {
                vehicle_count: self.vehicle_count,
            });
        }
        if self.adult_count < 1 {
            return Err(ValidationError::NoAdults {
                adult_count: self.adult_count,
            });
        }
        Ok(())
    }
}

/// Validates a full watch request: slots first, then party details.
pub fn validate_selection(
    specs: &[SlotWatchSpec],
    party: &PartyDetails,
) -> Result<(), ValidationError> {
    if specs.is_empty() {
        return Err(ValidationError::NoSlots);
    }
    let mut seen = HashSet::with_capacity(specs.len());
    for spec in specs {
        if !seen.insert(spec.slot_id.as_str()) {
            return Err(ValidationError::DuplicateSlot {
                slot_id: spec.slot_id.to_string(),
            });
        }
    }
    party.validate()
}
