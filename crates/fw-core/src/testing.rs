//! Scripted collaborators for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Notify;

use crate::client::{
    Availability, AvailabilityClient, BookingClient, BookingConfirmation, BookingError,
    BookingRequest, QueryError,
};
use crate::status::{StatusSink, StatusUpdate};
use crate::types::{RouteDirection, SlotId};

/// Replays per-slot responses; slots without a script report zero units.
#[derive(Default)]
pub struct ScriptedAvailability {
    scripts: Mutex<HashMap<String, VecDeque<Result<Availability, QueryError>>>>,
    fallback: Mutex<HashMap<String, i64>>,
    calls: Mutex<Vec<String>>,
    stalls: Mutex<VecDeque<Duration>>,
    delay: Option<Duration>,
    gate: Option<Arc<Gate>>,
}

impl ScriptedAvailability {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every query for `slot` reports `units` once its script is exhausted.
    pub fn always(self, slot: &str, units: i64) -> Self {
        self.fallback.lock().unwrap().insert(slot.to_string(), units);
        self
    }

    pub fn then(self, slot: &str, response: Result<Availability, QueryError>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(slot.to_string())
            .or_default()
            .push_back(response);
        self
    }

    /// Each query sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// The next query sleeps for `delay`; repeat to stall several in turn.
    pub fn stall_next(self, delay: Duration) -> Self {
        self.stalls.lock().unwrap().push_back(delay);
        self
    }

    /// Each query waits on `gate` before answering.
    pub fn with_gate(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AvailabilityClient for ScriptedAvailability {
    async fn get_availability(
        &self,
        _direction: &RouteDirection,
        _departure_date: NaiveDate,
        slot_id: &SlotId,
    ) -> Result<Availability, QueryError> {
        self.calls.lock().unwrap().push(slot_id.to_string());
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        let stall = self.stalls.lock().unwrap().pop_front();
        if let Some(delay) = stall.or(self.delay) {
            tokio::time::sleep(delay).await;
        }
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(slot_id.as_str())
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| {
            let units = self
                .fallback
                .lock()
                .unwrap()
                .get(slot_id.as_str())
                .copied()
                .unwrap_or(0);
            Ok(Availability::from_units(units))
        })
    }
}

/// Records booking requests and answers with a fixed result.
pub struct RecordingBooking {
    result: Result<BookingConfirmation, BookingError>,
    requests: Mutex<Vec<BookingRequest>>,
    gate: Option<Arc<Gate>>,
}

impl RecordingBooking {
    pub fn succeeding(reference: &str) -> Self {
        Self {
            result: Ok(BookingConfirmation {
                booking_reference: reference.to_string(),
                checkout_reference: Some(format!("https://example.test/checkout/{reference}")),
                message: None,
            }),
            requests: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(BookingError::Rejected {
                status: Some(409),
                message: message.to_string(),
            }),
            requests: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn with_gate(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn requests(&self) -> Vec<BookingRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl BookingClient for RecordingBooking {
    async fn attempt_booking(
        &self,
        request: &BookingRequest,
    ) -> Result<BookingConfirmation, BookingError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        self.result.clone()
    }
}

/// Holds a call until the test releases it.
#[derive(Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }

    /// Waits until a call is parked at the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Collects every update it receives.
#[derive(Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<StatusUpdate>>,
}

impl RecordingSink {
    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.updates().iter().map(ToString::to_string).collect()
    }
}

impl StatusSink for RecordingSink {
    fn notify(&self, update: &StatusUpdate) {
        self.updates.lock().unwrap().push(update.clone());
    }
}
