//! One availability cycle across a session's watched slots.

use std::sync::Arc;

use crate::client::{Availability, AvailabilityClient, QueryError};
use crate::session::MonitorSession;
use crate::status::{StatusSink, StatusUpdate};
use crate::types::{SlotId, SlotWatchSpec};

/// The first slot in registration order that reported free units.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailableSlotHit {
    pub slot: SlotWatchSpec,
    pub available_units: i64,
}

/// The answer for one slot within a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotProbe {
    pub slot_id: SlotId,
    pub result: Result<Availability, QueryError>,
}

/// Everything one cycle observed.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    /// Probes in query order. Slots after the hit are not queried.
    pub probes: Vec<SlotProbe>,
    pub hit: Option<AvailableSlotHit>,
}

impl CycleReport {
    pub fn failed(&self) -> usize {
        self.probes.iter().filter(|probe| probe.result.is_err()).count()
    }
}

/// Queries watched slots sequentially and stops at the first hit.
#[derive(Clone)]
pub struct AvailabilityPoller {
    client: Arc<dyn AvailabilityClient>,
    sink: Arc<dyn StatusSink>,
}

impl AvailabilityPoller {
    pub fn new(client: Arc<dyn AvailabilityClient>, sink: Arc<dyn StatusSink>) -> Self {
        Self { client, sink }
    }

    /// Runs one cycle.
    ///
    /// A failed query is reported and counts as "no hit" for that slot; the
    /// scan moves on to the next slot. A stop request is honored between
    /// queries, never in the middle of one; a result that arrives after the
    /// stop is dropped without being reported.
    pub async fn run_cycle(&self, session: &MonitorSession, cycle: u64) -> CycleReport {
        let mut probes = Vec::with_capacity(session.watched_slots().len());
        let mut hit = None;

        for slot in session.watched_slots() {
            if session.is_cancel_requested() {
                tracing::debug!(session_id = %session.id(), cycle, "cycle interrupted by stop");
                break;
            }

            let result = self
                .client
                .get_availability(&slot.route_direction, slot.departure_date, &slot.slot_id)
                .await;
            if session.is_cancel_requested() {
                tracing::debug!(
                    session_id = %session.id(),
                    slot_id = %slot.slot_id,
                    "discarding availability result after stop"
                );
                break;
            }

            match &result {
                Ok(availability) => {
                    tracing::debug!(
                        session_id = %session.id(),
                        slot_id = %slot.slot_id,
                        available_units = availability.available_units,
                        "slot queried"
                    );
                    self.sink.notify(&StatusUpdate::SlotAvailability {
                        slot_id: slot.slot_id.clone(),
                        available_units: availability.available_units,
                    });
                    if availability.available_units > 0 {
                        hit = Some(AvailableSlotHit {
                            slot: slot.clone(),
                            available_units: availability.available_units,
                        });
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        session_id = %session.id(),
                        slot_id = %slot.slot_id,
                        %error,
                        "availability query failed"
                    );
                    self.sink.notify(&StatusUpdate::QueryFailed {
                        slot_id: slot.slot_id.clone(),
                        error: error.clone(),
                    });
                }
            }

            probes.push(SlotProbe {
                slot_id: slot.slot_id.clone(),
                result,
            });
            if hit.is_some() {
                break;
            }
        }

        let report = CycleReport { cycle, probes, hit };
        if !session.is_cancel_requested() {
            self.sink.notify(&StatusUpdate::CycleCompleted {
                cycle,
                queried: report.probes.len(),
                failed: report.failed(),
                hit: report.hit.as_ref().map(|hit| hit.slot.slot_id.clone()),
            });
        }
        report
    }
}
