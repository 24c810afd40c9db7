//! Departures as listed by the events endpoint.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;

use fw_core::{RouteDirection, SlotId, SlotWatchSpec};

/// One scheduled sailing.
#[derive(Debug, Clone, PartialEq)]
pub struct Departure {
    pub slot_id: SlotId,
    pub departs_at: DateTime<Utc>,
    pub arrives_at: Option<DateTime<Utc>>,
    /// Free car spaces (`capacities.sv`), when the service reports them.
    pub car_capacity: Option<i64>,
    pub ship_code: Option<String>,
    pub pricelist_code: Option<String>,
    /// The event exactly as returned; the bookings endpoint wants it back.
    pub raw: Value,
}

impl Departure {
    /// Builds the monitoring description for this departure.
    pub fn to_watch_spec(&self, direction: &RouteDirection, date: NaiveDate) -> SlotWatchSpec {
        SlotWatchSpec {
            slot_id: self.slot_id.clone(),
            departure_time_utc: self.departs_at,
            route_direction: direction.clone(),
            departure_date: date,
            fare_code: self.pricelist_code.clone(),
            raw_schedule_record: self.raw.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventsResponse {
    #[serde(default)]
    pub items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct EventFields {
    uid: Option<String>,
    dtstart: Option<String>,
    dtend: Option<String>,
    #[serde(default)]
    capacities: Capacities,
    ship: Option<Coded>,
    pricelist: Option<Coded>,
}

#[derive(Debug, Default, Deserialize)]
struct Capacities {
    sv: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Coded {
    code: Option<String>,
}

/// Parses the items of an events response, skipping entries that cannot be
/// addressed (no uid or no start time).
pub(crate) fn parse_departures(items: Vec<Value>) -> Vec<Departure> {
    items.into_iter().filter_map(parse_departure).collect()
}

fn parse_departure(raw: Value) -> Option<Departure> {
    let fields: EventFields = match serde_json::from_value(raw.clone()) {
        Ok(fields) => fields,
        Err(err) => {
            tracing::warn!(error = %err, "skipping malformed event");
            return None;
        }
    };
    let Some(slot_id) = fields.uid.and_then(|uid| SlotId::new(uid).ok()) else {
        tracing::warn!("skipping event without uid");
        return None;
    };
    let Some(departs_at) = fields.dtstart.as_deref().and_then(parse_timestamp) else {
        tracing::warn!(slot_id = %slot_id, "skipping event without a valid dtstart");
        return None;
    };

    Some(Departure {
        slot_id,
        departs_at,
        arrives_at: fields.dtend.as_deref().and_then(parse_timestamp),
        car_capacity: fields.capacities.sv,
        ship_code: fields.ship.and_then(|ship| ship.code),
        pricelist_code: fields.pricelist.and_then(|pricelist| pricelist.code),
        raw,
    })
}

/// Parses event timestamps; values without an offset are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    value
        .parse::<chrono::NaiveDateTime>()
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> Value {
        serde_json::json!({
            "uid": "evt-100",
            "dtstart": "2026-10-20T07:30:00.000Z",
            "dtend": "2026-10-20T08:00:00.000Z",
            "capacities": { "sv": 4, "bv": 2 },
            "ship": { "code": "TIIU" },
            "pricelist": { "code": "HR-2026" },
            "transportationType": { "code": "VEHICLE" }
        })
    }

    #[test]
    fn parses_event_fields() {
        let departures = parse_departures(vec![event()]);
        assert_eq!(departures.len(), 1);

        let departure = &departures[0];
        assert_eq!(departure.slot_id.as_str(), "evt-100");
        assert_eq!(departure.departs_at.to_rfc3339(), "2026-10-20T07:30:00+00:00");
        assert_eq!(departure.car_capacity, Some(4));
        assert_eq!(departure.ship_code.as_deref(), Some("TIIU"));
        assert_eq!(departure.pricelist_code.as_deref(), Some("HR-2026"));
        assert_eq!(departure.raw, event());
    }

    #[test]
    fn skips_events_without_uid_or_start() {
        let departures = parse_departures(vec![
            serde_json::json!({ "dtstart": "2026-10-20T07:30:00Z" }),
            serde_json::json!({ "uid": "evt-1", "dtstart": "soon" }),
            serde_json::json!({ "uid": "evt-2", "dtstart": "2026-10-20T09:00:00Z" }),
        ]);
        assert_eq!(departures.len(), 1);
        assert_eq!(departures[0].slot_id.as_str(), "evt-2");
        assert_eq!(departures[0].car_capacity, None);
    }

    #[test]
    fn timestamps_accept_offsets_and_naive_values() {
        assert_eq!(
            parse_timestamp("2026-10-20T10:30:00+03:00").map(|dt| dt.to_rfc3339()),
            Some("2026-10-20T07:30:00+00:00".to_string())
        );
        assert_eq!(
            parse_timestamp("2026-10-20T07:30:00").map(|dt| dt.to_rfc3339()),
            Some("2026-10-20T07:30:00+00:00".to_string())
        );
        assert_eq!(parse_timestamp("not a time"), None);
    }

    #[test]
    fn watch_spec_carries_raw_record_and_fare() {
        let departure = parse_departures(vec![event()]).remove(0);
        let direction = RouteDirection::new("HR").unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();

        let spec = departure.to_watch_spec(&direction, date);

        assert_eq!(spec.slot_id.as_str(), "evt-100");
        assert_eq!(spec.fare_code.as_deref(), Some("HR-2026"));
        assert_eq!(spec.raw_schedule_record, event());
        assert_eq!(spec.departure_date, date);
    }
}
