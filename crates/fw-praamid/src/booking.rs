//! Assembling the bookings payload from a watched slot and party.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Value, json};

use fw_core::{BookingError, BookingRequest};

const CAR_CAPACITY_UNIT: &str = "M1";
const PASSENGER_CAPACITY_UNIT: &str = "P";
const REGULAR_PRICE_CATEGORY: &str = "REGULAR";
const POINT_OF_SALE: &str = "CP";
const VEHICLE_COUNTRY: &str = "EST";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ItemMapping {
    pub capacity_unit_code: Option<String>,
    pub price_category: Option<String>,
    pub item_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PriceEntry {
    pub item: Option<PriceItem>,
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PriceItem {
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ItemsResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BookingCreated {
    pub response: Option<String>,
}

/// The schedule entry, unwrapping records that were relayed inside an
/// `original_event_data` envelope.
fn event_source(raw: &Value) -> &Value {
    raw.get("original_event_data")
        .filter(|inner| inner.is_object())
        .unwrap_or(raw)
}

fn nested_code<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(|inner| inner.get("code"))
        .and_then(Value::as_str)
        .filter(|code| !code.is_empty())
}

/// Pricelist for the booking: the slot's fare code, else the record's own.
pub(crate) fn resolve_pricelist_code(request: &BookingRequest) -> Option<String> {
    request
        .fare_code
        .as_deref()
        .filter(|code| !code.trim().is_empty())
        .or_else(|| nested_code(&request.raw_schedule_record, "pricelist"))
        .or_else(|| nested_code(event_source(&request.raw_schedule_record), "pricelist"))
        .map(str::to_string)
}

pub(crate) fn price_map(prices: Vec<PriceEntry>) -> HashMap<String, f64> {
    prices
        .into_iter()
        .filter_map(|entry| {
            let code = entry.item?.code?;
            Some((code, entry.amount?))
        })
        .collect()
}

fn regular_item_code<'a>(mappings: &'a [ItemMapping], capacity_unit: &str) -> Option<&'a str> {
    mappings
        .iter()
        .find(|mapping| {
            mapping.capacity_unit_code.as_deref() == Some(capacity_unit)
                && mapping.price_category.as_deref() == Some(REGULAR_PRICE_CATEGORY)
        })
        .and_then(|mapping| mapping.item_code.as_deref())
}

fn priced_item(
    mappings: &[ItemMapping],
    prices: &HashMap<String, f64>,
    capacity_unit: &str,
    label: &str,
) -> Result<(String, f64), BookingError> {
    let code = regular_item_code(mappings, capacity_unit).ok_or_else(|| {
        BookingError::Preparation(format!(
            "no {label} item code ({capacity_unit}/{REGULAR_PRICE_CATEGORY}) in item mappings"
        ))
    })?;
    let price = prices.get(code).copied().ok_or_else(|| {
        BookingError::Preparation(format!("{label} item code {code} has no price"))
    })?;
    Ok((code.to_string(), price))
}

/// One boarding pass per requested item type: the car first, then adults.
pub(crate) fn boarding_passes(
    request: &BookingRequest,
    mappings: &[ItemMapping],
    prices: &HashMap<String, f64>,
) -> Result<Vec<Value>, BookingError> {
    let mut passes = Vec::new();

    if request.vehicle_count > 0 {
        let (code, price) = priced_item(mappings, prices, CAR_CAPACITY_UNIT, "car")?;
        let registration = request.vehicle_registration.clone().unwrap_or_default();
        let country = if registration.is_empty() {
            json!({})
        } else {
            json!({ "code": VEHICLE_COUNTRY, "names": { "en": "Estonia", "et": "Eesti" } })
        };
        passes.push(json!({
            "capacityUnit": { "code": CAR_CAPACITY_UNIT, "name": "Sõiduauto (M1)" },
            "quantity": request.vehicle_count,
            "item": { "code": code, "name": "Sõiduauto" },
            "itemPrice": price,
            "amount": price * f64::from(request.vehicle_count),
            "vehicleRegNr": registration,
            "vehicleCountry": country,
            "dci": "D",
        }));
    }

    if request.adult_count > 0 {
        let (code, price) = priced_item(mappings, prices, PASSENGER_CAPACITY_UNIT, "adult")?;
        passes.push(json!({
            "capacityUnit": { "code": PASSENGER_CAPACITY_UNIT, "name": "Reisija" },
            "quantity": request.adult_count,
            "item": { "code": code, "name": "Reisija täispilet" },
            "priceCategory": { "code": REGULAR_PRICE_CATEGORY },
            "itemPrice": price,
            "amount": price * f64::from(request.adult_count),
            "dci": "D",
            "vehicleRegNr": "",
        }));
    }

    if passes.is_empty() {
        return Err(BookingError::Preparation(
            "no cars or adults requested".to_string(),
        ));
    }
    Ok(passes)
}

/// The JSON body for `POST /bookings`.
pub(crate) fn booking_payload(
    request: &BookingRequest,
    pricelist_code: &str,
    passes: Vec<Value>,
) -> Value {
    let source = event_source(&request.raw_schedule_record);
    let direction_code = request.route_direction.code();
    let direction = source
        .get("direction")
        .filter(|direction| !direction.is_null())
        .cloned()
        .unwrap_or_else(|| json!({ "code": direction_code }));

    let event = json!({
        "dtstart": source.get("dtstart"),
        "dtend": source.get("dtend"),
        "uid": source.get("uid"),
        "pricelist": { "code": pricelist_code },
        "transportationType": source.get("transportationType"),
        "ship": source.get("ship"),
    });

    json!({
        "tickets": [{
            "boardingPasses": passes,
            "services": [],
            "attachments": [],
            "customer": { "email": request.contact_email },
            "phoneNumber": request.contact_phone,
            "smsNotification": false,
            "smsDepartureNotification": false,
            "calendarInvite": false,
            "direction": direction,
            "directionCode": direction_code,
            "event": event,
            "pricelist": { "code": pricelist_code },
            "pos": { "code": POINT_OF_SALE },
        }],
        "customer": { "email": request.contact_email },
    })
}
