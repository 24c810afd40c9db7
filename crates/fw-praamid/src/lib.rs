//! praamid.ee online API integration for ferry watch.
//!
//! Provides:
//! - Schedule listing for a direction and date
//! - Per-slot availability for the monitor (free car spaces)
//! - The single booking attempt, returning a checkout link

mod booking;
pub mod schedule;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use fw_core::{
    Availability, AvailabilityClient, BookingClient, BookingConfirmation, BookingError,
    BookingRequest, QueryError, RouteDirection, SlotId,
};

use crate::booking::{BookingCreated, ItemMapping, ItemsResponse, PriceEntry};
pub use crate::schedule::{Departure, parse_timestamp};
use crate::schedule::{EventsResponse, parse_departures};

pub const DEFAULT_API_BASE_URL: &str = "https://www.praamid.ee/online";
pub const DEFAULT_PORTAL_BASE_URL: &str = "https://www.praamid.ee/portal";
/// Default request timeout for API calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
/// Minutes of already-departed sailings the events endpoint still returns.
const TIME_SHIFT_MINUTES: &str = "300";

/// praamid.ee client errors.
#[derive(Debug, Error)]
pub enum PraamidError {
    /// A configured URL could not be parsed.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The token was missing, invalid, or expired.
    #[error("authorization failed; the token may be invalid or expired")]
    Unauthorized,
    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    /// Failed to parse response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<PraamidError> for QueryError {
    fn from(err: PraamidError) -> Self {
        match err {
            PraamidError::Request(err) => Self::Transport(err.to_string()),
            PraamidError::Unauthorized => Self::Status {
                status: StatusCode::UNAUTHORIZED.as_u16(),
                message: PraamidError::Unauthorized.to_string(),
            },
            PraamidError::Api { status, message } => Self::Status { status, message },
            other => Self::InvalidResponse(other.to_string()),
        }
    }
}

impl From<PraamidError> for BookingError {
    fn from(err: PraamidError) -> Self {
        match err {
            PraamidError::Request(err) => Self::Transport(err.to_string()),
            PraamidError::Unauthorized => Self::Rejected {
                status: Some(StatusCode::UNAUTHORIZED.as_u16()),
                message: PraamidError::Unauthorized.to_string(),
            },
            PraamidError::Api { status, message } => Self::Rejected {
                status: Some(status),
                message,
            },
            other => Self::InvalidResponse(other.to_string()),
        }
    }
}

/// Connection settings for [`Client`].
#[derive(Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub portal_base_url: String,
    pub auth_token: Option<String>,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            portal_base_url: DEFAULT_PORTAL_BASE_URL.to_string(),
            auth_token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_base_url", &self.api_base_url)
            .field("portal_base_url", &self.portal_base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// praamid.ee API client.
///
/// # Thread Safety
///
/// The client is safe to clone and share across threads. Each clone shares
/// the underlying HTTP connection pool.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    api_base: Url,
    portal_base: Url,
    authorization: Option<String>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("api_base", &self.api_base.as_str())
            .field("authorization", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if either base URL is invalid or if the HTTP client
    /// fails to build.
    pub fn new(config: ClientConfig) -> Result<Self, PraamidError> {
        let api_base = parse_base_url(&config.api_base_url)?;
        let portal_base = parse_base_url(&config.portal_base_url)?;
        let authorization = config
            .auth_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(bearer);

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(PraamidError::ClientBuild)?;

        Ok(Self {
            http,
            api_base,
            portal_base,
            authorization,
        })
    }

    /// Lists the sailings for a direction and date.
    pub async fn list_departures(
        &self,
        direction: &RouteDirection,
        date: NaiveDate,
    ) -> Result<Vec<Departure>, PraamidError> {
        let date = date.format("%Y-%m-%d").to_string();
        let request = self.get("events").query(&[
            ("direction", direction.code()),
            ("departure-date", date.as_str()),
            ("time-shift", TIME_SHIFT_MINUTES),
        ]);
        let response: EventsResponse = send_json(request).await?;
        Ok(parse_departures(response.items))
    }

    async fn item_mappings(&self) -> Result<Vec<ItemMapping>, PraamidError> {
        let response: ItemsResponse<ItemMapping> = send_json(self.get("item-mappings")).await?;
        Ok(response.items)
    }

    async fn prices(
        &self,
        pricelist_code: &str,
        date: NaiveDate,
    ) -> Result<Vec<PriceEntry>, PraamidError> {
        let date = date.format("%Y-%m-%d").to_string();
        let request = self
            .get("prices")
            .query(&[("pricelist", pricelist_code), ("date", date.as_str())]);
        let response: ItemsResponse<PriceEntry> = send_json(request).await?;
        Ok(response.items)
    }

    async fn create_booking(&self, payload: &Value) -> Result<String, PraamidError> {
        let origin = self.portal_base.origin().ascii_serialization();
        let referer = self.portal_url("ticket/departure");
        let mut request = self
            .http
            .post(self.api_url("bookings"))
            .header(reqwest::header::ACCEPT, "application/json, text/plain, */*")
            .header(reqwest::header::ORIGIN, origin)
            .header(reqwest::header::REFERER, referer.as_str())
            .json(payload);
        if let Some(authorization) = &self.authorization {
            request = request.header(reqwest::header::AUTHORIZATION, authorization);
        }

        let created: BookingCreated = send_json(request).await?;
        created
            .response
            .filter(|uid| !uid.is_empty())
            .ok_or_else(|| PraamidError::InvalidResponse("booking uid missing".to_string()))
    }

    /// Checkout page for a created booking.
    pub fn checkout_url(&self, booking_uid: &str) -> String {
        let mut url = self.portal_url("ticket/checkout");
        url.query_pairs_mut().append_pair("bookingUid", booking_uid);
        url.to_string()
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self
            .http
            .get(self.api_url(path))
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.authorization {
            Some(authorization) => request.header(reqwest::header::AUTHORIZATION, authorization),
            None => request,
        }
    }

    fn api_url(&self, path: &str) -> Url {
        join(&self.api_base, path)
    }

    fn portal_url(&self, path: &str) -> Url {
        join(&self.portal_base, path)
    }
}

#[async_trait]
impl AvailabilityClient for Client {
    async fn get_availability(
        &self,
        direction: &RouteDirection,
        departure_date: NaiveDate,
        slot_id: &SlotId,
    ) -> Result<Availability, QueryError> {
        let departures = self.list_departures(direction, departure_date).await?;
        let departure = departures
            .into_iter()
            .find(|departure| departure.slot_id == *slot_id)
            .ok_or_else(|| QueryError::SlotNotFound {
                slot_id: slot_id.to_string(),
            })?;
        Ok(Availability::from_units(
            departure.car_capacity.unwrap_or_default(),
        ))
    }
}

#[async_trait]
impl BookingClient for Client {
    async fn attempt_booking(
        &self,
        request: &BookingRequest,
    ) -> Result<BookingConfirmation, BookingError> {
        let pricelist_code = booking::resolve_pricelist_code(request).ok_or_else(|| {
            BookingError::Preparation("no pricelist code for the selected sailing".to_string())
        })?;

        let mappings = self.item_mappings().await.map_err(|err| {
            BookingError::Preparation(format!("could not fetch item mappings: {err}"))
        })?;
        let prices = self
            .prices(&pricelist_code, request.departure_date)
            .await
            .map_err(|err| BookingError::Preparation(format!("could not fetch prices: {err}")))?;
        let prices = booking::price_map(prices);

        let passes = booking::boarding_passes(request, &mappings, &prices)?;
        let payload = booking::booking_payload(request, &pricelist_code, passes);
        tracing::debug!(slot_id = %request.slot_id, %pricelist_code, "posting booking");

        let booking_uid = self.create_booking(&payload).await?;
        Ok(BookingConfirmation {
            checkout_reference: Some(self.checkout_url(&booking_uid)),
            booking_reference: booking_uid,
            message: Some("Successfully created booking.".to_string()),
        })
    }
}

async fn send_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T, PraamidError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    if status == StatusCode::UNAUTHORIZED {
        return Err(PraamidError::Unauthorized);
    }
    if !status.is_success() {
        return Err(PraamidError::Api {
            status: status.as_u16(),
            message: parse_api_error(&body).unwrap_or(body),
        });
    }
    serde_json::from_str(&body).map_err(|err| PraamidError::InvalidResponse(err.to_string()))
}

/// Extracts the server's own message from an error body, if it has one.
fn parse_api_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorPayload {
        message: Option<String>,
        error: Option<Value>,
    }

    let payload = serde_json::from_str::<ErrorPayload>(body).ok()?;
    payload
        .message
        .or_else(|| match payload.error? {
            Value::String(message) => Some(message),
            Value::Object(details) => details
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
        .filter(|message| !message.is_empty())
}

fn bearer(token: &str) -> String {
    if token.starts_with("Bearer ") {
        token.to_string()
    } else {
        format!("Bearer {token}")
    }
}

fn parse_base_url(raw: &str) -> Result<Url, PraamidError> {
    // A trailing slash makes `join` append instead of replacing the last segment.
    let normalized = format!("{}/", raw.trim().trim_end_matches('/'));
    Url::parse(&normalized).map_err(|err| PraamidError::InvalidUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })
}

fn join(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().extend(path.split('/'));
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client::new(ClientConfig {
            auth_token: Some("secret-token".to_string()),
            ..ClientConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn client_rejects_invalid_base_url() {
        let result = Client::new(ClientConfig {
            api_base_url: "not a url".to_string(),
            ..ClientConfig::default()
        });
        assert!(matches!(result, Err(PraamidError::InvalidUrl { .. })));
    }

    #[test]
    fn client_debug_redacts_token() {
        let debug = format!("{:?}", client());
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));

        let config = ClientConfig {
            auth_token: Some("secret-token".to_string()),
            ..ClientConfig::default()
        };
        assert!(!format!("{config:?}").contains("secret-token"));
    }

    #[test]
    fn bearer_prefix_added_once() {
        assert_eq!(bearer("abc"), "Bearer abc");
        assert_eq!(bearer("Bearer abc"), "Bearer abc");
    }

    #[test]
    fn blank_token_sends_no_authorization() {
        let client = Client::new(ClientConfig {
            auth_token: Some("   ".to_string()),
            ..ClientConfig::default()
        })
        .unwrap();
        assert_eq!(client.authorization, None);
    }

    #[test]
    fn urls_join_under_base_path() {
        let client = client();
        assert_eq!(
            client.api_url("item-mappings").as_str(),
            "https://www.praamid.ee/online/item-mappings"
        );
        assert_eq!(
            client.checkout_url("b-123"),
            "https://www.praamid.ee/portal/ticket/checkout?bookingUid=b-123"
        );
    }

    #[test]
    fn base_url_trailing_slash_is_tolerated() {
        let client = Client::new(ClientConfig {
            api_base_url: "http://localhost:9000/online/".to_string(),
            ..ClientConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.api_url("events").as_str(),
            "http://localhost:9000/online/events"
        );
    }

    #[test]
    fn api_error_message_is_extracted() {
        assert_eq!(
            parse_api_error(r#"{"message":"Event is full"}"#).as_deref(),
            Some("Event is full")
        );
        assert_eq!(
            parse_api_error(r#"{"error":{"message":"Invalid vehicle"}}"#).as_deref(),
            Some("Invalid vehicle")
        );
        assert_eq!(
            parse_api_error(r#"{"error":"Missing field"}"#).as_deref(),
            Some("Missing field")
        );
        assert_eq!(parse_api_error("<html>bad gateway</html>"), None);
    }

    #[test]
    fn errors_map_onto_core_taxonomy() {
        let query: QueryError = PraamidError::Api {
            status: 503,
            message: "maintenance".to_string(),
        }
        .into();
        assert_eq!(
            query,
            QueryError::Status {
                status: 503,
                message: "maintenance".to_string()
            }
        );

        let booking: BookingError = PraamidError::Unauthorized.into();
        assert!(matches!(
            booking,
            BookingError::Rejected {
                status: Some(401),
                ..
            }
        ));
    }
}
