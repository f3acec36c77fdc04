use flightdesk_core::{offers_from_value, FlightOffer, OnewayBookingRequest, SearchParams};
use reqwest::{RequestBuilder, Url};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{error_marker, BackendConfig, FlightBackend, GatewayError};

/// Thin JSON client for the booking backend. Every call is a single attempt
/// bounded by the configured timeout; there are no retries.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, GatewayError> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|_| GatewayError::InvalidBaseUrl(config.base_url.clone()))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::InvalidBaseUrl(config.base_url.clone()));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(|error| GatewayError::Client(error.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub async fn post_json<T>(&self, segments: &[&str], body: &T) -> Result<Value, GatewayError>
    where
        T: Serialize + ?Sized,
    {
        let url = self.endpoint(segments)?;
        let request = self.client.post(url.clone()).json(body);
        self.send(url.path(), request).await
    }

    pub async fn get_json(&self, segments: &[&str]) -> Result<Value, GatewayError> {
        let url = self.endpoint(segments)?;
        let request = self.client.get(url.clone());
        self.send(url.path(), request).await
    }

    pub async fn search_raw(&self, payload: &Value) -> Result<Value, GatewayError> {
        self.post_json(&["flights", "search"], payload).await
    }

    pub async fn create_oneway_booking_raw(&self, payload: &Value) -> Result<Value, GatewayError> {
        self.post_json(&["bookings", "oneway"], payload).await
    }

    pub async fn create_roundtrip_booking(&self, payload: &Value) -> Result<Value, GatewayError> {
        self.post_json(&["bookings", "roundtrip"], payload).await
    }

    pub async fn booking_by_id(&self, booking_id: &str) -> Result<Value, GatewayError> {
        self.get_json(&["bookings", booking_id]).await
    }

    pub async fn bookings_by_user(&self, user_id: &str) -> Result<Value, GatewayError> {
        self.get_json(&["bookings", "user", user_id]).await
    }

    pub async fn booking_by_reference(&self, reference: &str) -> Result<Value, GatewayError> {
        self.get_json(&["bookings", "reference", reference]).await
    }

    pub async fn create_user(&self, payload: &Value) -> Result<Value, GatewayError> {
        self.post_json(&["users"], payload).await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Value, GatewayError> {
        self.get_json(&["users", user_id]).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> Result<Value, GatewayError> {
        let response = request
            .send()
            .await
            .map_err(|error| GatewayError::from_reqwest(path, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(path, status = status.as_u16(), "backend returned non-success status");
            return Err(GatewayError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|error| GatewayError::from_reqwest(path, error))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        let value = serde_json::from_slice::<Value>(&bytes).map_err(|error| GatewayError::Decode {
            path: path.to_string(),
            message: error.to_string(),
        })?;
        debug!(path, status = status.as_u16(), "backend call succeeded");
        Ok(value)
    }
}

impl FlightBackend for HttpBackend {
    async fn search_flights(&self, params: &SearchParams) -> Result<Vec<FlightOffer>, GatewayError> {
        let response = self.post_json(&["flights", "search"], params).await?;
        if let Some(message) = error_marker(&response) {
            return Err(GatewayError::Backend(message));
        }

        let parsed = offers_from_value(&response);
        if parsed.skipped > 0 {
            warn!(skipped = parsed.skipped, "ignored malformed offers in search response");
        }
        Ok(parsed.offers)
    }

    async fn create_oneway_booking(
        &self,
        request: &OnewayBookingRequest,
    ) -> Result<Value, GatewayError> {
        self.post_json(&["bookings", "oneway"], request).await
    }
}
