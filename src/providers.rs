//! Travel search client
//!
//! Thin typed wrapper over the gateway's search routes. Payloads stay opaque
//! JSON; the codec's extractors turn individual records into itinerary items.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::error::{ItineraryError, Result};

// ========================
// Query Structs
// ========================

#[derive(Debug, Clone, Serialize)]
pub struct FlightQuery {
    pub origin: String,
    #[serde(rename = "dest")]
    pub destination: String,
    /// YYYY-MM-DD
    pub date: String,
    pub adults: u32,
    #[serde(rename = "returnDate", skip_serializing_if = "Option::is_none")]
    pub return_date: Option<String>,
    #[serde(rename = "currencyCode", skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<String>,
}

impl FlightQuery {
    pub fn one_way(origin: &str, destination: &str, date: &str) -> Self {
        Self {
            origin: origin.to_uppercase(),
            destination: destination.to_uppercase(),
            date: date.to_string(),
            adults: 1,
            return_date: None,
            currency_code: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CarQuery {
    pub origin: String,
    #[serde(rename = "dest", skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(rename = "pickupDate")]
    pub pickup_date: String,
    #[serde(rename = "returnDate")]
    pub return_date: String,
    #[serde(rename = "driversAge", skip_serializing_if = "Option::is_none")]
    pub drivers_age: Option<u32>,
}

#[derive(Serialize)]
struct CityQuery<'a> {
    city: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
}

#[derive(Clone)]
pub struct TravelSearch {
    client: Client,
    base_url: String,
}

impl TravelSearch {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ItineraryError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn hotels_by_city(&self, city: &str, page: u32, limit: u32) -> Result<Value> {
        let query = CityQuery {
            city,
            page: Some(page.max(1)),
            limit: Some(limit),
        };
        self.get("hotels", "/api/hotels", &query).await
    }

    pub async fn search_flights(&self, query: &FlightQuery) -> Result<Value> {
        self.get("flights", "/api/flights", query).await
    }

    pub async fn search_cars(&self, query: &CarQuery) -> Result<Value> {
        self.get("cars", "/api/cars", query).await
    }

    pub async fn places_by_city(&self, city: &str) -> Result<Value> {
        let query = CityQuery { city, page: None, limit: None };
        self.get("places", "/api/places/by-city", &query).await
    }

    pub async fn events_by_city(&self, city: &str) -> Result<Value> {
        let query = CityQuery { city, page: None, limit: None };
        self.get("events", "/api/activities/by-city", &query).await
    }

    async fn get<Q: Serialize + ?Sized>(&self, provider: &str, path: &str, query: &Q) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| upstream(provider, e.status(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());
            return Err(upstream(provider, Some(status), message));
        }

        response
            .json()
            .await
            .map_err(|e| upstream(provider, Some(status), format!("Malformed response: {}", e)))
    }
}

fn upstream(provider: &str, status: Option<StatusCode>, message: String) -> ItineraryError {
    let status = status.map(|s| s.as_u16());
    log::warn!("Upstream provider {} failed (status {:?}): {}", provider, status, message);
    ItineraryError::UpstreamProviderError {
        provider: provider.to_string(),
        status,
        message,
    }
}
