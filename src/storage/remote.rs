//! Remote Itinerary Store
//!
//! HTTP client for `/api/itinerary`. The caller supplies the bearer token;
//! this type never decides whether a session is signed in.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::identity_key;
use crate::error::{ItineraryError, Result};
use crate::models::{ItemPatch, ItemType, ItineraryItem, ItineraryStats, Owner};

const ITINERARY_PATH: &str = "/api/itinerary";

/// Error code the service uses for an already-saved item
const DUPLICATE_CODE: &str = "duplicate_item";

// ========================
// Wire Structs
// ========================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddItemBody<'a> {
    item_type: ItemType,
    item_id: &'a str,
    item_data: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time: Option<String>,
    notes: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteItem {
    id: String,
    item_type: ItemType,
    #[serde(default)]
    item_data: Value,
    #[serde(default)]
    date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "crate::models::clock_time::deserialize")]
    time: Option<NaiveTime>,
    #[serde(default)]
    notes: Option<String>,
    created_at: DateTime<Utc>,
    user_id: String,
}

impl From<RemoteItem> for ItineraryItem {
    fn from(remote: RemoteItem) -> Self {
        ItineraryItem {
            id: remote.id,
            item_type: remote.item_type,
            item_data: remote.item_data,
            date: remote.date,
            time: remote.time,
            notes: remote.notes.unwrap_or_default(),
            created_at: remote.created_at,
            owner_ref: Owner::User(remote.user_id),
        }
    }
}

#[derive(Deserialize)]
struct ListBody {
    items: Vec<RemoteItem>,
    #[serde(default)]
    stats: Option<ItineraryStats>,
}

#[derive(Deserialize)]
struct ItemBody {
    item: RemoteItem,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Items owned by the caller plus the server's own counts
#[derive(Debug, Clone)]
pub struct ListResponse {
    pub items: Vec<ItineraryItem>,
    pub stats: Option<ItineraryStats>,
}

#[derive(Clone)]
pub struct RemoteStore {
    client: Client,
    base_url: String,
}

impl RemoteStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ItineraryError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("{}{}/{}", self.base_url, ITINERARY_PATH, encode_segment(id)),
            None => format!("{}{}", self.base_url, ITINERARY_PATH),
        }
    }

    pub async fn list(&self, token: &str) -> Result<ListResponse> {
        let response = send(self.client.get(self.url(None)).bearer_auth(token)).await?;
        let response = expect_success(response).await?;
        let body: ListBody = decode(response).await?;
        Ok(ListResponse {
            items: body.items.into_iter().map(ItineraryItem::from).collect(),
            stats: body.stats,
        })
    }

    /// Create an item. The server's duplicate verdict is authoritative.
    #[allow(clippy::too_many_arguments)]
    pub async fn add(
        &self,
        token: &str,
        item_type: ItemType,
        item_id: &str,
        item_data: &Value,
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
        notes: &str,
    ) -> Result<ItineraryItem> {
        let body = AddItemBody {
            item_type,
            item_id,
            item_data,
            date,
            time: time.map(|t| t.format("%H:%M").to_string()),
            notes,
        };
        let response = send(self.client.post(self.url(None)).bearer_auth(token).json(&body)).await?;

        if response.status() == StatusCode::BAD_REQUEST {
            let err = error_body(response).await;
            if err.code.as_deref() == Some(DUPLICATE_CODE) {
                return Err(ItineraryError::DuplicateItem {
                    id: identity_key(item_type, item_id),
                });
            }
            return Err(ItineraryError::remote(
                Some(StatusCode::BAD_REQUEST.as_u16()),
                err.error.unwrap_or_else(|| "Bad request".to_string()),
            ));
        }

        let response = expect_success(response).await?;
        let body: ItemBody = decode(response).await?;
        Ok(body.item.into())
    }

    pub async fn update(&self, token: &str, id: &str, patch: &ItemPatch) -> Result<ItineraryItem> {
        let response = send(self.client.put(self.url(Some(id))).bearer_auth(token).json(patch)).await?;
        let response = expect_found(response, id).await?;
        let body: ItemBody = decode(response).await?;
        Ok(body.item.into())
    }

    pub async fn remove(&self, token: &str, id: &str) -> Result<()> {
        let response = send(self.client.delete(self.url(Some(id))).bearer_auth(token)).await?;
        expect_found(response, id).await?;
        Ok(())
    }

    pub async fn clear(&self, token: &str) -> Result<()> {
        let response = send(self.client.delete(self.url(None)).bearer_auth(token)).await?;
        expect_success(response).await?;
        Ok(())
    }
}

async fn send(request: RequestBuilder) -> Result<Response> {
    request.send().await.map_err(|e| {
        log::error!("Itinerary request failed: {}", e);
        ItineraryError::remote(e.status().map(|s| s.as_u16()), e.to_string())
    })
}

async fn expect_found(response: Response, id: &str) -> Result<Response> {
    if response.status() == StatusCode::NOT_FOUND {
        return Err(ItineraryError::NotFound { id: id.to_string() });
    }
    expect_success(response).await
}

async fn expect_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = error_body(response)
        .await
        .error
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());
    log::warn!("Itinerary service answered {}: {}", status, message);
    Err(ItineraryError::remote(Some(status.as_u16()), message))
}

async fn error_body(response: Response) -> ErrorBody {
    response.json::<ErrorBody>().await.unwrap_or_default()
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status().as_u16();
    response.json::<T>().await.map_err(|e| {
        log::warn!("Unreadable itinerary response: {}", e);
        ItineraryError::remote(Some(status), format!("Malformed response: {}", e))
    })
}

/// Identity keys may carry spaces or slashes
const SEGMENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

fn encode_segment(raw: &str) -> String {
    utf8_percent_encode(raw, SEGMENT_ENCODE_SET).to_string()
}
