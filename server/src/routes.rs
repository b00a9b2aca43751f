//! HTTP routes
//!
//! Every `/api/itinerary` route runs for the user named by the bearer token.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, Path, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::auth::Principal;
use crate::domain::{parse_date, parse_time, EntryPatch, ItemKind, NewEntry};
use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/itinerary",
            get(list_handler).post(add_handler).delete(clear_handler),
        )
        .route("/api/itinerary/stats", get(stats_handler))
        .route("/api/itinerary/{id}", put(update_handler).delete(remove_handler))
        .with_state(state)
}

/// Caller resolved from `Authorization: Bearer <token>`
pub struct AuthUser(pub Principal);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::Unauthorized)?;

        state.verifier.verify(token).map(AuthUser).map_err(|e| {
            log::warn!("Rejected bearer token: {}", e);
            ApiError::Forbidden
        })
    }
}

// ========================
// Request Structs
// ========================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    item_type: Option<String>,
    /// String or number upstream
    item_id: Option<Value>,
    item_data: Option<Value>,
    date: Option<String>,
    time: Option<String>,
    notes: Option<String>,
}

/// Absent fields stay untouched; explicit `null` clears
#[derive(Deserialize)]
pub struct UpdateItemRequest {
    #[serde(default, deserialize_with = "present")]
    date: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    time: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    notes: Option<Option<String>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn item_id_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => non_blank(Some(s.as_str())).map(str::to_string),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl AddItemRequest {
    fn into_entry(self, user_id: &str) -> Result<NewEntry, ApiError> {
        let item_id = item_id_of(self.item_id.as_ref());
        let (Some(item_type), Some(item_id), Some(item_data)) =
            (self.item_type, item_id, self.item_data.filter(|d| !d.is_null()))
        else {
            return Err(ApiError::InvalidRequest(
                "Missing required fields: itemType, itemId, itemData".to_string(),
            ));
        };

        Ok(NewEntry {
            user_id: user_id.to_string(),
            item_type: ItemKind::parse(&item_type)?,
            item_id,
            item_data,
            date: non_blank(self.date.as_deref()).map(parse_date).transpose()?,
            time: non_blank(self.time.as_deref()).map(parse_time).transpose()?,
            notes: self.notes.unwrap_or_default(),
        })
    }
}

impl UpdateItemRequest {
    fn into_patch(self) -> Result<EntryPatch, ApiError> {
        let date = match self.date {
            None => None,
            Some(raw) => Some(non_blank(raw.as_deref()).map(parse_date).transpose()?),
        };
        let time = match self.time {
            None => None,
            Some(raw) => Some(non_blank(raw.as_deref()).map(parse_time).transpose()?),
        };
        Ok(EntryPatch {
            date,
            time,
            notes: self.notes.map(Option::unwrap_or_default),
        })
    }
}

fn invalid_body(rejection: JsonRejection) -> ApiError {
    ApiError::InvalidRequest(rejection.body_text())
}

// ========================
// Handlers
// ========================

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "ok": true, "service": "itinerary" }))
}

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let items = state.repo.list_by_user(&user.subject_id).await?;
    let stats = state.repo.stats_by_user(&user.subject_id).await?;
    Ok(Json(json!({ "items": items, "stats": stats })))
}

pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state.repo.stats_by_user(&user.subject_id).await?;
    Ok(Json(json!({ "stats": stats })))
}

pub async fn add_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    payload: Result<Json<AddItemRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(invalid_body)?;
    let entry = request.into_entry(&user.subject_id)?;

    if state.repo.exists(&entry.user_id, entry.item_type, &entry.item_id).await? {
        return Err(ApiError::DuplicateItem);
    }
    // The UNIQUE constraint still catches a racing insert
    let created = state.repo.create(&entry).await?;
    log::info!("User {} saved {}", user.subject_id, created.item_key);

    Ok((StatusCode::CREATED, Json(json!({ "item": created }))))
}

pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(invalid_body)?;
    let patch = request.into_patch()?;
    let updated = state.repo.update(&user.subject_id, &id, &patch).await?;
    Ok(Json(json!({ "item": updated })))
}

pub async fn remove_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.repo.delete(&user.subject_id, &id).await?;
    Ok(Json(json!({ "message": "Item removed from itinerary" })))
}

pub async fn clear_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state.repo.delete_by_user(&user.subject_id).await?;
    log::info!("User {} cleared {} itinerary items", user.subject_id, removed);
    Ok(Json(json!({ "message": "Itinerary cleared", "removed": removed })))
}
