//! Item Codec
//!
//! Turns search results from the different providers into canonical
//! [`ItineraryItem`]s and derives their identity keys.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ItemType, ItineraryItem, NewItem, Owner};

/// Source of fallback identifiers for items without an upstream id
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random UUID v4 identifiers
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic `"{prefix}{n}"` identifiers for tests and replays
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&self) -> String {
        format!("{}{}", self.prefix, self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// The upstream id as it takes part in identity: trimmed, `None` when blank
pub fn resolve_item_id(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|id| !id.is_empty())
}

/// `"{itemType}-{itemId}"`, with the id resolved like [`resolve_item_id`]
pub fn identity_key(item_type: ItemType, item_id: &str) -> String {
    format!("{}-{}", item_type.as_str(), item_id.trim())
}

/// An item that passed validation, with its resolved upstream id
#[derive(Debug, Clone)]
pub struct Normalized {
    pub item_id: String,
    pub item: ItineraryItem,
}

#[derive(Clone)]
pub struct ItemCodec {
    ids: Arc<dyn IdGenerator>,
}

impl Default for ItemCodec {
    fn default() -> Self {
        Self::new(Arc::new(UuidGenerator))
    }
}

impl ItemCodec {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self { ids }
    }

    /// Validate the type, resolve the item id and build the canonical item.
    ///
    /// Fails with `InvalidItemType` before anything else happens.
    pub fn normalize(&self, input: &NewItem, owner: Owner) -> Result<Normalized> {
        let item_type: ItemType = input.item_type.parse()?;
        let item_id = match resolve_item_id(input.item_id.as_deref()) {
            Some(id) => id.to_string(),
            None => self.ids.generate(),
        };

        let item = ItineraryItem {
            id: identity_key(item_type, &item_id),
            item_type,
            item_data: input.item_data.clone(),
            date: input.date,
            time: input.time,
            notes: input.notes.clone().unwrap_or_default(),
            created_at: Utc::now(),
            owner_ref: owner,
        };
        Ok(Normalized { item_id, item })
    }
}

// ========================
// Provider record extractors
// ========================

/// Build a hotel item from a nearby-place lodging record
pub fn hotel_from_place(place: &Value) -> NewItem {
    let data = pick(place, &["name", "vicinity", "rating", "price_level", "place_id", "photos"]);
    NewItem::new(ItemType::Hotel.as_str(), str_field(place, "place_id").as_deref(), data)
}

/// Build a flight item from a flight-offer record
pub fn flight_from_offer(offer: &Value) -> NewItem {
    let segments = offer
        .pointer("/itineraries/0/segments")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let first = segments.first();
    let last = segments.last();

    let data = json!({
        "from": first.and_then(|s| s.pointer("/departure/iataCode")).cloned().unwrap_or(Value::Null),
        "to": last.and_then(|s| s.pointer("/arrival/iataCode")).cloned().unwrap_or(Value::Null),
        "departure": first.and_then(|s| s.pointer("/departure/at")).cloned().unwrap_or(Value::Null),
        "arrival": last.and_then(|s| s.pointer("/arrival/at")).cloned().unwrap_or(Value::Null),
        "airline": first.and_then(|s| s.get("carrierCode")).cloned().unwrap_or(Value::Null),
        "stops": segments.len().saturating_sub(1),
        "price": offer.pointer("/price/total").cloned().unwrap_or(Value::Null),
        "currency": offer.pointer("/price/currency").cloned().unwrap_or(Value::Null),
    });
    NewItem::new(ItemType::Flight.as_str(), str_field(offer, "id").as_deref(), data)
}

/// Build an attraction item from a place or activity record.
///
/// Records without an id but with a name key on `"{name}-{index}"`.
pub fn attraction_from_record(record: &Value, index: usize) -> NewItem {
    let id = ["id", "place_id", "location_id"]
        .iter()
        .find_map(|k| str_field(record, k))
        .or_else(|| str_field(record, "name").map(|name| format!("{}-{}", name, index)));

    let mut data = pick(record, &["name", "type", "category", "description", "shortDescription", "rating"]);
    if let Value::Object(map) = &mut data {
        if let Some(image) = first_present(record, &["image", "photo"]) {
            map.insert("image".to_string(), image);
        }
        if let Some(url) = first_present(record, &["url", "mapsUrl", "officialUrl"]) {
            map.insert("url".to_string(), url);
        }
    }
    NewItem::new(ItemType::Attraction.as_str(), id.as_deref(), data)
}

/// String or numeric field as a string
fn str_field(record: &Value, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_present(record: &Value, keys: &[&str]) -> Option<Value> {
    keys.iter()
        .filter_map(|k| record.get(*k))
        .find(|v| !v.is_null())
        .cloned()
}

fn pick(record: &Value, keys: &[&str]) -> Value {
    let mut map = Map::new();
    for key in keys {
        if let Some(v) = record.get(*key).filter(|v| !v.is_null()) {
            map.insert(key.to_string(), v.clone());
        }
    }
    Value::Object(map)
}
