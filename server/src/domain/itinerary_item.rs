//! Itinerary Entry
//!
//! One saved flight, hotel or attraction belonging to a user.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;

use super::error::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Flight,
    Hotel,
    Attraction,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Flight => "flight",
            ItemKind::Hotel => "hotel",
            ItemKind::Attraction => "attraction",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "flight" => Ok(ItemKind::Flight),
            "hotel" => Ok(ItemKind::Hotel),
            "attraction" => Ok(ItemKind::Attraction),
            other => Err(DomainError::InvalidInput(format!(
                "itemType must be flight, hotel or attraction, got '{}'",
                other
            ))),
        }
    }
}

/// Stored entry. Serializes to the wire shape clients read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryEntry {
    #[serde(skip)]
    pub row_id: i64,
    /// `"{itemType}-{itemId}"`, unique per user
    #[serde(rename = "id")]
    pub item_key: String,
    pub user_id: String,
    pub item_type: ItemKind,
    pub item_id: String,
    pub item_data: Value,
    pub date: Option<NaiveDate>,
    #[serde(serialize_with = "serialize_time")]
    pub time: Option<NaiveTime>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// Validated create request
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub user_id: String,
    pub item_type: ItemKind,
    pub item_id: String,
    pub item_data: Value,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub notes: String,
}

impl NewEntry {
    pub fn key(&self) -> String {
        format!("{}-{}", self.item_type.as_str(), self.item_id)
    }
}

/// Partial update. Outer `None` leaves a field alone, inner `None` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPatch {
    pub date: Option<Option<NaiveDate>>,
    pub time: Option<Option<NaiveTime>>,
    pub notes: Option<String>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.time.is_none() && self.notes.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ItineraryStats {
    pub flights: usize,
    pub hotels: usize,
    pub attractions: usize,
    pub total: usize,
}

impl ItineraryStats {
    pub fn record(&mut self, kind: ItemKind, count: usize) {
        match kind {
            ItemKind::Flight => self.flights += count,
            ItemKind::Hotel => self.hotels += count,
            ItemKind::Attraction => self.attractions += count,
        }
        self.total += count;
    }
}

pub fn parse_date(raw: &str) -> DomainResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| DomainError::InvalidInput(format!("date must be YYYY-MM-DD, got '{}'", raw)))
}

/// `HH:MM`, also accepting `HH:MM:SS`
pub fn parse_time(raw: &str) -> DomainResult<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| DomainError::InvalidInput(format!("time must be HH:MM, got '{}'", raw)))
}

fn serialize_time<S: Serializer>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
    match time {
        Some(t) => serializer.collect_str(&t.format("%H:%M")),
        None => serializer.serialize_none(),
    }
}
