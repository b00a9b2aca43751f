//! Itinerary Models
//!
//! Canonical item shape shared by the local and remote stores.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::ItineraryError;

/// Closed set of things a traveller can save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Flight,
    Hotel,
    Attraction,
}

impl ItemType {
    pub const ALL: [ItemType; 3] = [ItemType::Flight, ItemType::Hotel, ItemType::Attraction];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Flight => "flight",
            ItemType::Hotel => "hotel",
            ItemType::Attraction => "attraction",
        }
    }
}

impl FromStr for ItemType {
    type Err = ItineraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flight" => Ok(ItemType::Flight),
            "hotel" => Ok(ItemType::Hotel),
            "attraction" => Ok(ItemType::Attraction),
            other => Err(ItineraryError::InvalidItemType(other.to_string())),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which store owns an item: the device, or a server-side user
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Owner {
    #[default]
    Local,
    User(String),
}

impl Owner {
    pub fn is_local(&self) -> bool {
        matches!(self, Owner::Local)
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Local => f.write_str("local"),
            Owner::User(id) => write!(f, "user:{}", id),
        }
    }
}

impl Serialize for Owner {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Owner {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.strip_prefix("user:") {
            Some(id) if !id.is_empty() => Ok(Owner::User(id.to_string())),
            Some(_) => Err(serde::de::Error::custom("empty user id in ownerRef")),
            None if raw == "local" => Ok(Owner::Local),
            None => Err(serde::de::Error::custom(format!("unknown ownerRef '{}'", raw))),
        }
    }
}

/// One saved flight, hotel or attraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryItem {
    /// Identity key, `"{itemType}-{itemId}"`
    pub id: String,
    pub item_type: ItemType,
    /// Provider-shaped payload, passed through untouched
    pub item_data: Value,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default, with = "clock_time")]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub owner_ref: Owner,
}

impl ItineraryItem {
    /// Apply a patch; absent fields stay as they are
    pub fn apply(&mut self, patch: &ItemPatch) {
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(time) = patch.time {
            self.time = time;
        }
        if let Some(notes) = &patch.notes {
            self.notes = notes.clone();
        }
    }

    pub fn matches(&self, item_type: ItemType, item_id: &str) -> bool {
        self.item_type == item_type && self.id == crate::codec::identity_key(item_type, item_id)
    }
}

/// Input for adding an item, before normalization
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    pub item_type: String,
    /// Upstream identifier; generated when absent
    pub item_id: Option<String>,
    pub item_data: Value,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub notes: Option<String>,
}

impl NewItem {
    pub fn new(item_type: impl Into<String>, item_id: Option<&str>, item_data: Value) -> Self {
        Self {
            item_type: item_type.into(),
            item_id: item_id.map(str::to_string),
            item_data,
            ..Default::default()
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_time(mut self, time: NaiveTime) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Partial update of an item.
///
/// The outer `Option` says whether a field is touched; for `date` and `time`
/// an inner `None` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<Option<NaiveDate>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "clock_time::serialize_patch"
    )]
    pub time: Option<Option<NaiveTime>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ItemPatch {
    pub fn notes(notes: impl Into<String>) -> Self {
        Self {
            notes: Some(notes.into()),
            ..Default::default()
        }
    }

    pub fn date(date: Option<NaiveDate>) -> Self {
        Self {
            date: Some(date),
            ..Default::default()
        }
    }

    pub fn time(time: Option<NaiveTime>) -> Self {
        Self {
            time: Some(time),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.time.is_none() && self.notes.is_none()
    }
}

/// Per-type counts over the current item set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItineraryStats {
    pub flights: usize,
    pub hotels: usize,
    pub attractions: usize,
    pub total: usize,
}

impl ItineraryStats {
    pub fn from_items(items: &[ItineraryItem]) -> Self {
        let mut stats = Self::default();
        for item in items {
            match item.item_type {
                ItemType::Flight => stats.flights += 1,
                ItemType::Hotel => stats.hotels += 1,
                ItemType::Attraction => stats.attractions += 1,
            }
        }
        stats.total = items.len();
        stats
    }
}

/// Time-of-day as `HH:MM`, accepting `HH:MM:SS` on input
pub(crate) mod clock_time {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .ok()
    }

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => serializer.collect_str(&t.format("%H:%M")),
            None => serializer.serialize_none(),
        }
    }

    pub fn serialize_patch<S: Serializer>(
        time: &Option<Option<NaiveTime>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serialize(&time.flatten(), serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveTime>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) if raw.is_empty() => Ok(None),
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid time '{}'", raw))),
        }
    }
}
