//! Grouping Utilities
//!
//! Day-by-day view of an itinerary for display.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;

use crate::models::ItineraryItem;

/// Label of the bucket holding undated items
pub const NO_DATE: &str = "No Date";

/// Group key. Variant order makes every dated key sort before `NoDate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DateKey {
    Day(NaiveDate),
    NoDate,
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateKey::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            DateKey::NoDate => f.write_str(NO_DATE),
        }
    }
}

/// Group items by date, days ascending and "No Date" last.
///
/// Inside a day, timed items come first in time order; untimed items follow
/// in insertion order.
pub fn group_by_date(items: &[ItineraryItem]) -> BTreeMap<DateKey, Vec<ItineraryItem>> {
    let mut groups: BTreeMap<DateKey, Vec<ItineraryItem>> = BTreeMap::new();
    for item in items {
        let key = item.date.map(DateKey::Day).unwrap_or(DateKey::NoDate);
        groups.entry(key).or_default().push(item.clone());
    }

    for group in groups.values_mut() {
        // Stable: ties and untimed items keep insertion order
        group.sort_by_key(|item| (item.time.is_none(), item.time));
    }
    groups
}
