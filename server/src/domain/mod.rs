//! Domain Layer
//!
//! Itinerary entries as the service stores them, plus the error type every
//! other layer returns.

mod error;
mod itinerary_item;

pub use error::{DomainError, DomainResult};
pub use itinerary_item::{
    parse_date, parse_time, EntryPatch, ItemKind, ItineraryEntry, ItineraryStats, NewEntry,
};
