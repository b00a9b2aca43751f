//! DreamCation itinerary core
//!
//! Layered like the app that embeds it:
//! - models / codec: canonical items and how provider records become items
//! - session: whether the traveller is signed in
//! - storage: local key-value store and the remote itinerary service
//! - store / grouping: in-memory state and its derived views
//! - service: the façade the UI talks to
//! - providers: search collaborators behind the gateway

pub mod codec;
pub mod config;
pub mod error;
pub mod grouping;
pub mod models;
pub mod providers;
pub mod service;
pub mod session;
pub mod storage;
pub mod store;

pub use codec::{identity_key, ItemCodec};
pub use config::ClientConfig;
pub use error::{ItineraryError, Result};
pub use grouping::{group_by_date, DateKey, NO_DATE};
pub use models::{ItemPatch, ItemType, ItineraryItem, ItineraryStats, NewItem, Owner};
pub use providers::{CarQuery, FlightQuery, TravelSearch};
pub use service::{ItinerarySnapshot, ItineraryService, Notice};
pub use session::{Session, SessionGate};
