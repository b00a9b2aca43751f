//! Storage Layer
//!
//! The two places an itinerary can live:
//! - local: device-local key-value medium, for anonymous sessions
//! - remote: the itinerary HTTP service, for signed-in users

mod kv;
mod local;
mod remote;

pub use kv::{FileStorage, KeyValueStorage, MemoryStorage};
pub use local::{LocalStore, ITINERARY_KEY};
pub use remote::{ListResponse, RemoteStore};
