//! Repository Layer
//!
//! Data access abstractions and the SQLite implementation.

mod db;
mod itinerary_repo;
mod traits;


pub use db::{init_db, DbState};
pub use itinerary_repo::SqliteItineraryRepository;
pub use traits::ItineraryRepository;
