//! Local Itinerary Store
//!
//! Persists the whole item list as one JSON array under a stable key.
//! Medium failures and corrupt payloads are logged and read as "empty".

use std::sync::Arc;

use crate::models::ItineraryItem;
use super::kv::KeyValueStorage;

/// Storage key, stable across versions
pub const ITINERARY_KEY: &str = "itinerary_items_v1";

#[derive(Clone)]
pub struct LocalStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl LocalStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    pub fn list(&self) -> Vec<ItineraryItem> {
        let raw = match self.storage.get(ITINERARY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                log::warn!("Local itinerary unreadable, treating as empty: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                log::warn!("Local itinerary corrupt, treating as empty: {}", e);
                Vec::new()
            }
        }
    }

    /// Overwrite the persisted list. Best effort: failures are only logged.
    pub fn save(&self, items: &[ItineraryItem]) {
        let json = match serde_json::to_string(items) {
            Ok(json) => json,
            Err(e) => {
                log::error!("Failed to encode local itinerary: {}", e);
                return;
            }
        };
        if let Err(e) = self.storage.set(ITINERARY_KEY, &json) {
            log::warn!("Failed to persist local itinerary ({} items): {}", items.len(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemType, Owner};
    use crate::storage::MemoryStorage;
    use chrono::Utc;
    use serde_json::json;
    use std::io;

    struct BrokenStorage;

    impl KeyValueStorage for BrokenStorage {
        fn get(&self, _key: &str) -> io::Result<Option<String>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
        fn set(&self, _key: &str, _value: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
        fn remove(&self, _key: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
    }

    fn item(id: &str) -> ItineraryItem {
        ItineraryItem {
            id: format!("hotel-{}", id),
            item_type: ItemType::Hotel,
            item_data: json!({"name": id}),
            date: None,
            time: None,
            notes: String::new(),
            created_at: Utc::now(),
            owner_ref: Owner::Local,
        }
    }

    #[test]
    fn test_save_then_list() {
        let store = LocalStore::new(Arc::new(MemoryStorage::new()));
        assert!(store.list().is_empty());

        store.save(&[item("a"), item("b")]);
        let items = store.list();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].id, "hotel-b");
    }

    #[test]
    fn test_corrupt_payload_reads_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(ITINERARY_KEY, "{not json").unwrap();
        let store = LocalStore::new(storage);
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_broken_medium_is_absorbed() {
        let store = LocalStore::new(Arc::new(BrokenStorage));
        store.save(&[item("a")]);
        assert!(store.list().is_empty());
    }
}
