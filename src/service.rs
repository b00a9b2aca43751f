//! Itinerary Service
//!
//! Single entry point for everything the UI does with an itinerary.
//!
//! - Picks the backing store per operation from the [`SessionGate`]:
//!   anonymous sessions persist to the [`LocalStore`], signed-in sessions to
//!   the [`RemoteStore`].
//! - Owns the in-memory item list; it changes only through [`Action`]s
//!   applied after the store confirmed the write.
//! - Mutations are serialized per service and run on their own task, so a
//!   caller that stops waiting cannot leave a half-applied change behind.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::codec::{ItemCodec, Normalized};
use crate::config::ClientConfig;
use crate::error::{ItineraryError, Result};
use crate::grouping::{group_by_date, DateKey};
use crate::models::{ItemPatch, ItemType, ItineraryItem, ItineraryStats, NewItem, Owner};
use crate::session::{Session, SessionGate, StorageCredentials};
use crate::storage::{FileStorage, KeyValueStorage, LocalStore, RemoteStore};
use crate::store::{Action, ItineraryState};

/// User-facing outcome of an add
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Added { id: String },
    AlreadySaved { id: String },
    Failed { message: String },
}

impl Notice {
    pub fn for_add(result: &Result<ItineraryItem>) -> Self {
        match result {
            Ok(item) => Notice::Added { id: item.id.clone() },
            Err(ItineraryError::DuplicateItem { id }) => Notice::AlreadySaved { id: id.clone() },
            Err(e) => Notice::Failed { message: e.to_string() },
        }
    }

    pub fn message(&self) -> String {
        match self {
            Notice::Added { .. } => "Added to your itinerary".to_string(),
            Notice::AlreadySaved { .. } => "Already saved in your itinerary".to_string(),
            Notice::Failed { message } => format!("Could not save to your itinerary: {}", message),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Failed { .. })
    }
}

/// Point-in-time copy of the session's itinerary
#[derive(Debug, Clone, Default)]
pub struct ItinerarySnapshot {
    pub owner: Option<Owner>,
    pub items: Vec<ItineraryItem>,
    pub stats: ItineraryStats,
}

struct Inner {
    session: SessionGate,
    codec: ItemCodec,
    local: LocalStore,
    remote: RemoteStore,
    state: Mutex<ItineraryState>,
}

#[derive(Clone)]
pub struct ItineraryService {
    inner: Arc<Inner>,
}

impl ItineraryService {
    pub fn new(session: SessionGate, local: LocalStore, remote: RemoteStore) -> Self {
        Self::with_codec(session, local, remote, ItemCodec::default())
    }

    pub fn with_codec(session: SessionGate, local: LocalStore, remote: RemoteStore, codec: ItemCodec) -> Self {
        Self {
            inner: Arc::new(Inner {
                session,
                codec,
                local,
                remote,
                state: Mutex::new(ItineraryState::new()),
            }),
        }
    }

    /// File-backed local storage and credentials under `storage_dir`,
    /// remote calls against `api_base_url`.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::new(&config.storage_dir));
        let session = SessionGate::new(Arc::new(StorageCredentials::new(storage.clone())));
        let remote = RemoteStore::new(&config.api_base_url, config.request_timeout)?;
        Ok(Self::new(session, LocalStore::new(storage), remote))
    }

    pub fn session(&self) -> &SessionGate {
        &self.inner.session
    }

    /// Reload from whichever store the session currently selects
    pub async fn refresh(&self) -> Result<()> {
        let inner = self.inner.clone();
        run_to_completion(async move { inner.refresh().await }).await
    }

    pub async fn add(&self, input: NewItem) -> Result<ItineraryItem> {
        let inner = self.inner.clone();
        run_to_completion(async move { inner.add(input).await }).await
    }

    pub async fn update(&self, id: &str, patch: ItemPatch) -> Result<ItineraryItem> {
        let inner = self.inner.clone();
        let id = id.to_string();
        run_to_completion(async move { inner.update(&id, patch).await }).await
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        let inner = self.inner.clone();
        let id = id.to_string();
        run_to_completion(async move { inner.remove(&id).await }).await
    }

    /// Empty the itinerary. Only a failing remote store can make this fail.
    pub async fn clear(&self) -> Result<()> {
        let inner = self.inner.clone();
        run_to_completion(async move { inner.clear().await }).await
    }

    /// Whether `(item_type, item_id)` is saved. Unknown types are never present.
    pub async fn is_item_present(&self, item_type: &str, item_id: &str) -> bool {
        let Ok(item_type) = item_type.parse::<ItemType>() else {
            return false;
        };
        self.inner.state.lock().await.contains(item_type, item_id)
    }

    pub async fn items(&self) -> Vec<ItineraryItem> {
        self.inner.state.lock().await.items().to_vec()
    }

    pub async fn statistics(&self) -> ItineraryStats {
        self.inner.state.lock().await.stats()
    }

    pub async fn grouped_by_date(&self) -> BTreeMap<DateKey, Vec<ItineraryItem>> {
        group_by_date(self.inner.state.lock().await.items())
    }

    pub async fn snapshot(&self) -> ItinerarySnapshot {
        let state = self.inner.state.lock().await;
        ItinerarySnapshot {
            owner: state.owner().cloned(),
            items: state.items().to_vec(),
            stats: state.stats(),
        }
    }
}

/// Drive a mutation on its own task so it finishes even if the caller goes away
async fn run_to_completion<T, F>(operation: F) -> Result<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    tokio::spawn(operation)
        .await
        .map_err(|e| ItineraryError::Internal(format!("Itinerary task failed: {}", e)))?
}

impl Inner {
    /// Make sure `state` belongs to the session's owner, reloading if not
    async fn ensure_loaded(&self, state: &mut ItineraryState, session: &Session) -> Result<()> {
        let owner = session.owner();
        if state.owner() == Some(&owner) {
            return Ok(());
        }
        if let Some(previous) = state.owner() {
            log::info!("Itinerary owner changed from {} to {}, reloading", previous, owner);
        }
        self.load_into(state, session).await
    }

    async fn load_into(&self, state: &mut ItineraryState, session: &Session) -> Result<()> {
        let items = match session.token() {
            None => self.local.list(),
            Some(token) => self.remote.list(token).await?.items,
        };
        log::debug!("Loaded {} itinerary items for {}", items.len(), session.owner());
        state.reduce(Action::Loaded {
            owner: session.owner(),
            items,
        });
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        let session = self.session.session();
        let mut state = self.state.lock().await;
        self.load_into(&mut state, &session).await
    }

    async fn add(&self, input: NewItem) -> Result<ItineraryItem> {
        let session = self.session.session();
        let Normalized { item_id, item } = self.codec.normalize(&input, session.owner())?;

        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state, &session).await?;

        if state.contains(item.item_type, &item_id) {
            log::debug!("Skipping duplicate itinerary item {}", item.id);
            return Err(ItineraryError::DuplicateItem { id: item.id });
        }

        let saved = match session.token() {
            None => {
                let mut next = state.items().to_vec();
                next.push(item.clone());
                self.local.save(&next);
                item
            }
            Some(token) => {
                self.remote
                    .add(
                        token,
                        item.item_type,
                        &item_id,
                        &item.item_data,
                        item.date,
                        item.time,
                        &item.notes,
                    )
                    .await?
            }
        };

        state.reduce(Action::Added(saved.clone()));
        Ok(saved)
    }

    async fn update(&self, id: &str, patch: ItemPatch) -> Result<ItineraryItem> {
        let session = self.session.session();
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state, &session).await?;

        let current = state
            .find(id)
            .cloned()
            .ok_or_else(|| ItineraryError::NotFound { id: id.to_string() })?;
        if patch.is_empty() {
            return Ok(current);
        }

        let updated = match session.token() {
            None => {
                let mut item = current;
                item.apply(&patch);
                let next: Vec<ItineraryItem> = state
                    .items()
                    .iter()
                    .map(|existing| if existing.id == id { item.clone() } else { existing.clone() })
                    .collect();
                self.local.save(&next);
                item
            }
            Some(token) => self.remote.update(token, id, &patch).await?,
        };

        state.reduce(Action::Updated(updated.clone()));
        Ok(updated)
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let session = self.session.session();
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state, &session).await?;

        if state.find(id).is_none() {
            return Err(ItineraryError::NotFound { id: id.to_string() });
        }

        match session.token() {
            None => {
                let next: Vec<ItineraryItem> = state
                    .items()
                    .iter()
                    .filter(|item| item.id != id)
                    .cloned()
                    .collect();
                self.local.save(&next);
            }
            Some(token) => self.remote.remove(token, id).await?,
        }

        state.reduce(Action::Removed(id.to_string()));
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let session = self.session.session();
        let mut state = self.state.lock().await;

        match session.token() {
            None => self.local.save(&[]),
            Some(token) => self.remote.clear(token).await?,
        }

        // Clearing needs no prior read; just adopt the owner
        if state.owner() != Some(&session.owner()) {
            state.reduce(Action::Loaded {
                owner: session.owner(),
                items: Vec::new(),
            });
        }
        state.reduce(Action::Cleared);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SequentialIdGenerator;
    use crate::session::tests::token_for;
    use crate::storage::{MemoryStorage, ITINERARY_KEY};
    use chrono::{Duration, NaiveDate, NaiveTime};
    use serde_json::json;

    struct Fixture {
        service: ItineraryService,
        storage: Arc<dyn KeyValueStorage>,
    }

    /// Anonymous service; the remote points at a closed port
    fn fixture() -> Fixture {
        let storage: Arc<dyn KeyValueStorage> = Arc::new(MemoryStorage::new());
        let service = ItineraryService::with_codec(
            SessionGate::anonymous(),
            LocalStore::new(storage.clone()),
            RemoteStore::new("http://127.0.0.1:9", std::time::Duration::from_secs(2)).unwrap(),
            ItemCodec::new(Arc::new(SequentialIdGenerator::new("gen-"))),
        );
        Fixture { service, storage }
    }

    #[tokio::test]
    async fn test_anonymous_flight_hotel_duplicate_scenario() {
        let Fixture { service, .. } = fixture();

        service.add(NewItem::new("flight", Some("FL1"), json!({"airline": "AA"}))).await.unwrap();
        service.add(NewItem::new("hotel", Some("H1"), json!({"name": "Inn"}))).await.unwrap();
        let again = service.add(NewItem::new("flight", Some("FL1"), json!({"airline": "AA"}))).await;

        assert_eq!(again, Err(ItineraryError::DuplicateItem { id: "flight-FL1".to_string() }));
        assert_eq!(
            service.statistics().await,
            ItineraryStats { flights: 1, hotels: 1, attractions: 0, total: 2 }
        );
    }

    #[tokio::test]
    async fn test_repeated_adds_only_first_succeeds() {
        let Fixture { service, .. } = fixture();
        let mut successes = 0;
        for _ in 0..5 {
            if service.add(NewItem::new("attraction", Some("A1"), json!({}))).await.is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(service.items().await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_adds_do_not_race_past_duplicate_check() {
        let Fixture { service, .. } = fixture();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.add(NewItem::new("hotel", Some("H1"), json!({}))).await
            }));
        }
        let mut ok = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(service.statistics().await.total, 1);
    }

    #[tokio::test]
    async fn test_presence_tracks_add_and_remove() {
        let Fixture { service, .. } = fixture();
        assert!(!service.is_item_present("hotel", "abc123").await);

        let item = service.add(NewItem::new("hotel", Some("abc123"), json!({"name": "Grand Hotel"}))).await.unwrap();
        assert!(service.is_item_present("hotel", "abc123").await);
        assert!(!service.is_item_present("flight", "abc123").await);
        assert!(!service.is_item_present("car", "abc123").await);

        service.remove(&item.id).await.unwrap();
        assert!(!service.is_item_present("hotel", "abc123").await);
    }

    #[tokio::test]
    async fn test_presence_uses_same_identity_as_duplicate_check() {
        let Fixture { service, .. } = fixture();
        service.add(NewItem::new("hotel", Some(" abc "), json!({}))).await.unwrap();

        assert!(service.is_item_present("hotel", " abc ").await);
        assert!(service.is_item_present("hotel", "abc").await);
        let again = service.add(NewItem::new("hotel", Some("abc"), json!({}))).await;
        assert_eq!(again, Err(ItineraryError::DuplicateItem { id: "hotel-abc".to_string() }));
    }

    #[tokio::test]
    async fn test_abandoned_mutations_still_reconcile() {
        let Fixture { service, storage } = fixture();
        let item = service.add(NewItem::new("hotel", Some("H1"), json!({}))).await.unwrap();

        let add = service.add(NewItem::new("flight", Some("F1"), json!({})));
        let _ = tokio::time::timeout(std::time::Duration::from_nanos(1), add).await;
        let update = service.update(&item.id, ItemPatch::notes("late check-in"));
        let _ = tokio::time::timeout(std::time::Duration::from_nanos(1), update).await;

        // Reads queue behind the abandoned tasks on the state lock
        for _ in 0..50 {
            let items = service.items().await;
            if items.len() == 2 && items.iter().any(|i| i.notes == "late check-in") {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let snapshot = service.snapshot().await;
        assert!(service.is_item_present("flight", "F1").await);
        assert_eq!(snapshot.items[0].notes, "late check-in");
        assert_eq!(snapshot.stats.total, snapshot.items.len());
        assert_eq!(ItineraryStats::from_items(&snapshot.items), snapshot.stats);

        let stored: Vec<ItineraryItem> =
            serde_json::from_str(&storage.get(ITINERARY_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored, snapshot.items);
    }

    #[tokio::test]
    async fn test_round_trip_through_local_storage() {
        let Fixture { service, storage } = fixture();
        service.add(NewItem::new("hotel", Some("abc123"), json!({"name": "Grand Hotel"}))).await.unwrap();

        let items = LocalStore::new(storage).list();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "hotel-abc123");
        assert_eq!(items[0].item_type, ItemType::Hotel);
        assert_eq!(items[0].item_data["name"], "Grand Hotel");
    }

    #[tokio::test]
    async fn test_update_notes_keeps_date_and_time() {
        let Fixture { service, .. } = fixture();
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let time = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        service
            .add(NewItem::new("attraction", Some("A1"), json!({"name": "Museum"})).with_date(date).with_time(time))
            .await
            .unwrap();

        let updated = service.update("attraction-A1", ItemPatch::notes("Buy tickets early")).await.unwrap();
        assert_eq!(updated.notes, "Buy tickets early");
        assert_eq!(updated.date, Some(date));
        assert_eq!(updated.time, Some(time));
        assert_eq!(service.items().await[0].notes, "Buy tickets early");
    }

    #[tokio::test]
    async fn test_update_and_remove_unknown_id() {
        let Fixture { service, .. } = fixture();
        assert_eq!(
            service.update("hotel-missing", ItemPatch::notes("x")).await,
            Err(ItineraryError::NotFound { id: "hotel-missing".to_string() })
        );
        assert_eq!(
            service.remove("hotel-missing").await,
            Err(ItineraryError::NotFound { id: "hotel-missing".to_string() })
        );
    }

    #[tokio::test]
    async fn test_clear_empties_memory_and_storage() {
        let Fixture { service, storage } = fixture();
        service.add(NewItem::new("flight", Some("F1"), json!({}))).await.unwrap();
        service.add(NewItem::new("hotel", Some("H1"), json!({}))).await.unwrap();
        service.add(NewItem::new("attraction", Some("A1"), json!({}))).await.unwrap();

        service.clear().await.unwrap();
        service.clear().await.unwrap();

        assert_eq!(service.statistics().await.total, 0);
        assert!(service.items().await.is_empty());
        assert_eq!(storage.get(ITINERARY_KEY).unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_invalid_type_never_reaches_storage() {
        let Fixture { service, storage } = fixture();
        let result = service.add(NewItem::new("car", Some("C1"), json!({}))).await;
        assert_eq!(result, Err(ItineraryError::InvalidItemType("car".to_string())));
        assert_eq!(storage.get(ITINERARY_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_generated_ids_for_missing_upstream_id() {
        let Fixture { service, .. } = fixture();
        let first = service.add(NewItem::new("attraction", None, json!({"name": "Park"}))).await.unwrap();
        let second = service.add(NewItem::new("attraction", None, json!({"name": "Park"}))).await.unwrap();
        assert_eq!(first.id, "attraction-gen-1");
        assert_eq!(second.id, "attraction-gen-2");
    }

    #[tokio::test]
    async fn test_statistics_match_items_after_mixed_operations() {
        let Fixture { service, .. } = fixture();
        for (t, id) in [("flight", "F1"), ("flight", "F2"), ("hotel", "H1"), ("attraction", "A1")] {
            service.add(NewItem::new(t, Some(id), json!({}))).await.unwrap();
        }
        service.remove("flight-F1").await.unwrap();
        service.update("hotel-H1", ItemPatch::date(NaiveDate::from_ymd_opt(2025, 1, 1))).await.unwrap();

        let snapshot = service.snapshot().await;
        assert_eq!(snapshot.stats.total, snapshot.items.len());
        for item_type in ItemType::ALL {
            let count = snapshot.items.iter().filter(|i| i.item_type == item_type).count();
            let expected = match item_type {
                ItemType::Flight => snapshot.stats.flights,
                ItemType::Hotel => snapshot.stats.hotels,
                ItemType::Attraction => snapshot.stats.attractions,
            };
            assert_eq!(count, expected);
        }
    }

    #[tokio::test]
    async fn test_local_items_survive_service_restart() {
        let Fixture { service, storage } = fixture();
        service.add(NewItem::new("hotel", Some("H1"), json!({}))).await.unwrap();

        let reopened = ItineraryService::new(
            SessionGate::anonymous(),
            LocalStore::new(storage),
            RemoteStore::new("http://127.0.0.1:9", std::time::Duration::from_secs(2)).unwrap(),
        );
        reopened.refresh().await.unwrap();
        assert!(reopened.is_item_present("hotel", "H1").await);
        let duplicate = reopened.add(NewItem::new("hotel", Some("H1"), json!({}))).await;
        assert!(matches!(duplicate, Err(ItineraryError::DuplicateItem { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_remote_surfaces_and_keeps_state() {
        let Fixture { service, .. } = fixture();
        service.add(NewItem::new("hotel", Some("H1"), json!({}))).await.unwrap();

        service.session().login(&token_for("42", Duration::hours(1)));
        let result = service.add(NewItem::new("flight", Some("F1"), json!({}))).await;

        let err = result.unwrap_err();
        assert!(err.is_retryable(), "unexpected error {:?}", err);
        // No silent fallback to local storage
        let snapshot = service.snapshot().await;
        assert_eq!(snapshot.owner, Some(Owner::Local));
        assert_eq!(snapshot.items.len(), 1);
    }

    #[tokio::test]
    async fn test_grouped_view_uses_current_items() {
        let Fixture { service, .. } = fixture();
        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        service
            .add(NewItem::new("flight", Some("F1"), json!({})).with_date(day).with_time(NaiveTime::from_hms_opt(14, 0, 0).unwrap()))
            .await
            .unwrap();
        service
            .add(NewItem::new("hotel", Some("H1"), json!({})).with_date(day).with_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap()))
            .await
            .unwrap();
        service.add(NewItem::new("attraction", Some("A1"), json!({}))).await.unwrap();

        let groups = service.grouped_by_date().await;
        let keys: Vec<DateKey> = groups.keys().copied().collect();
        assert_eq!(keys, vec![DateKey::Day(day), DateKey::NoDate]);
        let ids: Vec<&str> = groups[&DateKey::Day(day)].iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["hotel-H1", "flight-F1"]);
    }

    #[test]
    fn test_notice_distinguishes_duplicate_from_failure() {
        let duplicate = Notice::for_add(&Err(ItineraryError::DuplicateItem { id: "hotel-H1".into() }));
        let failed = Notice::for_add(&Err(ItineraryError::remote(Some(503), "down")));
        assert_eq!(duplicate, Notice::AlreadySaved { id: "hotel-H1".into() });
        assert!(!duplicate.is_error());
        assert!(failed.is_error());
        assert_ne!(duplicate.message(), failed.message());
    }
}
