//! Repository Layer - Core Traits
//!
//! Every operation is scoped to one user; a key owned by someone else
//! behaves exactly like a missing key.

use async_trait::async_trait;

use crate::domain::{DomainResult, EntryPatch, ItemKind, ItineraryEntry, ItineraryStats, NewEntry};

#[async_trait]
pub trait ItineraryRepository: Send + Sync {
    /// Insert a new entry. `Conflict` if the user already saved it.
    async fn create(&self, entry: &NewEntry) -> DomainResult<ItineraryEntry>;

    async fn find_by_key(&self, user_id: &str, item_key: &str) -> DomainResult<Option<ItineraryEntry>>;

    /// Oldest first
    async fn list_by_user(&self, user_id: &str) -> DomainResult<Vec<ItineraryEntry>>;

    async fn exists(&self, user_id: &str, kind: ItemKind, item_id: &str) -> DomainResult<bool>;

    async fn update(&self, user_id: &str, item_key: &str, patch: &EntryPatch) -> DomainResult<ItineraryEntry>;

    async fn delete(&self, user_id: &str, item_key: &str) -> DomainResult<()>;

    /// Returns how many entries were removed
    async fn delete_by_user(&self, user_id: &str) -> DomainResult<usize>;

    async fn stats_by_user(&self, user_id: &str) -> DomainResult<ItineraryStats>;
}
