//! Itinerary State Store
//!
//! Reducer-style session state. Every change arrives as an [`Action`];
//! statistics are derived from the item list right after each transition.

use crate::models::{ItemType, ItineraryItem, ItineraryStats, Owner};

/// State transitions, applied only after the backing store confirmed them
#[derive(Debug, Clone)]
pub enum Action {
    /// Replace everything with a fresh read from the active store
    Loaded { owner: Owner, items: Vec<ItineraryItem> },
    Added(ItineraryItem),
    Updated(ItineraryItem),
    Removed(String),
    Cleared,
}

#[derive(Debug, Clone, Default)]
pub struct ItineraryState {
    /// Owner of `items`; `None` until the first load
    owner: Option<Owner>,
    items: Vec<ItineraryItem>,
    stats: ItineraryStats,
}

impl ItineraryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }

    pub fn items(&self) -> &[ItineraryItem] {
        &self.items
    }

    pub fn stats(&self) -> ItineraryStats {
        self.stats
    }

    pub fn find(&self, id: &str) -> Option<&ItineraryItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Same identity rule as the duplicate check on add
    pub fn contains(&self, item_type: ItemType, item_id: &str) -> bool {
        self.items.iter().any(|item| item.matches(item_type, item_id))
    }

    pub fn reduce(&mut self, action: Action) {
        match action {
            Action::Loaded { owner, items } => {
                self.owner = Some(owner);
                self.items = items;
            }
            Action::Added(item) => {
                // Identity is unique per owner
                if self.find(&item.id).is_none() {
                    self.items.push(item);
                }
            }
            Action::Updated(updated) => {
                if let Some(item) = self.items.iter_mut().find(|item| item.id == updated.id) {
                    *item = updated;
                }
            }
            Action::Removed(id) => {
                self.items.retain(|item| item.id != id);
            }
            Action::Cleared => {
                self.items.clear();
            }
        }
        self.stats = ItineraryStats::from_items(&self.items);
    }
}
