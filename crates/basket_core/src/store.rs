//! Item store and state manager.
//!
//! [`ItemStore`] is the canonical name → item map for one basket session.
//! [`StateManager`] owns a store and is the only way to mutate it: local UI
//! actions go through [`StateManager::add_or_get_item`] and the `mark_*`
//! methods, inbound network snapshots through
//! [`StateManager::merge_from_network`]. Every UI-relevant transition is
//! reported synchronously to a [`BasketObserver`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::clock::{Clock, SystemClock};
use crate::item::{BasketItem, ItemStatus};

/// Receives UI-relevant basket transitions.
///
/// Implementors translate these into frontend-specific actions (creating a
/// list entry, moving it between the to-buy and bought lists).
pub trait BasketObserver: Send + Sync {
    /// A new item entered the basket.
    fn item_created(&self, item: &BasketItem);
    /// An item was placed on the to-buy list.
    fn moved_to_buy(&self, item: &BasketItem);
    /// An item was placed on the bought list.
    fn moved_to_bought(&self, item: &BasketItem);
}

/// Observer that ignores every transition.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl BasketObserver for NoopObserver {
    fn item_created(&self, _item: &BasketItem) {}
    fn moved_to_buy(&self, _item: &BasketItem) {}
    fn moved_to_bought(&self, _item: &BasketItem) {}
}

/// Items keyed by exact name, in insertion order.
#[derive(Debug, Default, Clone)]
pub struct ItemStore {
    items: IndexMap<String, BasketItem>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&BasketItem> {
        self.items.get(name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut BasketItem> {
        self.items.get_mut(name)
    }

    fn get_or_create(&mut self, name: &str, now: DateTime<Utc>) -> (&mut BasketItem, bool) {
        let mut created = false;
        let item = self.items.entry(name.to_string()).or_insert_with(|| {
            created = true;
            BasketItem::new(name, now)
        });
        (item, created)
    }

    fn insert(&mut self, item: BasketItem) {
        self.items.insert(item.name.clone(), item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &BasketItem> {
        self.items.values()
    }
}

/// Result of merging a remote snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No local item had that name; the remote item was adopted.
    Created,
    /// The remote item was strictly newer and replaced the local state.
    Updated,
    /// The local item was as new or newer; nothing changed.
    Ignored,
}

/// Owns the item store and applies local and network mutations.
pub struct StateManager {
    store: ItemStore,
    observer: Arc<dyn BasketObserver>,
    clock: Arc<dyn Clock>,
}

impl StateManager {
    /// Create a state manager over an empty store using the wall clock.
    pub fn new(observer: Arc<dyn BasketObserver>) -> Self {
        Self::with_clock(ItemStore::new(), observer, Arc::new(SystemClock))
    }

    /// Create a state manager over an existing store with an explicit clock.
    pub fn with_clock(
        store: ItemStore,
        observer: Arc<dyn BasketObserver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            observer,
            clock,
        }
    }

    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    pub fn get(&self, name: &str) -> Option<&BasketItem> {
        self.store.get(name)
    }

    /// Snapshot of all items in insertion order.
    pub fn items(&self) -> Vec<BasketItem> {
        self.store.iter().cloned().collect()
    }

    /// Snapshot of all items, most recently modified first.
    pub fn recent(&self) -> Vec<BasketItem> {
        let mut items = self.items();
        items.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        items
    }

    /// Return the item called `name`, creating a to-buy item if none exists.
    ///
    /// The boolean is `true` when the item was created by this call.
    pub fn add_or_get_item(&mut self, name: &str) -> (BasketItem, bool) {
        let now = self.clock.now();
        let (item, created) = self.store.get_or_create(name, now);
        let item = item.clone();
        if created {
            log::debug!("[StateManager] Created item '{}' ({})", item.name, item.id);
            self.observer.item_created(&item);
        }
        (item, created)
    }

    /// Add `name` from the input box: create it if new, then re-announce it
    /// on whichever list it currently belongs to.
    ///
    /// Unlike [`mark_to_buy`](Self::mark_to_buy) this never changes the
    /// status of an existing item.
    pub fn add_item(&mut self, name: &str) -> (BasketItem, bool) {
        let (item, created) = self.add_or_get_item(name);
        self.notify_status(&item);
        (item, created)
    }

    /// Put `name` on the to-buy list. Creates the item if needed.
    pub fn mark_to_buy(&mut self, name: &str) -> BasketItem {
        self.mark(name, ItemStatus::ToBuy)
    }

    /// Put `name` on the bought list. Creates the item if needed.
    pub fn mark_bought(&mut self, name: &str) -> BasketItem {
        self.mark(name, ItemStatus::Bought)
    }

    fn mark(&mut self, name: &str, status: ItemStatus) -> BasketItem {
        let now = self.clock.now();
        let (item, created) = self.store.get_or_create(name, now);
        if created {
            self.observer.item_created(item);
        }
        item.transition(status, now);
        let item = item.clone();
        self.notify_status(&item);
        item
    }

    /// Merge an item snapshot received from the network.
    ///
    /// Last-write-wins on `last_modified`; ties keep the local state.
    pub fn merge_from_network(&mut self, remote: BasketItem) -> MergeOutcome {
        let Some(local) = self.store.get_mut(&remote.name) else {
            log::debug!("[StateManager] Adopting remote item '{}'", remote.name);
            self.store.insert(remote.clone());
            self.observer.item_created(&remote);
            self.notify_status(&remote);
            return MergeOutcome::Created;
        };

        if remote.last_modified <= local.last_modified {
            log::trace!(
                "[StateManager] Ignoring stale update for '{}' ({} <= {})",
                remote.name,
                remote.last_modified,
                local.last_modified
            );
            return MergeOutcome::Ignored;
        }

        local.transition(remote.status, remote.last_modified);
        let item = local.clone();
        self.notify_status(&item);
        MergeOutcome::Updated
    }

    fn notify_status(&self, item: &BasketItem) {
        match item.status {
            ItemStatus::ToBuy => self.observer.moved_to_buy(item),
            ItemStatus::Bought => self.observer.moved_to_bought(item),
        }
    }
}
