//! Basket items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether an item still needs buying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemStatus {
    /// On the shopping list.
    ToBuy,
    /// Checked off.
    Bought,
}

/// A single entry in the shared basket.
///
/// Serialized exactly as it travels on the wire:
///
/// ```json
/// { "id": "…", "name": "Milk", "status": "toBuy", "lastModified": "2018-03-08T08:15:16.097Z" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketItem {
    /// Unique id, assigned once at creation.
    pub id: String,
    /// Display text. Items are deduplicated by exact name.
    pub name: String,
    pub status: ItemStatus,
    /// Time of the last status or content change.
    pub last_modified: DateTime<Utc>,
}

impl BasketItem {
    /// Create a new to-buy item with a fresh id.
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            status: ItemStatus::ToBuy,
            last_modified: now,
        }
    }

    /// Set the status and stamp the transition time.
    pub fn transition(&mut self, status: ItemStatus, at: DateTime<Utc>) {
        self.status = status;
        self.last_modified = at;
    }

    pub fn is_bought(&self) -> bool {
        self.status == ItemStatus::Bought
    }
}
