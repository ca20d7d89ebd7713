//! # Basket Core
//!
//! Client engine for collaborative shopping baskets. Several participants
//! share one basket; each runs this engine, which keeps the local item list,
//! ranks autocomplete suggestions, and reconciles local edits with a remote
//! peer over an unreliable WebSocket.
//!
//! - [`item`]: basket items and their to-buy / bought status
//! - [`store`]: the item store plus the state manager that merges local and
//!   network edits
//! - [`suggest`]: three-tier autocomplete ranking
//! - [`sync`]: delivery channel, reliable messenger, session and the native
//!   tokio driver
//! - [`config`]: TOML-backed client configuration

pub mod clock;
pub mod config;
pub mod error;
pub mod item;
pub mod store;
pub mod suggest;
pub mod sync;

pub use clock::{Clock, SystemClock};
pub use config::BasketConfig;
pub use error::{ConfigError, ProtocolError};
pub use item::{BasketItem, ItemStatus};
pub use store::{BasketObserver, ItemStore, NoopObserver, StateManager};
pub use suggest::suggest;
