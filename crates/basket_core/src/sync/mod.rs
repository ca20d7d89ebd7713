//! Offline-resilient basket synchronization.
//!
//! The protocol engine ([`BasketSession`] and its parts) is sans-IO and
//! available everywhere. The tokio host ([`SyncClient`]) and the WebSocket
//! transport live behind the `native-sync` feature.

mod channel;
mod envelope;
mod messenger;
mod session;
mod timer;

#[cfg(all(not(target_arch = "wasm32"), feature = "native-sync"))]
mod sync_client;
#[cfg(all(not(target_arch = "wasm32"), feature = "native-sync"))]
mod tokio_transport;
#[cfg(all(not(target_arch = "wasm32"), feature = "native-sync"))]
mod transport;

pub use channel::{ConnectionStatus, DeliveryChannel, NoopStatusObserver, StatusObserver};
pub use envelope::{ACK, Envelope, ITEM_UPDATE, Inbound, UNACKED_MESSAGES};
pub use messenger::{PendingEnvelope, ReliableMessenger};
pub use session::{BasketSession, IncomingEvent, SessionAction, SessionConfig};
pub use timer::{TimerId, TimerIds};

#[cfg(all(not(target_arch = "wasm32"), feature = "native-sync"))]
pub use sync_client::{BasketCommand, BasketHandle, SyncClient, SyncClientConfig};
#[cfg(all(not(target_arch = "wasm32"), feature = "native-sync"))]
pub use tokio_transport::{TokioConnector, TokioTransport};
#[cfg(all(not(target_arch = "wasm32"), feature = "native-sync"))]
pub use transport::{SyncTransport, TransportConnector, TransportError, WsMessage};
