//! Transport abstraction for the basket connection.
//!
//! `SyncClient` is generic over a [`TransportConnector`] so it can run on
//! tokio-tungstenite in production and on scripted transports in tests.
//!
//! ```text
//! ┌────────────────────┐
//! │ TokioTransport     │   text frames, ping, close
//! │ (tokio-tungstenite)│
//! └─────────┬──────────┘
//!           ▼
//! ┌──────────────────────┐
//! │ SyncClient<C>        │   timers, commands, reconnect
//! └─────────┬────────────┘
//!           ▼
//! ┌──────────────────────┐
//! │ BasketSession        │
//! └──────────────────────┘
//! ```

use thiserror::Error;

/// A frame received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

/// Errors at the transport edge.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Connection closed")]
    Closed,

    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("{0}")]
    Other(String),
}

/// One open bidirectional connection.
#[async_trait::async_trait]
pub trait SyncTransport: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    async fn send_ping(&mut self) -> Result<(), TransportError>;

    /// Next frame, or `None` once the stream has ended.
    async fn recv(&mut self) -> Option<Result<WsMessage, TransportError>>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens new [`SyncTransport`]s.
#[async_trait::async_trait]
pub trait TransportConnector: Send + Sync {
    type Transport: SyncTransport + 'static;

    async fn connect(&self, url: &str) -> Result<Self::Transport, TransportError>;
}
