//! Error types for basket_core.
//!
//! Basket mutations never fail; errors only exist at the edges: decoding
//! wire envelopes and loading configuration. Transport errors live next to
//! the transport trait (`sync::TransportError`).

use std::path::PathBuf;

use thiserror::Error;

/// Failure to decode an inbound wire message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The text frame is not a valid envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    /// The envelope is valid but its payload does not fit the method.
    #[error("malformed payload for method '{method}': {source}")]
    MalformedPayload {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    /// An `itemUpdate` envelope arrived without a payload.
    #[error("missing payload for method '{0}'")]
    MissingPayload(String),
}

/// Failure to load or save [`crate::config::BasketConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("could not determine config directory")]
    NoConfigDir,
}
