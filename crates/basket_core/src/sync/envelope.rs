//! Wire envelopes (JSON over WebSocket text frames).
//!
//! Every message in either direction is wrapped as
//!
//! ```json
//! { "messageId": "…", "method": "itemUpdate", "payload": [ … ] }
//! ```
//!
//! The peer acknowledges each envelope it handled by echoing its
//! `messageId` with method `ack` and no payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ProtocolError;
use crate::item::BasketItem;

/// One or more item snapshots (client → peer and peer → client).
pub const ITEM_UPDATE: &str = "itemUpdate";
/// Recovery batch of still-unacknowledged envelopes, sent after reconnect.
pub const UNACKED_MESSAGES: &str = "unackedMessages";
/// Acknowledgement of the envelope named by `messageId` (peer → client).
pub const ACK: &str = "ack";

/// A wire message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub message_id: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// Decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Item snapshots to merge.
    ItemUpdate(Vec<BasketItem>),
    /// A relayed recovery batch from another participant.
    UnackedMessages(Vec<Envelope>),
    /// Acknowledgement for one of our envelopes.
    Ack(String),
    /// A method this client does not handle.
    Unknown(String),
}

/// Payloads may carry a single value or an array of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

impl Envelope {
    /// Create an envelope with a fresh message id.
    pub fn new(method: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            method: method.into(),
            payload,
        }
    }

    /// Acknowledgement for `message_id`.
    pub fn ack(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            method: ACK.to_string(),
            payload: None,
        }
    }

    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::MalformedEnvelope)
    }

    /// Serialize for a text frame.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode the payload according to the method.
    pub fn into_inbound(self) -> Result<Inbound, ProtocolError> {
        match self.method.as_str() {
            ITEM_UPDATE => {
                let items: OneOrMany<BasketItem> = decode_payload(&self.method, self.payload)?;
                Ok(Inbound::ItemUpdate(items.into()))
            }
            UNACKED_MESSAGES => {
                let envelopes: Vec<Envelope> = match self.payload {
                    None | Some(Value::Null) => Vec::new(),
                    payload => decode_payload(&self.method, payload)?,
                };
                Ok(Inbound::UnackedMessages(envelopes))
            }
            ACK => Ok(Inbound::Ack(self.message_id)),
            _ => Ok(Inbound::Unknown(self.method)),
        }
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(
    method: &str,
    payload: Option<Value>,
) -> Result<T, ProtocolError> {
    let payload = payload
        .filter(|value| !value.is_null())
        .ok_or_else(|| ProtocolError::MissingPayload(method.to_string()))?;
    serde_json::from_value(payload).map_err(|source| ProtocolError::MalformedPayload {
        method: method.to_string(),
        source,
    })
}
