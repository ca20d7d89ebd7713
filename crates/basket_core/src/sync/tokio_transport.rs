//! Native WebSocket transport for the basket protocol.
//!
//! Envelopes travel as text frames only. Binary frames are surfaced so the
//! client can log and drop them; control frames are passed through so the
//! keepalive can see pongs.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::transport::{SyncTransport, TransportConnector, TransportError, WsMessage};

type BasketSocket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// One open connection to `<server>/ws?basket=<id>`.
pub struct TokioTransport {
    socket: BasketSocket,
}

impl TokioTransport {
    /// Open a connection. `ws://` and `wss://` (rustls) are supported.
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (socket, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("{}: {}", url, e)))?;
        log::debug!("[TokioTransport] Connected to {}", url);
        Ok(Self { socket })
    }
}

/// Map a received frame onto the transport surface. Raw frames yield `None`.
fn incoming(message: Message) -> Option<WsMessage> {
    match message {
        Message::Text(text) => Some(WsMessage::Text(text.to_string())),
        Message::Binary(data) => Some(WsMessage::Binary(data.to_vec())),
        Message::Ping(data) => Some(WsMessage::Ping(data.to_vec())),
        Message::Pong(data) => Some(WsMessage::Pong(data.to_vec())),
        Message::Close(_) => Some(WsMessage::Close),
        Message::Frame(_) => None,
    }
}

#[async_trait::async_trait]
impl SyncTransport for TokioTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.socket
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn send_ping(&mut self) -> Result<(), TransportError> {
        self.socket
            .send(Message::Ping(Vec::new().into()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<WsMessage, TransportError>> {
        while let Some(frame) = self.socket.next().await {
            match frame {
                Ok(message) => {
                    if let Some(message) = incoming(message) {
                        return Some(Ok(message));
                    }
                }
                Err(e) => return Some(Err(TransportError::Other(e.to_string()))),
            }
        }
        None
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.socket
            .close(None)
            .await
            .map_err(|e| TransportError::Other(e.to_string()))
    }
}

/// Opens a fresh `TokioTransport` for every connection attempt.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioConnector;

#[async_trait::async_trait]
impl TransportConnector for TokioConnector {
    type Transport = TokioTransport;

    async fn connect(&self, url: &str) -> Result<Self::Transport, TransportError> {
        TokioTransport::connect(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_frame_carries_envelope() {
        let envelope = r#"{"messageId":"m1","method":"ack","payload":"m0"}"#;
        assert_eq!(
            incoming(Message::Text(envelope.into())),
            Some(WsMessage::Text(envelope.to_string()))
        );
    }

    #[test]
    fn test_control_frames_pass_through() {
        assert_eq!(
            incoming(Message::Pong(vec![1u8].into())),
            Some(WsMessage::Pong(vec![1]))
        );
        assert_eq!(incoming(Message::Close(None)), Some(WsMessage::Close));
    }

    #[test]
    fn test_binary_frame_is_surfaced() {
        assert_eq!(
            incoming(Message::Binary(vec![7u8, 8].into())),
            Some(WsMessage::Binary(vec![7, 8]))
        );
    }
}
