//! End-to-end tests: `SyncClient` against an in-process WebSocket peer.
//!
//! The peer mimics the basket server contract: it acks what it handles and
//! answers a recovery batch with a full `itemUpdate`.

use std::sync::Arc;
use std::time::Duration;

use basket_core::sync::{
    BasketHandle, BasketSession, ConnectionStatus, Envelope, ITEM_UPDATE, NoopStatusObserver,
    SessionConfig, SyncClient, SyncClientConfig, TokioConnector, UNACKED_MESSAGES,
};
use basket_core::{BasketItem, NoopObserver};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

type Peer = WebSocketStream<TcpStream>;

async fn start_client(
    listener: &TcpListener,
    config: SessionConfig,
) -> (JoinHandle<BasketSession>, BasketHandle) {
    let addr = listener.local_addr().unwrap();
    let session = BasketSession::new(config, Arc::new(NoopObserver), Arc::new(NoopStatusObserver));
    let (client, handle) = SyncClient::new(
        SyncClientConfig::new(format!("http://{addr}"), "family"),
        session,
        TokioConnector,
    )
    .unwrap();
    assert_eq!(client.ws_url(), format!("ws://{addr}/ws?basket=family"));
    (tokio::spawn(client.run()), handle)
}

async fn accept(listener: &TcpListener) -> Peer {
    let (stream, _) = tokio::time::timeout(WAIT, listener.accept())
        .await
        .expect("client did not connect")
        .unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

async fn next_envelope(peer: &mut Peer) -> Envelope {
    loop {
        let message = tokio::time::timeout(WAIT, peer.next())
            .await
            .expect("no message from client");
        match message {
            Some(Ok(Message::Text(text))) => return Envelope::parse(text.as_str()).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("Expected a text frame, got {other:?}"),
        }
    }
}

async fn send(peer: &mut Peer, envelope: &Envelope) {
    peer.send(Message::Text(envelope.to_text().unwrap().into()))
        .await
        .unwrap();
}

async fn ack(peer: &mut Peer, envelope: &Envelope) {
    send(peer, &Envelope::ack(envelope.message_id.clone())).await;
}

fn item_update(items: &[BasketItem]) -> Envelope {
    Envelope::new(ITEM_UPDATE, Some(serde_json::to_value(items).unwrap()))
}

fn items_of(envelope: &Envelope) -> Vec<BasketItem> {
    assert_eq!(envelope.method, ITEM_UPDATE);
    serde_json::from_value(envelope.payload.clone().unwrap()).unwrap()
}

fn members_of(envelope: &Envelope) -> Vec<Envelope> {
    assert_eq!(envelope.method, UNACKED_MESSAGES);
    serde_json::from_value(envelope.payload.clone().unwrap()).unwrap()
}

/// Push a marker item and wait until the client has merged it. Frames on one
/// connection are handled in order, so everything sent before is processed.
async fn sync_point(peer: &mut Peer, handle: &BasketHandle, marker: &str) {
    send(peer, &item_update(&[BasketItem::new(marker, Utc::now())])).await;
    tokio::time::timeout(WAIT, async {
        loop {
            let items = handle.items().await.unwrap();
            if items.iter().any(|item| item.name == marker) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("marker never merged");
}

#[tokio::test]
async fn test_add_item_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (task, handle) = start_client(&listener, SessionConfig::default()).await;
    let mut peer = accept(&listener).await;

    // Connecting always starts with a (here empty) recovery batch.
    let batch = next_envelope(&mut peer).await;
    assert!(members_of(&batch).is_empty());
    ack(&mut peer, &batch).await;
    let bread = BasketItem::new("Bread", Utc::now());
    send(&mut peer, &item_update(std::slice::from_ref(&bread))).await;

    handle.add_item("Milk").unwrap();
    let update = next_envelope(&mut peer).await;
    let items = items_of(&update);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Milk");
    ack(&mut peer, &update).await;

    sync_point(&mut peer, &handle, "marker").await;
    assert_eq!(handle.status().await.unwrap(), ConnectionStatus::Open);
    let names: Vec<_> = handle
        .items()
        .await
        .unwrap()
        .into_iter()
        .map(|item| item.name)
        .collect();
    assert!(names.contains(&"Bread".to_string()));
    assert!(names.contains(&"Milk".to_string()));
    assert_eq!(handle.suggest("mi").await.unwrap().unwrap().name, "Milk");

    handle.shutdown().unwrap();
    let session = task.await.unwrap();
    assert_eq!(session.messenger().pending_len(), 0);
    assert_eq!(session.state().get("Bread"), Some(&bread));
}

#[tokio::test]
async fn test_unacked_item_is_replayed_after_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = SessionConfig {
        reconnect_delay: Duration::from_millis(50),
        ..SessionConfig::default()
    };
    let (task, handle) = start_client(&listener, config).await;

    let mut first = accept(&listener).await;
    next_envelope(&mut first).await;
    handle.add_item("Eggs").unwrap();
    let lost = next_envelope(&mut first).await;
    drop(first);

    let mut second = accept(&listener).await;
    let batch = next_envelope(&mut second).await;
    let members = members_of(&batch);
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].message_id, lost.message_id);
    assert_eq!(items_of(&members[0])[0].name, "Eggs");
    ack(&mut second, &batch).await;

    sync_point(&mut second, &handle, "marker").await;
    handle.shutdown().unwrap();
    let session = task.await.unwrap();
    assert_eq!(session.messenger().pending_len(), 0);
}

#[tokio::test]
async fn test_missing_ack_forces_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = SessionConfig {
        reconnect_delay: Duration::from_millis(50),
        ack_timeout: Duration::from_millis(200),
    };
    let (task, handle) = start_client(&listener, config).await;

    // Never ack anything on the first connection.
    let mut first = accept(&listener).await;
    let unanswered = next_envelope(&mut first).await;
    assert_eq!(unanswered.method, UNACKED_MESSAGES);

    let mut second = accept(&listener).await;
    let batch = next_envelope(&mut second).await;
    assert_eq!(batch.method, UNACKED_MESSAGES);
    assert_ne!(batch.message_id, unanswered.message_id);
    ack(&mut second, &batch).await;

    sync_point(&mut second, &handle, "marker").await;
    assert_eq!(handle.status().await.unwrap(), ConnectionStatus::Open);
    handle.shutdown().unwrap();
    task.await.unwrap();
    drop(first);
}

#[tokio::test]
async fn test_offline_queues_until_online() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (task, handle) = start_client(&listener, SessionConfig::default()).await;
    let mut first = accept(&listener).await;
    let batch = next_envelope(&mut first).await;
    ack(&mut first, &batch).await;
    sync_point(&mut first, &handle, "marker").await;

    handle.network_offline().unwrap();
    handle.add_item("Tea").unwrap();
    assert_eq!(handle.status().await.unwrap(), ConnectionStatus::Offline);

    handle.network_online().unwrap();
    let mut second = accept(&listener).await;
    let batch = next_envelope(&mut second).await;
    let members = members_of(&batch);
    assert_eq!(members.len(), 1);
    assert_eq!(items_of(&members[0])[0].name, "Tea");

    handle.shutdown().unwrap();
    task.await.unwrap();
}
