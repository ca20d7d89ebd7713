//! Sync client for native platforms.
//!
//! `SyncClient` hosts a [`BasketSession`] on tokio. It owns the transport and
//! the timer table, executes the session's actions, and turns transport
//! frames, timer expiry and collaborator commands into session events. The
//! collaborator talks to it through a cloneable [`BasketHandle`].
//!
//! # Usage
//!
//! ```ignore
//! use basket_core::sync::{BasketSession, SyncClient, SyncClientConfig, TokioConnector};
//!
//! let session = BasketSession::new(SessionConfig::default(), observer, status);
//! let (client, handle) = SyncClient::new(config, session, TokioConnector)?;
//! tokio::spawn(client.run());
//!
//! handle.add_item("Milk")?;
//! let best = handle.suggest("mi").await?;
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use url::Url;

use super::channel::ConnectionStatus;
use super::session::{BasketSession, IncomingEvent, SessionAction};
use super::timer::TimerId;
use super::transport::{SyncTransport, TransportConnector, TransportError, WsMessage};
use crate::item::BasketItem;

const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Where to connect.
#[derive(Debug, Clone)]
pub struct SyncClientConfig {
    /// Base server URL (e.g., "http://localhost:8080").
    pub server_url: String,
    /// Shared basket identifier.
    pub basket_id: String,
}

impl SyncClientConfig {
    pub fn new(server_url: impl Into<String>, basket_id: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            basket_id: basket_id.into(),
        }
    }

    /// Build the WebSocket URL: `<server>/ws?basket=<id>` with `http(s)`
    /// mapped to `ws(s)`.
    pub fn build_ws_url(&self) -> Result<String, TransportError> {
        let invalid = |reason: String| {
            TransportError::InvalidUrl(format!("{}: {}", self.server_url, reason))
        };

        let mut url = Url::parse(&self.server_url).map_err(|e| invalid(e.to_string()))?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(invalid(format!("unsupported scheme '{}'", other))),
        };
        url.set_scheme(scheme)
            .map_err(|_| invalid(format!("cannot use scheme '{}'", scheme)))?;
        url.path_segments_mut()
            .map_err(|_| invalid("URL cannot have a path".to_string()))?
            .pop_if_empty()
            .push("ws");
        url.query_pairs_mut().append_pair("basket", &self.basket_id);
        Ok(url.into())
    }
}

/// Requests from the collaborator to the running client.
#[derive(Debug)]
pub enum BasketCommand {
    AddItem(String),
    MarkToBuy(String),
    MarkBought(String),
    NetworkOffline,
    NetworkOnline,
    Suggest {
        query: String,
        reply: oneshot::Sender<Option<BasketItem>>,
    },
    /// All items, most recently modified first.
    Items {
        reply: oneshot::Sender<Vec<BasketItem>>,
    },
    Status {
        reply: oneshot::Sender<ConnectionStatus>,
    },
    Shutdown,
}

/// Cloneable handle for talking to a running [`SyncClient`].
///
/// Every method fails with [`TransportError::Closed`] once the client has
/// stopped.
#[derive(Debug, Clone)]
pub struct BasketHandle {
    tx: mpsc::UnboundedSender<BasketCommand>,
}

impl BasketHandle {
    fn send(&self, command: BasketCommand) -> Result<(), TransportError> {
        self.tx.send(command).map_err(|_| TransportError::Closed)
    }

    async fn ask<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> BasketCommand,
    ) -> Result<T, TransportError> {
        let (reply, rx) = oneshot::channel();
        self.send(command(reply))?;
        rx.await.map_err(|_| TransportError::Closed)
    }

    pub fn add_item(&self, name: impl Into<String>) -> Result<(), TransportError> {
        self.send(BasketCommand::AddItem(name.into()))
    }

    pub fn mark_to_buy(&self, name: impl Into<String>) -> Result<(), TransportError> {
        self.send(BasketCommand::MarkToBuy(name.into()))
    }

    pub fn mark_bought(&self, name: impl Into<String>) -> Result<(), TransportError> {
        self.send(BasketCommand::MarkBought(name.into()))
    }

    pub fn network_offline(&self) -> Result<(), TransportError> {
        self.send(BasketCommand::NetworkOffline)
    }

    pub fn network_online(&self) -> Result<(), TransportError> {
        self.send(BasketCommand::NetworkOnline)
    }

    pub async fn suggest(
        &self,
        query: impl Into<String>,
    ) -> Result<Option<BasketItem>, TransportError> {
        let query = query.into();
        self.ask(|reply| BasketCommand::Suggest { query, reply }).await
    }

    pub async fn items(&self) -> Result<Vec<BasketItem>, TransportError> {
        self.ask(|reply| BasketCommand::Items { reply }).await
    }

    pub async fn status(&self) -> Result<ConnectionStatus, TransportError> {
        self.ask(|reply| BasketCommand::Status { reply }).await
    }

    /// Ask the client to close the connection and stop.
    pub fn shutdown(&self) -> Result<(), TransportError> {
        self.send(BasketCommand::Shutdown)
    }
}

type ConnectFuture<T> = BoxFuture<'static, Result<T, TransportError>>;

/// What woke the driver loop.
enum Wake<T> {
    Connected(Result<T, TransportError>),
    Frame(Option<Result<WsMessage, TransportError>>),
    Command(Option<BasketCommand>),
    Timer,
    Ping,
}

/// Tokio host for one [`BasketSession`].
pub struct SyncClient<C: TransportConnector> {
    ws_url: String,
    session: BasketSession,
    connector: Arc<C>,
    commands: mpsc::UnboundedReceiver<BasketCommand>,
    transport: Option<C::Transport>,
    connecting: Option<ConnectFuture<C::Transport>>,
    timers: HashMap<TimerId, Instant>,
}

impl<C: TransportConnector + 'static> SyncClient<C> {
    /// Create a client and the handle used to drive it.
    pub fn new(
        config: SyncClientConfig,
        session: BasketSession,
        connector: C,
    ) -> Result<(Self, BasketHandle), TransportError> {
        let ws_url = config.build_ws_url()?;
        let (tx, commands) = mpsc::unbounded_channel();
        let client = Self {
            ws_url,
            session,
            connector: Arc::new(connector),
            commands,
            transport: None,
            connecting: None,
            timers: HashMap::new(),
        };
        Ok((client, BasketHandle { tx }))
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Run until [`BasketHandle::shutdown`] is called or every handle is
    /// dropped. Returns the session so callers can inspect the final state.
    pub async fn run(mut self) -> BasketSession {
        log::info!("[SyncClient] Starting sync for {}", self.ws_url);
        let mut queue: VecDeque<SessionAction> = self.session.start().into();

        let mut ping = tokio::time::interval(PING_INTERVAL);
        ping.tick().await; // Consume first immediate tick

        loop {
            while let Some(action) = queue.pop_front() {
                if let Some(event) = self.execute(action).await {
                    queue.extend(self.session.process(event));
                }
            }

            let next_timer = self.next_timer();
            let wake = tokio::select! {
                result = finish_connect(&mut self.connecting) => Wake::Connected(result),
                frame = recv_frame(&mut self.transport) => Wake::Frame(frame),
                command = self.commands.recv() => Wake::Command(command),
                _ = sleep_until(next_timer) => Wake::Timer,
                _ = ping.tick(), if self.transport.is_some() => Wake::Ping,
            };

            let event = match wake {
                Wake::Connected(result) => {
                    self.connecting = None;
                    Some(self.on_connected(result))
                }
                Wake::Frame(frame) => self.on_frame(frame),
                Wake::Command(None) | Wake::Command(Some(BasketCommand::Shutdown)) => break,
                Wake::Command(Some(command)) => self.on_command(command),
                Wake::Timer => self.pop_due_timer().map(IncomingEvent::TimerFired),
                Wake::Ping => self.ping().await,
            };
            if let Some(event) = event {
                queue.extend(self.session.process(event));
            }
        }

        self.close_transport().await;
        log::info!("[SyncClient] Sync loop exited");
        self.session
    }

    /// Execute one session action; returns a follow-up event when the action
    /// itself failed.
    async fn execute(&mut self, action: SessionAction) -> Option<IncomingEvent> {
        match action {
            SessionAction::Connect => {
                self.close_transport().await;
                log::info!("[SyncClient] Connecting to {}", self.ws_url);
                let connector = Arc::clone(&self.connector);
                let url = self.ws_url.clone();
                self.connecting = Some(Box::pin(async move { connector.connect(&url).await }));
                None
            }
            SessionAction::SendText(text) => {
                let Some(transport) = self.transport.as_mut() else {
                    log::warn!("[SyncClient] No transport, dropping outbound frame");
                    return None;
                };
                if let Err(e) = transport.send_text(text).await {
                    log::error!("[SyncClient] {}", e);
                    self.transport = None;
                    return Some(IncomingEvent::TransportClosed);
                }
                None
            }
            SessionAction::Close => {
                self.close_transport().await;
                None
            }
            SessionAction::ScheduleTimer { id, after } => {
                self.timers.insert(id, Instant::now() + after);
                None
            }
            SessionAction::CancelTimer(id) => {
                self.timers.remove(&id);
                None
            }
        }
    }

    fn on_connected(&mut self, result: Result<C::Transport, TransportError>) -> IncomingEvent {
        match result {
            Ok(transport) => {
                log::info!("[SyncClient] Connected to {}", self.ws_url);
                self.transport = Some(transport);
                IncomingEvent::TransportOpened
            }
            Err(e) => {
                log::error!("[SyncClient] {}", e);
                IncomingEvent::TransportClosed
            }
        }
    }

    fn on_frame(
        &mut self,
        frame: Option<Result<WsMessage, TransportError>>,
    ) -> Option<IncomingEvent> {
        match frame {
            Some(Ok(WsMessage::Text(text))) => Some(IncomingEvent::TextMessage(text)),
            Some(Ok(WsMessage::Binary(data))) => {
                log::debug!("[SyncClient] Ignoring {} byte binary frame", data.len());
                None
            }
            Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => None, // keepalive
            Some(Ok(WsMessage::Close)) | None => {
                log::info!("[SyncClient] Connection closed by server");
                self.transport = None;
                Some(IncomingEvent::TransportClosed)
            }
            Some(Err(e)) => {
                log::error!("[SyncClient] WebSocket error: {}", e);
                self.transport = None;
                Some(IncomingEvent::TransportClosed)
            }
        }
    }

    fn on_command(&mut self, command: BasketCommand) -> Option<IncomingEvent> {
        match command {
            BasketCommand::AddItem(name) => Some(IncomingEvent::AddItem(name)),
            BasketCommand::MarkToBuy(name) => Some(IncomingEvent::MarkToBuy(name)),
            BasketCommand::MarkBought(name) => Some(IncomingEvent::MarkBought(name)),
            BasketCommand::NetworkOffline => Some(IncomingEvent::NetworkOffline),
            BasketCommand::NetworkOnline => Some(IncomingEvent::NetworkOnline),
            BasketCommand::Suggest { query, reply } => {
                let _ = reply.send(self.session.suggest(&query));
                None
            }
            BasketCommand::Items { reply } => {
                let _ = reply.send(self.session.state().recent());
                None
            }
            BasketCommand::Status { reply } => {
                let _ = reply.send(self.session.status());
                None
            }
            BasketCommand::Shutdown => None,
        }
    }

    async fn ping(&mut self) -> Option<IncomingEvent> {
        let transport = self.transport.as_mut()?;
        if let Err(e) = transport.send_ping().await {
            log::error!("[SyncClient] Ping failed: {}", e);
            self.transport = None;
            return Some(IncomingEvent::TransportClosed);
        }
        None
    }

    async fn close_transport(&mut self) {
        if self.connecting.take().is_some() {
            log::debug!("[SyncClient] Abandoned pending connection attempt");
        }
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                log::debug!("[SyncClient] Error closing transport: {}", e);
            }
        }
    }

    fn next_timer(&self) -> Option<Instant> {
        self.timers.values().min().copied()
    }

    fn pop_due_timer(&mut self) -> Option<TimerId> {
        let now = Instant::now();
        let (id, _) = self
            .timers
            .iter()
            .filter(|(_, at)| **at <= now)
            .min_by_key(|(id, at)| (**at, **id))?;
        let id = *id;
        self.timers.remove(&id);
        Some(id)
    }
}

async fn finish_connect<T>(
    connecting: &mut Option<ConnectFuture<T>>,
) -> Result<T, TransportError> {
    match connecting {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

async fn recv_frame<T: SyncTransport>(
    transport: &mut Option<T>,
) -> Option<Result<WsMessage, TransportError>> {
    match transport {
        Some(transport) => transport.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
