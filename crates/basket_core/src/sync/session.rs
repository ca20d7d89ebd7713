//! Message-driven basket session.
//!
//! `BasketSession` composes the [`StateManager`], the [`DeliveryChannel`] and
//! the [`ReliableMessenger`] without doing any I/O. The host feeds it one
//! [`IncomingEvent`] at a time and executes the returned [`SessionAction`]s.
//!
//! ```text
//!       host (tokio SyncClient, tests, …)
//!        │ IncomingEvent          ▲ SessionAction
//!        ▼                        │
//!   ┌─────────────────────────────┴──┐
//!   │          BasketSession         │
//!   │  StateManager  DeliveryChannel │
//!   │        ReliableMessenger       │
//!   └────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let mut session = BasketSession::new(SessionConfig::default(), observer, status);
//! for action in session.start() {
//!     match action {
//!         SessionAction::Connect => transport.connect(),
//!         SessionAction::SendText(text) => transport.send(text),
//!         // ...
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::channel::{ConnectionStatus, DeliveryChannel, StatusObserver};
use super::envelope::{Envelope, ITEM_UPDATE, Inbound};
use super::messenger::ReliableMessenger;
use super::timer::{TimerId, TimerIds};
use crate::item::BasketItem;
use crate::store::{BasketObserver, StateManager};
use crate::suggest::suggest;

/// Timing knobs for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Fixed delay before a reconnect attempt.
    pub reconnect_delay: Duration,
    /// How long an in-flight envelope may stay unacknowledged.
    pub ack_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(1),
            ack_timeout: Duration::from_secs(5),
        }
    }
}

/// Events fed into the session by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingEvent {
    /// Item typed into the input box.
    AddItem(String),
    /// Item unchecked by the user.
    MarkToBuy(String),
    /// Item checked off by the user.
    MarkBought(String),
    /// The host lost network reachability.
    NetworkOffline,
    /// The host regained network reachability.
    NetworkOnline,
    /// A `Connect` action completed.
    TransportOpened,
    /// The transport closed, errored, or failed to connect.
    TransportClosed,
    /// A text frame arrived.
    TextMessage(String),
    /// A scheduled timer elapsed.
    TimerFired(TimerId),
}

/// Actions returned by [`BasketSession::process`] for the host to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Open a new transport connection.
    Connect,
    /// Send a text frame on the open transport.
    SendText(String),
    /// Close the current transport.
    Close,
    /// Deliver `TimerFired(id)` after `after`.
    ScheduleTimer { id: TimerId, after: Duration },
    /// Drop a previously scheduled timer.
    CancelTimer(TimerId),
}

/// Client sync engine for one basket.
pub struct BasketSession {
    state: StateManager,
    channel: DeliveryChannel,
    messenger: ReliableMessenger,
    timers: TimerIds,
}

impl BasketSession {
    pub fn new(
        config: SessionConfig,
        observer: Arc<dyn BasketObserver>,
        status_observer: Arc<dyn StatusObserver>,
    ) -> Self {
        Self::with_state(config, StateManager::new(observer), status_observer)
    }

    /// Create a session over an existing state manager.
    pub fn with_state(
        config: SessionConfig,
        state: StateManager,
        status_observer: Arc<dyn StatusObserver>,
    ) -> Self {
        Self {
            state,
            channel: DeliveryChannel::new(config.reconnect_delay, status_observer),
            messenger: ReliableMessenger::new(config.ack_timeout),
            timers: TimerIds::new(),
        }
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn status(&self) -> ConnectionStatus {
        self.channel.status()
    }

    pub fn messenger(&self) -> &ReliableMessenger {
        &self.messenger
    }

    /// Best autocomplete match for `query`.
    pub fn suggest(&self, query: &str) -> Option<BasketItem> {
        suggest(query, self.state.store().iter()).cloned()
    }

    /// Kick off the first connection attempt.
    pub fn start(&mut self) -> Vec<SessionAction> {
        let mut out = Vec::new();
        self.channel.start(&mut out);
        out
    }

    /// Process one event and return the actions it produced.
    pub fn process(&mut self, event: IncomingEvent) -> Vec<SessionAction> {
        let mut out = Vec::new();
        match event {
            IncomingEvent::AddItem(name) => self.handle_add_item(&name, &mut out),
            IncomingEvent::MarkToBuy(name) => {
                let item = self.state.mark_to_buy(&name);
                self.send_item(&item, &mut out);
            }
            IncomingEvent::MarkBought(name) => {
                let item = self.state.mark_bought(&name);
                self.send_item(&item, &mut out);
            }
            IncomingEvent::NetworkOffline => self.channel.network_offline(&mut out),
            IncomingEvent::NetworkOnline => self.channel.network_online(&mut out),
            IncomingEvent::TransportOpened => {
                if self.channel.on_open(&mut out) {
                    self.messenger.flush(&mut self.timers, &mut out);
                }
            }
            IncomingEvent::TransportClosed => self.channel.on_closed(&mut self.timers, &mut out),
            IncomingEvent::TextMessage(text) => self.handle_text_message(&text, &mut out),
            IncomingEvent::TimerFired(id) => self.handle_timer(id, &mut out),
        }
        out
    }

    // =========================================================================
    // Event Handlers
    // =========================================================================

    fn handle_add_item(&mut self, name: &str, out: &mut Vec<SessionAction>) {
        let name = name.trim();
        if name.is_empty() {
            log::debug!("[BasketSession] Ignoring blank item name");
            return;
        }
        let (item, created) = self.state.add_item(name);
        if created {
            self.send_item(&item, out);
        }
    }

    fn handle_text_message(&mut self, text: &str, out: &mut Vec<SessionAction>) {
        let inbound = match Envelope::parse(text).and_then(Envelope::into_inbound) {
            Ok(inbound) => inbound,
            Err(e) => {
                log::warn!("[BasketSession] Dropping malformed message: {}", e);
                return;
            }
        };
        match inbound {
            Inbound::UnackedMessages(envelopes) => {
                log::debug!(
                    "[BasketSession] Replaying {} relayed message(s)",
                    envelopes.len()
                );
                for envelope in envelopes {
                    match envelope.into_inbound() {
                        Ok(Inbound::UnackedMessages(_)) => {
                            log::warn!("[BasketSession] Skipping nested recovery batch");
                        }
                        Ok(inner) => self.dispatch(inner, out),
                        Err(e) => log::warn!("[BasketSession] Dropping relayed message: {}", e),
                    }
                }
            }
            other => self.dispatch(other, out),
        }
    }

    fn dispatch(&mut self, inbound: Inbound, out: &mut Vec<SessionAction>) {
        match inbound {
            Inbound::ItemUpdate(items) => {
                for item in items {
                    self.state.merge_from_network(item);
                }
            }
            Inbound::Ack(message_id) => self.messenger.on_ack(&message_id, out),
            Inbound::Unknown(method) => {
                log::warn!("[BasketSession] Unknown method '{}', dropping", method);
            }
            Inbound::UnackedMessages(_) => {
                log::warn!("[BasketSession] Skipping nested recovery batch");
            }
        }
    }

    fn handle_timer(&mut self, id: TimerId, out: &mut Vec<SessionAction>) {
        if self.channel.on_timer(id, out) {
            return;
        }
        if let Some(message_id) = self.messenger.on_timer(id) {
            log::warn!(
                "[BasketSession] No ack for {} within deadline, forcing reconnect",
                message_id
            );
            self.channel.force_close(&mut self.timers, out);
            return;
        }
        log::trace!("[BasketSession] Ignoring stale {}", id);
    }

    fn send_item(&mut self, item: &BasketItem, out: &mut Vec<SessionAction>) {
        let payload = match serde_json::to_value([item]) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("[BasketSession] Failed to encode '{}': {}", item.name, e);
                return;
            }
        };
        self.send(ITEM_UPDATE, payload, out);
    }

    fn send(&mut self, method: &str, payload: Value, out: &mut Vec<SessionAction>) {
        self.messenger.send(
            method,
            payload,
            self.channel.is_open(),
            &mut self.timers,
            out,
        );
    }
}
