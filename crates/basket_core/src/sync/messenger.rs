//! Reliable messenger: at-least-once delivery with explicit acks.
//!
//! Every outbound state change gets a fresh message id and stays in the
//! pending set until the peer acks it. While the channel is open each
//! in-flight envelope has an ack deadline; a missed deadline tells the
//! session the connection is broken.
//!
//! After a reconnect all pending envelopes are resent, in enqueue order, as a
//! single `unackedMessages` batch. The batch replaces its members in the
//! pending set and is acked as a unit, though a late ack for an individual
//! member still removes just that member.

use std::time::Duration;

use indexmap::IndexMap;
use serde_json::Value;

use super::envelope::{Envelope, UNACKED_MESSAGES};
use super::session::SessionAction;
use super::timer::{TimerId, TimerIds};

/// An outbound envelope awaiting acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEnvelope {
    pub envelope: Envelope,
    /// Ack timer, armed only while the envelope is in flight.
    pub deadline: Option<TimerId>,
    /// For a recovery batch: the original envelopes it carries.
    members: Vec<Envelope>,
}

impl PendingEnvelope {
    fn is_batch(&self) -> bool {
        self.envelope.method == UNACKED_MESSAGES
    }

    /// The original envelopes this entry stands for, in order.
    fn into_originals(self) -> Vec<Envelope> {
        if self.is_batch() {
            self.members
        } else {
            vec![self.envelope]
        }
    }
}

/// Tracks unacknowledged envelopes and their deadlines.
pub struct ReliableMessenger {
    pending: IndexMap<String, PendingEnvelope>,
    ack_timeout: Duration,
}

impl ReliableMessenger {
    pub fn new(ack_timeout: Duration) -> Self {
        Self {
            pending: IndexMap::new(),
            ack_timeout,
        }
    }

    /// Number of pending entries (a batch counts once).
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, message_id: &str) -> bool {
        self.pending.contains_key(message_id)
    }

    /// Message ids of pending entries in enqueue order.
    pub fn pending_ids(&self) -> Vec<String> {
        self.pending.keys().cloned().collect()
    }

    pub fn pending(&self, message_id: &str) -> Option<&PendingEnvelope> {
        self.pending.get(message_id)
    }

    /// Enqueue a new envelope and transmit it right away when `open`.
    ///
    /// Sending while the channel is down is not an error; the envelope waits
    /// for the next flush.
    pub fn send(
        &mut self,
        method: &str,
        payload: Value,
        open: bool,
        timers: &mut TimerIds,
        out: &mut Vec<SessionAction>,
    ) -> String {
        let envelope = Envelope::new(method, Some(payload));
        let message_id = envelope.message_id.clone();
        let mut entry = PendingEnvelope {
            envelope,
            deadline: None,
            members: Vec::new(),
        };
        if open {
            self.transmit(&mut entry, timers, out);
        } else {
            log::debug!(
                "[ReliableMessenger] Channel not open, queued {} ({})",
                message_id,
                method
            );
        }
        self.pending.insert(message_id.clone(), entry);
        message_id
    }

    /// Handle an `ack`. Unknown ids are ignored.
    pub fn on_ack(&mut self, message_id: &str, out: &mut Vec<SessionAction>) {
        if let Some(entry) = self.pending.shift_remove(message_id) {
            log::debug!("[ReliableMessenger] Acked {}", message_id);
            if let Some(deadline) = entry.deadline {
                out.push(SessionAction::CancelTimer(deadline));
            }
            return;
        }

        let Some((batch_id, batch)) = self.pending.iter_mut().find(|(_, entry)| {
            entry
                .members
                .iter()
                .any(|member| member.message_id == message_id)
        }) else {
            log::trace!("[ReliableMessenger] Ignoring ack for {}", message_id);
            return;
        };
        batch.members.retain(|member| member.message_id != message_id);
        if !batch.members.is_empty() {
            return;
        }

        let batch_id = batch_id.clone();
        if let Some(batch) = self.pending.shift_remove(&batch_id) {
            log::debug!("[ReliableMessenger] Batch {} fully acked", batch_id);
            if let Some(deadline) = batch.deadline {
                out.push(SessionAction::CancelTimer(deadline));
            }
        }
    }

    /// Handle a fired timer. Returns the overdue message id when the timer
    /// was one of our ack deadlines.
    pub fn on_timer(&mut self, id: TimerId) -> Option<String> {
        let (message_id, entry) = self
            .pending
            .iter_mut()
            .find(|(_, entry)| entry.deadline == Some(id))?;
        entry.deadline = None;
        Some(message_id.clone())
    }

    /// Resend everything pending as one recovery batch.
    ///
    /// Called when the channel (re)opens. All deadlines are cancelled first so
    /// no stale timeout can fire against the retransmitted copy. The batch is
    /// sent even when empty; the peer answers it with a full snapshot.
    pub fn flush(&mut self, timers: &mut TimerIds, out: &mut Vec<SessionAction>) {
        let mut originals = Vec::new();
        for (_, entry) in self.pending.drain(..) {
            if let Some(deadline) = entry.deadline {
                out.push(SessionAction::CancelTimer(deadline));
            }
            originals.extend(entry.into_originals());
        }

        let payload = match serde_json::to_value(&originals) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("[ReliableMessenger] Failed to encode recovery batch: {}", e);
                return;
            }
        };
        let mut batch = PendingEnvelope {
            envelope: Envelope::new(UNACKED_MESSAGES, Some(payload)),
            deadline: None,
            members: originals,
        };
        log::info!(
            "[ReliableMessenger] Resending {} unacked message(s) as {}",
            batch.members.len(),
            batch.envelope.message_id
        );
        self.transmit(&mut batch, timers, out);
        self.pending
            .insert(batch.envelope.message_id.clone(), batch);
    }

    fn transmit(
        &self,
        entry: &mut PendingEnvelope,
        timers: &mut TimerIds,
        out: &mut Vec<SessionAction>,
    ) {
        let text = match entry.envelope.to_text() {
            Ok(text) => text,
            Err(e) => {
                log::error!(
                    "[ReliableMessenger] Failed to encode {}: {}",
                    entry.envelope.message_id,
                    e
                );
                return;
            }
        };
        out.push(SessionAction::SendText(text));
        let id = timers.next_id();
        entry.deadline = Some(id);
        out.push(SessionAction::ScheduleTimer {
            id,
            after: self.ack_timeout,
        });
    }
}
