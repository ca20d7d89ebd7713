//! Delivery channel: the connection state machine.
//!
//! ```text
//!              open                      backoff timer
//! Connecting ───────▶ Open   Reconnecting ─────────────▶ Connecting
//!      │               │          ▲
//!      └── close/error ┴──────────┘
//!
//! any ── network offline ──▶ Offline ── network online ──▶ Reconnecting ─▶ Connecting
//! ```
//!
//! The channel never touches a socket. It emits [`SessionAction`]s
//! (`Connect`, `Close`, timer scheduling) for the host to execute, and
//! reports every status change to a [`StatusObserver`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::session::SessionAction;
use super::timer::{TimerId, TimerIds};

/// Connectivity as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionStatus {
    /// A connection attempt is in progress.
    Connecting,
    /// Connected; envelopes are transmitted immediately.
    Open,
    /// Lost the connection; a retry is scheduled.
    Reconnecting,
    /// The host reported no network; retries are suspended.
    Offline,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Open => "online",
            ConnectionStatus::Reconnecting => "reconnecting",
            ConnectionStatus::Offline => "offline",
        };
        f.write_str(label)
    }
}

/// Receives connection status transitions.
pub trait StatusObserver: Send + Sync {
    fn status_changed(&self, status: ConnectionStatus);
}

/// Status observer that ignores every transition.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStatusObserver;

impl StatusObserver for NoopStatusObserver {
    fn status_changed(&self, _status: ConnectionStatus) {}
}

/// Connection state machine with fixed-interval reconnect.
pub struct DeliveryChannel {
    status: ConnectionStatus,
    reconnect_delay: Duration,
    reconnect_timer: Option<TimerId>,
    attempt: u32,
    observer: Arc<dyn StatusObserver>,
}

impl DeliveryChannel {
    pub fn new(reconnect_delay: Duration, observer: Arc<dyn StatusObserver>) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            reconnect_delay,
            reconnect_timer: None,
            attempt: 0,
            observer,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == ConnectionStatus::Open
    }

    /// First connection attempt.
    pub fn start(&mut self, out: &mut Vec<SessionAction>) {
        self.set_status(ConnectionStatus::Connecting);
        out.push(SessionAction::Connect);
    }

    /// The transport finished opening. Returns `true` when the channel is
    /// now `Open` and pending envelopes should be flushed.
    pub fn on_open(&mut self, out: &mut Vec<SessionAction>) -> bool {
        if self.status != ConnectionStatus::Connecting {
            log::warn!(
                "[DeliveryChannel] Transport opened while {}, closing it",
                self.status
            );
            out.push(SessionAction::Close);
            return false;
        }
        self.attempt = 0;
        self.set_status(ConnectionStatus::Open);
        true
    }

    /// The transport closed or failed.
    pub fn on_closed(&mut self, timers: &mut TimerIds, out: &mut Vec<SessionAction>) {
        match self.status {
            ConnectionStatus::Open | ConnectionStatus::Connecting => {
                self.schedule_reconnect(timers, out);
            }
            ConnectionStatus::Reconnecting | ConnectionStatus::Offline => {
                log::debug!("[DeliveryChannel] Ignoring close while {}", self.status);
            }
        }
    }

    /// Close an open transport that is no longer trusted (overdue ack).
    pub fn force_close(&mut self, timers: &mut TimerIds, out: &mut Vec<SessionAction>) {
        if !self.is_open() {
            log::debug!("[DeliveryChannel] Not open ({}), nothing to force", self.status);
            return;
        }
        out.push(SessionAction::Close);
        self.schedule_reconnect(timers, out);
    }

    /// Handle a fired timer. Returns `false` when the timer is not ours.
    pub fn on_timer(&mut self, id: TimerId, out: &mut Vec<SessionAction>) -> bool {
        if self.reconnect_timer != Some(id) {
            return false;
        }
        self.reconnect_timer = None;
        if self.status == ConnectionStatus::Reconnecting {
            self.attempt += 1;
            log::info!("[DeliveryChannel] Reconnecting (attempt {})", self.attempt);
            self.set_status(ConnectionStatus::Connecting);
            out.push(SessionAction::Connect);
        }
        true
    }

    /// The host lost network reachability.
    pub fn network_offline(&mut self, out: &mut Vec<SessionAction>) {
        if self.status == ConnectionStatus::Offline {
            return;
        }
        if let Some(id) = self.reconnect_timer.take() {
            out.push(SessionAction::CancelTimer(id));
        }
        if matches!(
            self.status,
            ConnectionStatus::Open | ConnectionStatus::Connecting
        ) {
            out.push(SessionAction::Close);
        }
        self.set_status(ConnectionStatus::Offline);
    }

    /// The host regained network reachability.
    pub fn network_online(&mut self, out: &mut Vec<SessionAction>) {
        if self.status != ConnectionStatus::Offline {
            return;
        }
        self.set_status(ConnectionStatus::Reconnecting);
        self.set_status(ConnectionStatus::Connecting);
        out.push(SessionAction::Connect);
    }

    fn schedule_reconnect(&mut self, timers: &mut TimerIds, out: &mut Vec<SessionAction>) {
        if let Some(stale) = self.reconnect_timer.take() {
            out.push(SessionAction::CancelTimer(stale));
        }
        let id = timers.next_id();
        self.reconnect_timer = Some(id);
        out.push(SessionAction::ScheduleTimer {
            id,
            after: self.reconnect_delay,
        });
        log::info!(
            "[DeliveryChannel] Connection lost, retrying in {:?}",
            self.reconnect_delay
        );
        self.set_status(ConnectionStatus::Reconnecting);
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
        self.observer.status_changed(status);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ConnectionStatus>>);

    impl StatusObserver for Recorder {
        fn status_changed(&self, status: ConnectionStatus) {
            self.0.lock().unwrap().push(status);
        }
    }

    impl Recorder {
        fn take(&self) -> Vec<ConnectionStatus> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    fn channel() -> (DeliveryChannel, Arc<Recorder>, TimerIds) {
        let recorder = Arc::new(Recorder::default());
        let channel = DeliveryChannel::new(Duration::from_secs(1), recorder.clone());
        (channel, recorder, TimerIds::new())
    }

    fn scheduled(actions: &[SessionAction]) -> Option<TimerId> {
        actions.iter().find_map(|action| match action {
            SessionAction::ScheduleTimer { id, after } => {
                assert_eq!(*after, Duration::from_secs(1));
                Some(*id)
            }
            _ => None,
        })
    }

    #[test]
    fn test_initial_state_is_connecting() {
        let (channel, _, _) = channel();
        assert_eq!(channel.status(), ConnectionStatus::Connecting);
    }

    #[test]
    fn test_open_then_close_schedules_reconnect() {
        let (mut channel, recorder, mut timers) = channel();
        let mut out = Vec::new();
        channel.start(&mut out);
        assert_eq!(out, vec![SessionAction::Connect]);

        out.clear();
        assert!(channel.on_open(&mut out));
        assert!(out.is_empty());

        channel.on_closed(&mut timers, &mut out);
        let timer = scheduled(&out).expect("reconnect scheduled");
        assert_eq!(channel.status(), ConnectionStatus::Reconnecting);

        out.clear();
        assert!(channel.on_timer(timer, &mut out));
        assert_eq!(out, vec![SessionAction::Connect]);
        assert_eq!(
            recorder.take(),
            vec![
                ConnectionStatus::Connecting,
                ConnectionStatus::Open,
                ConnectionStatus::Reconnecting,
                ConnectionStatus::Connecting,
            ]
        );
    }

    #[test]
    fn test_failed_connect_schedules_reconnect() {
        let (mut channel, _, mut timers) = channel();
        let mut out = Vec::new();
        channel.on_closed(&mut timers, &mut out);
        assert!(scheduled(&out).is_some());
        assert_eq!(channel.status(), ConnectionStatus::Reconnecting);
    }

    #[test]
    fn test_duplicate_close_is_ignored() {
        let (mut channel, _, mut timers) = channel();
        let mut out = Vec::new();
        channel.on_open(&mut out);
        channel.on_closed(&mut timers, &mut out);
        out.clear();
        channel.on_closed(&mut timers, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_force_close_only_when_open() {
        let (mut channel, _, mut timers) = channel();
        let mut out = Vec::new();
        channel.force_close(&mut timers, &mut out);
        assert!(out.is_empty());

        channel.on_open(&mut out);
        channel.force_close(&mut timers, &mut out);
        assert_eq!(out[0], SessionAction::Close);
        assert!(scheduled(&out).is_some());
        assert_eq!(channel.status(), ConnectionStatus::Reconnecting);
    }

    #[test]
    fn test_offline_suspends_reconnect() {
        let (mut channel, _, mut timers) = channel();
        let mut out = Vec::new();
        channel.on_open(&mut out);
        channel.on_closed(&mut timers, &mut out);
        let timer = scheduled(&out).unwrap();

        out.clear();
        channel.network_offline(&mut out);
        assert_eq!(out, vec![SessionAction::CancelTimer(timer)]);
        assert_eq!(channel.status(), ConnectionStatus::Offline);

        // A late delivery of the cancelled timer no longer belongs to the channel.
        out.clear();
        assert!(!channel.on_timer(timer, &mut out));
        assert!(out.is_empty());
        assert_eq!(channel.status(), ConnectionStatus::Offline);
    }

    #[test]
    fn test_offline_closes_open_transport() {
        let (mut channel, _, _) = channel();
        let mut out = Vec::new();
        channel.on_open(&mut out);
        channel.network_offline(&mut out);
        assert_eq!(out, vec![SessionAction::Close]);
    }

    #[test]
    fn test_online_reconnects_immediately() {
        let (mut channel, recorder, _) = channel();
        let mut out = Vec::new();
        channel.network_offline(&mut out);
        recorder.take();

        out.clear();
        channel.network_online(&mut out);
        assert_eq!(out, vec![SessionAction::Connect]);
        assert_eq!(
            recorder.take(),
            vec![ConnectionStatus::Reconnecting, ConnectionStatus::Connecting]
        );
    }

    #[test]
    fn test_online_while_connected_is_ignored() {
        let (mut channel, recorder, _) = channel();
        let mut out = Vec::new();
        channel.on_open(&mut out);
        recorder.take();
        channel.network_online(&mut out);
        assert!(out.is_empty());
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn test_late_open_while_offline_is_closed() {
        let (mut channel, _, _) = channel();
        let mut out = Vec::new();
        channel.network_offline(&mut out);
        out.clear();
        assert!(!channel.on_open(&mut out));
        assert_eq!(out, vec![SessionAction::Close]);
        assert_eq!(channel.status(), ConnectionStatus::Offline);
    }
}
