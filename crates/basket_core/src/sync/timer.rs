//! Scheduled-task handles.
//!
//! The session never sleeps itself. It asks the host to schedule a timer
//! under a [`TimerId`] and later receives `TimerFired(id)`. Ids are never
//! reused, so a timer that was cancelled (or replaced) can be recognised
//! and ignored if the host still delivers it.

use std::fmt;

/// Opaque handle for one scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Monotonic [`TimerId`] allocator shared by one session.
#[derive(Debug, Default)]
pub struct TimerIds {
    next: u64,
}

impl TimerIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> TimerId {
        self.next += 1;
        TimerId(self.next)
    }
}
