//! 📊 Counters and lifecycle state. Atomics only, because `submit` doesn't do waiting.

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

/// 🚦 Where a funnel is in its life.
///
/// `Running → ShuttingDown → Terminated`. Only ever forward. There is no sequel.
/// (Constructed exists only inside the constructor: by the time you hold a funnel,
/// its consumer has been spawned and it is Running.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FunnelState {
    Running,
    ShuttingDown,
    Terminated,
}

impl FunnelState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => FunnelState::Running,
            1 => FunnelState::ShuttingDown,
            _ => FunnelState::Terminated,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            FunnelState::Running => 0,
            FunnelState::ShuttingDown => 1,
            FunnelState::Terminated => 2,
        }
    }
}

impl fmt::Display for FunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunnelState::Running => write!(f, "running"),
            FunnelState::ShuttingDown => write!(f, "shutting down"),
            FunnelState::Terminated => write!(f, "terminated"),
        }
    }
}

/// 🔒 The state, in an atomic. `fetch_max` makes "never go backwards" free.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(FunnelState::Running.as_u8()))
    }

    pub(crate) fn get(&self) -> FunnelState {
        FunnelState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn advance(&self, to: FunnelState) {
        self.0.fetch_max(to.as_u8(), Ordering::AcqRel);
    }
}

/// 📊 Running totals, bumped from the producer side (accepted, dropped) and the
/// consumer side (delivered, write failures).
#[derive(Debug, Default)]
pub(crate) struct FunnelStats {
    accepted: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    write_failures: AtomicU64,
}

impl FunnelStats {
    pub(crate) fn record_accepted(&self) -> u64 {
        self.accepted.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_delivered(&self) -> u64 {
        self.delivered.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_write_failure(&self) -> u64 {
        self.write_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn snapshot(&self, queued: usize) -> FunnelStatsSnapshot {
        FunnelStatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            queued,
        }
    }
}

/// 📸 A point-in-time copy of the counters.
///
/// While running, the numbers are each individually correct but not a consistent cut
/// (the consumer may have delivered a message whose `accepted` bump hasn't landed yet).
/// After shutdown they settle: `accepted == delivered + write_failures + abandoned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FunnelStatsSnapshot {
    /// Messages that made it into the queue.
    pub accepted: u64,
    /// Messages turned away at `submit` (queue full, or funnel already closed).
    pub dropped: u64,
    /// Messages the writer accepted.
    pub delivered: u64,
    /// Messages the writer rejected or timed out on. Skipped, not retried.
    pub write_failures: u64,
    /// Messages sitting in the queue at snapshot time.
    pub queued: usize,
}
