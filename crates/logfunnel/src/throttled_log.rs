//! 📢 Throttled logging: say it once, count the rest.
//!
//! When the disk is full every single write fails. Logging each one is how you turn a
//! logging outage into a logging-about-logging outage. So we log at most once per
//! interval and carry a suppressed count with it.
//!
//! 🧠 Only the consumer calls this (producers never log, see `FunnelHandle::submit`).
//! The mutex is still only ever `try_lock`ed: if someone else is busy deciding whether
//! to log, we just count and move on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::error;

/// 🔕 A rate limiter for log lines. Thread-safe, lock-free-ish, drama-free.
#[derive(Debug)]
pub(crate) struct ThrottledLog {
    min_interval: Duration,
    last_logged_at: Mutex<Option<Instant>>,
    // -- events since the last line we actually emitted
    pending: AtomicU64,
}

impl ThrottledLog {
    pub(crate) fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_logged_at: Mutex::new(None),
            pending: AtomicU64::new(0),
        }
    }

    /// 📝 Record one event, emit a line if the interval allows it.
    ///
    /// Returns `true` if a line was emitted. `total` is whatever running counter the
    /// caller wants attached, so the reader sees the big number and not just the delta.
    pub(crate) fn record(&self, what: &str, detail: &dyn std::fmt::Display, total: u64) -> bool {
        self.pending.fetch_add(1, Ordering::Relaxed);

        let should_log = match self.last_logged_at.try_lock() {
            // -- 🔒 someone else holds the pen. we're a tally mark now.
            None => false,
            Some(mut last) => {
                let now = Instant::now();
                match *last {
                    Some(then) if now.duration_since(then) < self.min_interval => false,
                    _ => {
                        *last = Some(now);
                        true
                    }
                }
            }
        };

        if !should_log {
            return false;
        }

        let count = self.pending.swap(0, Ordering::Relaxed);
        let suppressed = count.saturating_sub(1);
        error!(what, %detail, suppressed, total, "💀 {what}");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_the_first_event_always_gets_a_microphone() {
        let throttle = ThrottledLog::new(Duration::from_secs(60));
        assert!(throttle.record("write failed", &"disk full", 1));
    }

    #[test]
    fn the_one_where_the_second_event_is_told_to_wait_its_turn() {
        let throttle = ThrottledLog::new(Duration::from_secs(60));
        assert!(throttle.record("write failed", &"disk full", 1));
        for n in 2..100 {
            assert!(
                !throttle.record("write failed", &"disk full", n),
                "event {n} should have been suppressed"
            );
        }
        // -- 98 tally marks waiting for the next line
        assert_eq!(throttle.pending.load(Ordering::Relaxed), 98);
    }

    #[test]
    fn the_one_where_a_zero_interval_means_everyone_speaks() {
        let throttle = ThrottledLog::new(Duration::ZERO);
        for n in 0..10 {
            assert!(throttle.record("write failed", &"timed out", n));
        }
        assert_eq!(throttle.pending.load(Ordering::Relaxed), 0);
    }
}
