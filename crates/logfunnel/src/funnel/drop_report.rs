//! 📣 Drop reporting, done by someone who is not a producer.
//!
//! `submit` only bumps a counter. Writing a warning from inside `submit` would put a
//! log sink on the producer's path, and a log sink is exactly the kind of thing that
//! hangs when the disk is full. So a small background task reads the counter once per
//! interval and says something if it moved.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::stats::FunnelState;
use super::{Shared, Worker};

// -- tokio intervals panic on a zero period
const MIN_REPORT_PERIOD: Duration = Duration::from_millis(100);

/// 📣 Emits one warning if anything was dropped since the last report.
///
/// Called from the reporter task and once more from shutdown, never from `submit`.
pub(crate) fn report_drops(shared: &Shared) -> bool {
    let dropped = shared.stats.dropped();
    let previously_reported = shared.reported_drops.swap(dropped, Ordering::Relaxed);
    if dropped <= previously_reported {
        return false;
    }
    warn!(
        since_last_report = dropped - previously_reported,
        total = dropped,
        "⚠️ funnel saturated or closed, lines dropped at submit"
    );
    true
}

/// ⏰ Wakes up every interval, reports drops, retires once the funnel is terminated.
#[derive(Debug)]
pub(crate) struct DropReporter {
    shared: Arc<Shared>,
    period: Duration,
}

impl DropReporter {
    pub(crate) fn new(shared: Arc<Shared>, period: Duration) -> Self {
        Self {
            shared,
            period: period.max(MIN_REPORT_PERIOD),
        }
    }
}

impl Worker for DropReporter {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // -- the first tick is free. skip it, nothing has happened yet.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                report_drops(&self.shared);
                if self.shared.state.get() == FunnelState::Terminated {
                    break;
                }
            }
            debug!("📣 drop reporter retired");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::FunnelConfig;

    #[test]
    fn the_one_where_each_drop_is_reported_once() {
        let shared = Shared::new(&FunnelConfig::default());
        assert!(!report_drops(&shared), "nothing dropped, nothing to say");

        shared.stats.record_dropped();
        shared.stats.record_dropped();
        assert!(report_drops(&shared));
        assert!(!report_drops(&shared), "same two drops, already reported");

        shared.stats.record_dropped();
        assert!(report_drops(&shared));
    }

    #[test]
    fn the_one_where_a_zero_interval_is_gently_raised() {
        let shared = Arc::new(Shared::new(&FunnelConfig::default()));
        let reporter = DropReporter::new(shared, Duration::ZERO);
        assert_eq!(reporter.period, MIN_REPORT_PERIOD);
    }
}
