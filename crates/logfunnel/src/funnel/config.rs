//! 🔧 Funnel knobs. Three of them. We counted.

use std::time::Duration;

use serde::Deserialize;

use crate::error::FunnelError;

/// 📦 How the funnel should behave, as deserialized from TOML / `LOGFUNNEL_FUNNEL__*` env vars.
///
/// 🧠 Sizing capacity: aim for a buffer that sits around 80-90% full under normal load.
/// Too small and a healthy device still causes drops. Too large and a dead device takes
/// forever to notice. One slot per producer is a decent first guess, which is why the
/// default matches the demo's default producer count.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct FunnelConfig {
    /// Max in-flight undelivered messages. Fixed at construction, never resized. Must be ≥ 1.
    #[serde(default = "default_capacity", alias = "queue_capacity")]
    pub capacity: usize,
    /// Optional deadline on each individual write. `None` means a stuck device stalls
    /// the consumer (and only the consumer) for as long as it stays stuck.
    #[serde(default)]
    pub write_timeout_ms: Option<u64>,
    /// At most one "dropping" / "write failed" log line per this many seconds.
    #[serde(default = "default_failure_log_interval_secs")]
    pub failure_log_interval_secs: u64,
}

fn default_capacity() -> usize {
    10
}

// -- 🔕 10 seconds: long enough to not spam, short enough to notice the outage ended
fn default_failure_log_interval_secs() -> u64 {
    10
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            write_timeout_ms: None,
            failure_log_interval_secs: default_failure_log_interval_secs(),
        }
    }
}

impl FunnelConfig {
    /// A default config with a specific capacity. Everything else stays stock.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<(), FunnelError> {
        if self.capacity == 0 {
            return Err(FunnelError::InvalidCapacity {
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    pub(crate) fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }

    pub(crate) fn failure_log_interval(&self) -> Duration {
        Duration::from_secs(self.failure_log_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_zero_capacity_is_turned_away_at_the_door() {
        assert_eq!(
            FunnelConfig::with_capacity(0).validate(),
            Err(FunnelError::InvalidCapacity { capacity: 0 })
        );
        assert_eq!(FunnelConfig::with_capacity(1).validate(), Ok(()));
    }

    #[test]
    fn the_one_where_the_timeout_knob_turns_into_a_duration() {
        let config = FunnelConfig {
            write_timeout_ms: Some(250),
            ..FunnelConfig::default()
        };
        assert_eq!(config.write_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(FunnelConfig::default().write_timeout(), None);
        assert_eq!(FunnelConfig::default().failure_log_interval(), Duration::from_secs(10));
    }
}
