use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing and limits for wizard navigation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Advance activations allowed before the session is abandoned.
    pub transition_cap: u32,
    /// Wait after the pointer sequence before falling back to direct
    /// activation.
    pub click_settle_ms: u64,
    pub navigation_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Extra scans for an advance control that is expected but missing.
    pub advance_rescans: u32,
    pub rescan_delay_ms: u64,
    /// Consecutive navigation timeouts before a step is flagged stuck.
    pub stuck_after: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            transition_cap: 10,
            click_settle_ms: 400,
            navigation_timeout_ms: 3000,
            poll_interval_ms: 100,
            advance_rescans: 2,
            rescan_delay_ms: 500,
            stuck_after: 2,
        }
    }
}

impl TrackerConfig {
    pub fn click_settle(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    /// Never zero, so polling loops always yield.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn rescan_delay(&self) -> Duration {
        Duration::from_millis(self.rescan_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_keep_defaults() {
        let config: TrackerConfig = serde_json::from_str(r#"{"transition_cap": 4}"#).unwrap();
        assert_eq!(config.transition_cap, 4);
        assert_eq!(config.navigation_timeout(), Duration::from_secs(3));
        assert_eq!(
            TrackerConfig {
                poll_interval_ms: 0,
                ..TrackerConfig::default()
            }
            .poll_interval(),
            Duration::from_millis(1)
        );
    }
}
