use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_SERVICE_URL: &str = "http://localhost:5000";

/// Profile service endpoint and local replica policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Base URL of the profile service; `/api/user/profile` is appended.
    pub service_url: String,
    pub bearer_token: Option<String>,
    pub request_timeout_ms: u64,
    pub freshness_window_ms: u64,
    /// Snapshot file; defaults to the platform data directory.
    pub cache_path: Option<PathBuf>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            bearer_token: None,
            request_timeout_ms: 10_000,
            freshness_window_ms: 24 * 60 * 60 * 1000,
            cache_path: None,
        }
    }
}

impl ProfileConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn freshness_window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.freshness_window_ms.min(i64::MAX as u64) as i64)
    }

    pub fn resolved_cache_path(&self) -> PathBuf {
        self.cache_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("formpilot")
                .join("profile.json")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_hold_a_day_long_window() {
        let config = ProfileConfig::default();
        assert_eq!(config.freshness_window(), chrono::Duration::hours(24));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert!(config.resolved_cache_path().ends_with("formpilot/profile.json"));
    }

    #[test]
    fn partial_documents_keep_defaults() {
        let config: ProfileConfig =
            serde_json::from_str(r#"{"service_url":"https://profiles.example.com"}"#).unwrap();
        assert_eq!(config.service_url, "https://profiles.example.com");
        assert_eq!(config.freshness_window_ms, 86_400_000);
    }
}
