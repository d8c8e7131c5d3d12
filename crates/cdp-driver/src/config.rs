use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Launch and tuning settings for the browser behind a [`crate::CdpPage`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CdpConfig {
    /// Chrome/Chromium binary; discovered from `FORMPILOT_CHROME`, `PATH`
    /// and the usual install locations when unset.
    pub executable: Option<PathBuf>,
    /// Profile directory; a per-process directory under the temp dir when unset.
    pub user_data_dir: Option<PathBuf>,
    pub headless: bool,
    /// Connect to an already running browser instead of launching one.
    pub websocket_url: Option<String>,
    /// Deadline for a single protocol command.
    pub default_deadline_ms: u64,
    /// Deadline for a navigation to reach `document.readyState == "complete"`.
    pub navigation_timeout_ms: u64,
    /// `Browser.getVersion` keep-alive period; 0 disables it.
    pub heartbeat_interval_ms: u64,
    pub launch_timeout_ms: u64,
    /// Pass `--no-sandbox`; needed when running as root in containers.
    pub no_sandbox: bool,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            executable: None,
            user_data_dir: None,
            headless: true,
            websocket_url: None,
            default_deadline_ms: 30_000,
            navigation_timeout_ms: 30_000,
            heartbeat_interval_ms: 15_000,
            launch_timeout_ms: 20_000,
            no_sandbox: false,
        }
    }
}

impl CdpConfig {
    pub fn profile_dir(&self) -> PathBuf {
        self.user_data_dir.clone().unwrap_or_else(|| {
            std::env::temp_dir().join(format!("formpilot-chrome-{}", std::process::id()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: CdpConfig =
            serde_json::from_str(r#"{"headless": false, "no_sandbox": true}"#).unwrap();
        assert!(!config.headless);
        assert!(config.no_sandbox);
        assert_eq!(config.default_deadline_ms, 30_000);
        assert!(config.profile_dir().starts_with(std::env::temp_dir()));
    }
}
