use std::env;
use std::path::PathBuf;

use chromiumoxide::async_process::Child;
use futures::io::{AsyncBufReadExt, BufReader};
use futures::stream::StreamExt;
use tokio::time::{timeout, Duration};
use which::which;

use crate::errors::DriverError;

pub const CHROME_ENV: &str = "FORMPILOT_CHROME";

/// Read the DevTools websocket URL Chromium prints on stderr.
pub async fn extract_ws_url(child: &mut Child, wait: Duration) -> Result<String, DriverError> {
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| DriverError::Launch("chromium process missing stderr handle".into()))?;
    let mut lines = BufReader::new(stderr).lines();
    let mut captured = Vec::new();

    let reader = async {
        while let Some(line) = lines.next().await {
            let line = line.map_err(|err| DriverError::Launch(err.to_string()))?;
            if let Some(ws) = parse_ws_line(&line) {
                return Ok(ws);
            }
            captured.push(line);
        }
        Err(DriverError::Launch(format!(
            "chromium exited before exposing a devtools url: {}",
            captured.iter().take(8).cloned().collect::<Vec<_>>().join(" | ")
        )))
    };

    timeout(wait, reader)
        .await
        .map_err(|_| DriverError::Launch("timed out waiting for the devtools url".into()))?
}

fn parse_ws_line(line: &str) -> Option<String> {
    let (_, ws) = line.rsplit_once("listening on ")?;
    let ws = ws.trim();
    (ws.starts_with("ws") && ws.contains("devtools/browser")).then(|| ws.to_string())
}

/// `FORMPILOT_CHROME`, then well-known binary names on `PATH`, then the
/// default install locations.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var(CHROME_ENV) {
        let candidate = PathBuf::from(raw.trim());
        if !raw.trim().is_empty() && candidate.exists() {
            return Some(candidate);
        }
    }
    for name in [
        "google-chrome-stable",
        "google-chrome",
        "chromium",
        "chromium-browser",
        "chrome",
        "msedge",
    ] {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }
    [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    ]
    .into_iter()
    .map(PathBuf::from)
    .find(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn devtools_url_is_read_from_the_banner() {
        assert_eq!(
            parse_ws_line("DevTools listening on ws://127.0.0.1:9222/devtools/browser/abc"),
            Some("ws://127.0.0.1:9222/devtools/browser/abc".to_string())
        );
        assert_eq!(parse_ws_line("[0101/000000.000:ERROR:gpu] nope"), None);
        assert_eq!(parse_ws_line("listening on http://localhost"), None);
    }
}
