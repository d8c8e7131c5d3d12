//! Fill sessions over a real Chromium.
//!
//! Run with: FORMPILOT_USE_REAL_CHROME=1 cargo test --test browser

use std::sync::Arc;

use cdp_driver::{CdpBrowser, CdpConfig};
use chrono::Utc;
use formpilot::{EngineConfig, FillSession, PatternLibrary, SemanticFieldType, UserProfileSnapshot};
use page_model::{PageDriver, PageQuery};

fn should_run_chrome_tests() -> bool {
    std::env::var("FORMPILOT_USE_REAL_CHROME")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

macro_rules! skip_without_chrome {
    () => {
        if !should_run_chrome_tests() {
            eprintln!("Skipping test: FORMPILOT_USE_REAL_CHROME not set");
            return Ok(());
        }
    };
}

#[tokio::test]
async fn greenhouse_page_is_filled_in_the_browser() -> Result<(), Box<dyn std::error::Error>> {
    skip_without_chrome!();

    let markup = std::fs::read_to_string(format!(
        "{}/tests/fixtures/apply.html",
        env!("CARGO_MANIFEST_DIR")
    ))?;
    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(format!(
        "{}/tests/fixtures/profile.json",
        env!("CARGO_MANIFEST_DIR")
    ))?)?;
    let profile = UserProfileSnapshot::from_raw(&raw, Utc::now())?;

    let browser = CdpBrowser::launch(&CdpConfig {
        no_sandbox: true,
        ..CdpConfig::default()
    })
    .await?;
    let page = Arc::new(
        browser
            .open_with_content("https://boards.greenhouse.io/acme/jobs/4012", &markup)
            .await?,
    );
    let driver: Arc<dyn PageDriver> = page.clone();
    let mut session =
        FillSession::start(driver, PatternLibrary::bundled()?, &EngineConfig::default()).await?;
    assert_eq!(session.platform(), "greenhouse");

    let step = session.fill_active_step(&profile).await?;
    for field in [SemanticFieldType::FirstName, SemanticFieldType::Email] {
        assert!(
            step.fields.iter().any(|f| f.field == field && f.success),
            "{field} not filled"
        );
    }
    let email = page.query_css("#email", None).await?[0];
    assert_eq!(page.read_value(email).await?, "ada@example.com");

    browser.shutdown().await;
    Ok(())
}
