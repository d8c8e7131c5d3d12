//! Page port against a real Chromium.
//!
//! Run with: FORMPILOT_USE_REAL_CHROME=1 cargo test -p cdp-driver --test real_chrome

use cdp_driver::{CdpBrowser, CdpConfig};
use page_model::{DomEvent, EventKind, PageError, PageInput, PageQuery};

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

const FORM: &str = r##"<!doctype html>
<html><body>
<form>
  <label for="email">Email address</label>
  <input id="email" name="email" type="email" required>
  <input name="token" type="hidden" value="x">
  <select name="country">
    <option value="">Choose</option>
    <option value="gb">United Kingdom</option>
  </select>
  <div id="summary" contenteditable="true"></div>
</form>
<script>
  document.getElementById('email').addEventListener('change', function (e) {
    e.target.setAttribute('data-changed', e.target.value);
  });
</script>
</body></html>"##;

fn config() -> CdpConfig {
    CdpConfig {
        no_sandbox: true,
        ..CdpConfig::default()
    }
}

#[tokio::test]
async fn form_controls_are_read_and_written() -> Result<(), Box<dyn std::error::Error>> {
    skip_without_chrome!();

    let browser = CdpBrowser::launch(&config()).await?;
    let page = browser
        .open_with_content("https://jobs.example.test/apply", FORM)
        .await?;
    assert_eq!(page.url().await, "https://jobs.example.test/apply");

    let inputs = page.input_like_elements(None).await?;
    assert_eq!(inputs.len(), 3);
    let email = page.query_css("input[type=email]", None).await?[0];
    let info = page.describe(email).await?;
    assert_eq!(info.name.as_deref(), Some("email"));
    assert!(info.required);
    assert_eq!(page.label_text(email).await?.as_deref(), Some("Email address"));

    page.set_value_native(email, "ada@example.com").await?;
    page.dispatch(email, DomEvent::new(EventKind::Change)).await?;
    assert_eq!(page.read_value(email).await?, "ada@example.com");
    let info = page.describe(email).await?;
    assert_eq!(info.attr("data-changed"), Some("ada@example.com"));

    let country = page.query_path("//select[@name='country']", None).await?[0];
    page.select_option(country, 1).await?;
    assert!(page.options(country).await?[1].selected);

    let summary = page.query_css("#summary", None).await?[0];
    page.set_text_content(summary, "Ten years of Rust").await?;
    assert_eq!(page.read_value(summary).await?, "Ten years of Rust");

    assert!(matches!(
        page.query_css("input[", None).await,
        Err(PageError::InvalidSelector { .. })
    ));

    browser.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn navigation_invalidates_handles() -> Result<(), Box<dyn std::error::Error>> {
    skip_without_chrome!();

    let browser = CdpBrowser::launch(&config()).await?;
    let page = browser
        .open_with_content("https://jobs.example.test/apply", FORM)
        .await?;
    let before = page.load_id().await;
    let email = page.query_css("#email", None).await?[0];

    page.navigate("about:blank").await?;
    assert_ne!(page.load_id().await, before);
    assert_eq!(page.focus(email).await, Err(PageError::StaleHandle(email)));

    browser.shutdown().await;
    Ok(())
}
