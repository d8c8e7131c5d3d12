use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use cdp_driver::{CdpBrowser, CdpConfig, CdpPage};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

/// Logs go to stderr so stdout stays machine-readable. `RUST_LOG` wins over
/// `level`; `debug` forces debug.
pub fn init_logging(level: &str, debug: bool, json: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

pub fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).with_context(|| format!("invalid URL: {raw}"))
}

/// Launch the browser and open `url`. With `page_file`, the saved markup is
/// served as the response for `url` instead of fetching it.
pub async fn open_page(
    config: &CdpConfig,
    page_file: Option<&Path>,
    url: &Url,
) -> Result<(CdpBrowser, Arc<CdpPage>)> {
    let markup = match page_file {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?,
        ),
        None => None,
    };
    let browser = CdpBrowser::launch(config)
        .await
        .context("starting the browser; set FORMPILOT_CHROME or browser.executable")?;
    let page = match &markup {
        Some(markup) => browser.open_with_content(url.as_str(), markup).await,
        None => browser.open_page(url.as_str()).await,
    };
    match page {
        Ok(page) => Ok((browser, Arc::new(page))),
        Err(err) => {
            browser.shutdown().await;
            Err(err).with_context(|| format!("opening {url}"))
        }
    }
}
