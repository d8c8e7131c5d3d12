use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::CdpConfig;
use crate::errors::DriverError;
use crate::page::CdpPage;
use crate::transport::ChromiumTransport;

/// A launched (or connected) Chromium and the settings it was started with.
pub struct CdpBrowser {
    transport: Arc<ChromiumTransport>,
    config: CdpConfig,
}

impl CdpBrowser {
    #[instrument(skip_all, fields(headless = config.headless))]
    pub async fn launch(config: &CdpConfig) -> Result<Self, DriverError> {
        let transport = Arc::new(ChromiumTransport::start(config).await?);
        info!(target: "cdp-driver", "browser ready");
        Ok(Self {
            transport,
            config: config.clone(),
        })
    }

    /// Open a tab on `url`.
    pub async fn open_page(&self, url: &str) -> Result<CdpPage, DriverError> {
        let page = CdpPage::open(self.transport.clone(), &self.config).await?;
        page.navigate(url).await?;
        Ok(page)
    }

    /// Open a tab showing `html` under `url`.
    pub async fn open_with_content(&self, url: &str, html: &str) -> Result<CdpPage, DriverError> {
        let page = CdpPage::open(self.transport.clone(), &self.config).await?;
        page.load_html(url, html).await?;
        Ok(page)
    }

    pub fn is_alive(&self) -> bool {
        self.transport.is_alive()
    }

    pub async fn shutdown(&self) {
        self.transport.shutdown().await;
        info!(target: "cdp-driver", "browser closed");
    }
}
