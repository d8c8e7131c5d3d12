//! Error types for field detection

use page_model::PageError;
use thiserror::Error;

/// Locator error enumeration
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// Page port failure
    #[error("page error: {0}")]
    Page(#[from] PageError),

    /// Strategy execution failed
    #[error("strategy '{strategy}' failed: {reason}")]
    StrategyFailed { strategy: String, reason: String },
}

impl LocatorError {
    /// Stale handles mean the page navigated mid-detection; detection may
    /// simply be run again.
    pub fn is_retryable(&self) -> bool {
        self.is_stale()
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, LocatorError::Page(err) if err.is_stale())
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::Page(PageError::StaleHandle(_)) => 1,
            LocatorError::Page(_) => 2,
            LocatorError::StrategyFailed { .. } => 1,
        }
    }
}
