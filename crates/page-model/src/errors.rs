//! Error types for the page port

use formpilot_core_types::ElementHandle;
use thiserror::Error;

/// Page port error enumeration
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PageError {
    /// Handle minted for a previous page load
    #[error("stale element handle {0}")]
    StaleHandle(ElementHandle),

    /// Handle does not point at an element of this load
    #[error("unknown element handle {0}")]
    UnknownHandle(ElementHandle),

    /// CSS selector outside the supported subset
    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// Path expression outside the supported subset
    #[error("invalid path expression '{expr}': {reason}")]
    InvalidPath { expr: String, reason: String },

    /// Operation does not apply to this kind of element
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Markup could not be loaded
    #[error("markup error: {0}")]
    Markup(String),

    /// Browser connection or script evaluation failed
    #[error("driver error: {0}")]
    Driver(String),
}

impl PageError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, PageError::Driver(_))
    }

    /// Stale handles mean the caller must re-run detection.
    pub fn is_stale(&self) -> bool {
        matches!(self, PageError::StaleHandle(_))
    }
}
