use page_model::PageError;
use thiserror::Error;

use crate::model::Technique;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InjectError {
    #[error("page error: {0}")]
    Page(#[from] PageError),
    #[error("no option matches '{wanted}'")]
    OptionNotFound { wanted: String, available: Vec<String> },
    #[error("value not verified after {attempted:?}")]
    VerificationFailed { attempted: Vec<Technique> },
    #[error("{kind} control cannot take {value}")]
    UnsupportedValue { kind: String, value: String },
}

impl InjectError {
    /// Stale handles need a fresh detection before another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, InjectError::Page(err) if err.is_stale())
    }

    pub fn is_stale(&self) -> bool {
        self.is_retryable()
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            InjectError::Page(PageError::StaleHandle(_)) => 1,
            InjectError::Page(_) => 2,
            InjectError::OptionNotFound { .. } | InjectError::VerificationFailed { .. } => 1,
            InjectError::UnsupportedValue { .. } => 0,
        }
    }
}
