use page_model::PageError;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum TrackerError {
    #[error(transparent)]
    Page(#[from] PageError),

    #[error("no new content within {waited_ms}ms after advancing step {step}")]
    NavigationTimeout { step: u32, waited_ms: u64 },

    #[error("advance cap of {cap} activations reached without completion")]
    StepLoopExceeded { cap: u32 },

    #[error("no advance control found after {rescans} re-scans")]
    NoAdvanceControl { rescans: u32 },

    #[error("invalid step marker pattern: {0}")]
    InvalidMarker(String),
}

impl TrackerError {
    /// Whether the caller may try to advance again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TrackerError::NavigationTimeout { .. } | TrackerError::NoAdvanceControl { .. }
        )
    }

    /// Ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackerError::StepLoopExceeded { .. })
    }

    pub fn severity(&self) -> u8 {
        match self {
            TrackerError::NoAdvanceControl { .. } => 2,
            TrackerError::NavigationTimeout { .. } => 3,
            TrackerError::InvalidMarker(_) => 4,
            TrackerError::Page(err) if err.is_stale() => 5,
            TrackerError::Page(_) => 6,
            TrackerError::StepLoopExceeded { .. } => 8,
        }
    }
}
