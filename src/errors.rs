//! Error types for the fill session and engine configuration

use field_locator::LocatorError;
use platform_registry::RegistryError;
use profile_cache::ProfileError;
use step_tracker::TrackerError;
use thiserror::Error;
use value_injector::InjectError;

/// Session-level failure. Per-field problems are reported inside
/// [`crate::FieldOutcome`] instead.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error(transparent)]
    Inject(#[from] InjectError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Catalog(#[from] RegistryError),

    #[error("session cancelled")]
    Cancelled,
}

impl SessionError {
    /// The session cannot continue: loop cap reached, cancelled, or no
    /// detection rules at all.
    pub fn is_terminal(&self) -> bool {
        match self {
            SessionError::Tracker(err) => err.is_terminal(),
            SessionError::Catalog(err) => err.is_fatal(),
            SessionError::Cancelled => true,
            _ => false,
        }
    }

    /// The page navigated under a held element handle.
    pub fn is_stale(&self) -> bool {
        match self {
            SessionError::Locator(err) => err.is_stale(),
            SessionError::Inject(err) => err.is_stale(),
            SessionError::Tracker(TrackerError::Page(err)) => err.is_stale(),
            _ => false,
        }
    }
}

/// Per-field failure carried in a fill outcome.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum FieldFailure {
    #[error("field not found on the page")]
    NotFound,

    #[error(transparent)]
    Injection(#[from] InjectError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("invalid override {key}: {reason}")]
    Override { key: String, reason: String },
}

pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_cap_and_cancellation_are_terminal() {
        assert!(SessionError::Tracker(TrackerError::StepLoopExceeded { cap: 10 }).is_terminal());
        assert!(SessionError::Cancelled.is_terminal());
        assert!(!SessionError::Tracker(TrackerError::NoAdvanceControl { rescans: 2 }).is_terminal());
        assert!(!SessionError::Catalog(RegistryError::Invalid("x".into())).is_terminal());
        assert!(SessionError::Catalog(RegistryError::ConfigurationUnavailable("x".into())).is_terminal());
    }
}
