//! Error types for the DevTools driver

use page_model::PageError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DriverError {
    /// Browser binary missing or the process failed to start
    #[error("browser launch failed: {0}")]
    Launch(String),

    /// Websocket or channel failure
    #[error("devtools connection error: {0}")]
    Connection(String),

    #[error("devtools command timed out: {0}")]
    Timeout(String),

    /// Error reply from the browser
    #[error("devtools error {code}: {message}")]
    Protocol { code: i64, message: String },

    /// Exception thrown by an evaluated script
    #[error("script error: {0}")]
    Script(String),

    /// Reply did not have the expected shape
    #[error("unexpected devtools reply: {0}")]
    Decode(String),
}

impl DriverError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DriverError::Timeout(_) | DriverError::Connection(_)) || self.is_context_lost()
    }

    /// The evaluation context went away under a navigation.
    pub fn is_context_lost(&self) -> bool {
        match self {
            DriverError::Protocol { message, .. } | DriverError::Script(message) => {
                let message = message.to_ascii_lowercase();
                message.contains("execution context was destroyed")
                    || message.contains("cannot find context")
                    || message.contains("inspected target navigated")
            }
            _ => false,
        }
    }
}

impl From<DriverError> for PageError {
    fn from(err: DriverError) -> Self {
        PageError::Driver(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_races_are_retryable() {
        let lost = DriverError::Protocol {
            code: -32000,
            message: "Execution context was destroyed.".into(),
        };
        assert!(lost.is_context_lost());
        assert!(lost.is_retryable());

        let bad = DriverError::Protocol {
            code: -32602,
            message: "Invalid parameters".into(),
        };
        assert!(!bad.is_retryable());
        assert!(PageError::from(bad).is_retryable());
    }
}
