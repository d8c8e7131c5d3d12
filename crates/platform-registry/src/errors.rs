use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to deserialize catalog: {0}")]
    Deserialize(String),
    #[error("invalid catalog: {0}")]
    Invalid(String),
    /// No catalog and no generic rules at all; detection cannot run.
    #[error("platform configuration unavailable: {0}")]
    ConfigurationUnavailable(String),
}

impl RegistryError {
    /// Only total unavailability stops a session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RegistryError::ConfigurationUnavailable(_))
    }
}
