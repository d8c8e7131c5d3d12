use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile service unreachable: {0}")]
    Transport(String),
    #[error("profile service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("profile service reports the user is not signed in")]
    NotAuthenticated,
    #[error("profile payload rejected: {0}")]
    Decode(String),
    #[error("profile store failure: {0}")]
    Storage(String),
    #[error("no profile available")]
    Unavailable,
}

impl ProfileError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProfileError::Transport(_) => true,
            ProfileError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn severity(&self) -> u8 {
        match self {
            ProfileError::Transport(_) | ProfileError::Status { .. } => 3,
            ProfileError::NotAuthenticated => 4,
            ProfileError::Decode(_) => 5,
            ProfileError::Storage(_) => 6,
            ProfileError::Unavailable => 7,
        }
    }
}

impl From<reqwest::Error> for ProfileError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProfileError::Decode(err.to_string())
        } else {
            ProfileError::Transport(err.to_string())
        }
    }
}

impl From<std::io::Error> for ProfileError {
    fn from(err: std::io::Error) -> Self {
        ProfileError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ProfileError {
    fn from(err: serde_json::Error) -> Self {
        ProfileError::Decode(err.to_string())
    }
}

pub type ProfileResult<T> = Result<T, ProfileError>;
