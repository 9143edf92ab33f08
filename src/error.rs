use thiserror::Error;

/// Failures of the collaborators the notification feed talks to.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("challenge not found: {0}")]
    ChallengeNotFound(String),

    #[error("challenge lookup failed: {0}")]
    Lookup(#[from] reqwest::Error),

    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("translation failed for {key}: {reason}")]
    Translation { key: String, reason: String },

    #[error("no async runtime available: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FeedError>;
