use thiserror::Error;

pub type Result<T> = std::result::Result<T, BetError>;

#[derive(Error, Debug)]
pub enum BetError {
    #[error("Not authenticated: no acting user identity available")]
    NotAuthenticated,

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Bet not found: {id}")]
    BetNotFound { id: String },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BetError {
    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::BetNotFound { id: id.into() }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Persistence failures are safe to retry with the same inputs; the
    /// store's guarded writes make the retries idempotent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Io(_))
    }
}
