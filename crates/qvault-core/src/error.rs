use thiserror::Error;

pub type QvaultResult<T> = Result<T, QvaultError>;

#[derive(Debug, Error)]
pub enum QvaultError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl QvaultError {
    /// True when the backing store reported the object as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, QvaultError::NotFound(_))
    }
}
