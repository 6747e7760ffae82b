use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("invalid key format: {0}")]
    KeyFormat(String),

    /// Tag verification failed: tampered data, wrong key, or truncation
    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("vault gate error: {0}")]
    Gate(String),
}
