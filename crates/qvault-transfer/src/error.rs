use qvault_core::QvaultError;
use qvault_crypto::CryptoError;
use thiserror::Error;

pub type TransferResult<T> = Result<T, TransferError>;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("retrieval failed: {0}")]
    Retrieval(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("upload of {item} failed: {reason}")]
    Upload { item: String, reason: String },

    #[error("no files selected")]
    NoSelection,

    #[error("refusing to upload: storage transport is not secure")]
    InsecureContext,

    #[error("invalid selection: {0}")]
    Selection(String),

    #[error(transparent)]
    Store(#[from] QvaultError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for TransferError {
    fn from(e: zip::result::ZipError) -> Self {
        TransferError::Archive(e.to_string())
    }
}
