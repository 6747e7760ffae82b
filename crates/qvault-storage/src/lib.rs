//! qvault-storage: the two external collaborators of the transfer pipeline
//!
//! - `BlobStore`: opaque ciphertext blobs keyed by blob id
//! - `MetadataStore`: transfer records keyed by record id, queryable by owner
//! - `ProfileStore`: per-user profile documents (vault gate hash)
//!
//! All three are backed by an OpenDAL `Operator`, so the same code serves the
//! in-memory, local filesystem, and S3 backends.

pub mod blob;
pub mod health;
pub mod metadata;
pub mod operator;

pub use blob::{BlobStore, OpendalBlobStore};
pub use health::check_health;
pub use metadata::{MetadataStore, OpendalMetadataStore, ProfileStore};
pub use operator::{build_from_core_config, build_operator, memory_operator, S3Credentials};

use std::sync::Arc;

/// The store trio a session operates against
#[derive(Clone)]
pub struct Stores {
    pub blobs: Arc<dyn BlobStore>,
    pub records: Arc<dyn MetadataStore>,
    pub profiles: Arc<dyn ProfileStore>,
}

impl Stores {
    /// All stores share one operator, separated by key prefix.
    pub fn from_operator(op: opendal::Operator, prefix: &str) -> Self {
        let meta = Arc::new(OpendalMetadataStore::new(op.clone(), prefix));
        Self {
            blobs: Arc::new(OpendalBlobStore::new(op, prefix)),
            records: meta.clone(),
            profiles: meta,
        }
    }

    /// Process-local stores; contents vanish with the process.
    pub fn in_memory() -> anyhow::Result<Self> {
        Ok(Self::from_operator(memory_operator()?, "qvault"))
    }
}

/// Map an OpenDAL error into the shared error type, keeping not-found distinct.
pub(crate) fn map_opendal(context: String, e: opendal::Error) -> qvault_core::QvaultError {
    if e.kind() == opendal::ErrorKind::NotFound {
        qvault_core::QvaultError::NotFound(context)
    } else {
        qvault_core::QvaultError::Storage(format!("{context}: {e}"))
    }
}

/// Reject ids that would escape their key prefix.
pub(crate) fn validate_id(kind: &str, id: &str) -> qvault_core::QvaultResult<()> {
    let bad = id.is_empty()
        || id.starts_with('.')
        || id.contains('/')
        || id.contains('\\')
        || id.chars().any(char::is_control);
    if bad {
        return Err(qvault_core::QvaultError::Storage(format!("invalid {kind} id: {id:?}")));
    }
    Ok(())
}

/// Normalize a key prefix: no trailing slash
pub(crate) fn normalize_prefix(prefix: &str) -> String {
    prefix.trim_end_matches('/').to_string()
}
