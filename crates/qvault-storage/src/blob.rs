//! Ciphertext blob storage

use async_trait::async_trait;
use opendal::Operator;
use tracing::debug;

use qvault_core::QvaultResult;

use crate::{map_opendal, normalize_prefix, validate_id};

/// Byte-exact storage of opaque envelopes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, blob_id: &str, bytes: Vec<u8>) -> QvaultResult<()>;

    /// Fetch a blob. A missing blob is `QvaultError::NotFound`.
    async fn get(&self, blob_id: &str) -> QvaultResult<Vec<u8>>;
}

/// Blobs stored at `{prefix}/blobs/{blob_id}.enc`
#[derive(Clone)]
pub struct OpendalBlobStore {
    op: Operator,
    prefix: String,
}

impl OpendalBlobStore {
    pub fn new(op: Operator, prefix: &str) -> Self {
        Self {
            op,
            prefix: normalize_prefix(prefix),
        }
    }

    fn blob_path(&self, blob_id: &str) -> String {
        format!("{}/blobs/{blob_id}.enc", self.prefix)
    }
}

#[async_trait]
impl BlobStore for OpendalBlobStore {
    async fn put(&self, blob_id: &str, bytes: Vec<u8>) -> QvaultResult<()> {
        validate_id("blob", blob_id)?;
        let path = self.blob_path(blob_id);
        let len = bytes.len();
        self.op
            .write(&path, bytes)
            .await
            .map_err(|e| map_opendal(format!("writing blob {path}"), e))?;
        debug!(blob = %blob_id, bytes = len, "blob stored");
        Ok(())
    }

    async fn get(&self, blob_id: &str) -> QvaultResult<Vec<u8>> {
        validate_id("blob", blob_id)?;
        let path = self.blob_path(blob_id);
        let buf = self
            .op
            .read(&path)
            .await
            .map_err(|e| map_opendal(format!("reading blob {path}"), e))?;
        Ok(buf.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_operator;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = OpendalBlobStore::new(memory_operator().unwrap(), "test/");
        let data: Vec<u8> = (0u8..=255).collect();

        store.put("blob-1", data.clone()).await.unwrap();
        assert_eq!(store.get("blob-1").await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_blob_path_layout() {
        let op = memory_operator().unwrap();
        let store = OpendalBlobStore::new(op.clone(), "vault");
        store.put("abc", b"xyz".to_vec()).await.unwrap();

        assert!(op.exists("vault/blobs/abc.enc").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_blob_is_not_found() {
        let store = OpendalBlobStore::new(memory_operator().unwrap(), "test");
        let err = store.get("nope").await.unwrap_err();
        assert!(err.is_not_found(), "got {err}");
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let store = OpendalBlobStore::new(memory_operator().unwrap(), "test");
        for id in ["", "../x", "a/b", ".hidden"] {
            assert!(store.put(id, vec![1]).await.is_err(), "id {id:?}");
        }
    }
}
