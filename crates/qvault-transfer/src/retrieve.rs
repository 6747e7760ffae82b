//! Download path: fetch record + envelope, recover the key, decrypt.

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use tracing::{debug, info};
use zeroize::Zeroizing;

use qvault_core::{RecordKind, Session, TransferRecord};
use qvault_crypto::{decrypt, import_key, is_sealed, unseal_key_string};
use qvault_storage::Stores;

use crate::error::{TransferError, TransferResult};
use crate::mime::content_type_for;

/// Decrypted file ready to hand back to the user
#[derive(Clone)]
pub struct Reconstructed {
    pub file_name: String,
    pub content_type: String,
    pub kind: RecordKind,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Reconstructed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconstructed")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("kind", &self.kind)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// The session user's records, newest first.
pub async fn list_files(session: &Session, stores: &Stores) -> TransferResult<Vec<TransferRecord>> {
    Ok(stores.records.list_by_owner(session.user_id()).await?)
}

/// Download and decrypt one blob.
///
/// `record_ref` must name a record owned by the session user whose blob is
/// `blob_ref`. `display_name` decides the content type of the result.
/// `passphrase` is only consulted for records whose key string is sealed.
pub async fn download(
    session: &Session,
    stores: &Stores,
    blob_ref: &str,
    record_ref: &str,
    display_name: &str,
    passphrase: Option<&SecretString>,
) -> TransferResult<Reconstructed> {
    let record = fetch_record(session, stores, record_ref).await?;
    if record.blob_id != blob_ref {
        return Err(TransferError::Retrieval(format!(
            "record {record_ref} does not reference blob {blob_ref}"
        )));
    }

    let envelope = stores
        .blobs
        .get(blob_ref)
        .await
        .map_err(|e| TransferError::Retrieval(format!("fetching blob {blob_ref}: {e}")))?;
    debug!(blob = %blob_ref, bytes = envelope.len(), "envelope fetched");

    let key_string = if is_sealed(&record.encryption_key) {
        let passphrase = passphrase.ok_or_else(|| {
            TransferError::Retrieval(format!(
                "key for {} is sealed; vault passphrase required",
                record.file_name
            ))
        })?;
        Zeroizing::new(unseal_key_string(&record.encryption_key, passphrase)?)
    } else {
        Zeroizing::new(record.encryption_key.clone())
    };
    let key = import_key(&key_string)?;
    let bytes = decrypt(&envelope, &key)?;

    info!(file = %display_name, record = %record_ref, bytes = bytes.len(), "downloaded");
    Ok(Reconstructed {
        file_name: display_name.to_string(),
        content_type: content_type_for(display_name).to_string(),
        kind: record.kind,
        bytes,
    })
}

/// Download by record id alone, using the record's blob and file name.
pub async fn download_record(
    session: &Session,
    stores: &Stores,
    record_id: &str,
    passphrase: Option<&SecretString>,
) -> TransferResult<Reconstructed> {
    let record = fetch_record(session, stores, record_id).await?;
    download(
        session,
        stores,
        &record.blob_id,
        &record.record_id,
        &record.file_name,
        passphrase,
    )
    .await
}

async fn fetch_record(
    session: &Session,
    stores: &Stores,
    record_id: &str,
) -> TransferResult<TransferRecord> {
    let record = stores
        .records
        .get_record(record_id)
        .await
        .map_err(|e| TransferError::Retrieval(format!("fetching record {record_id}: {e}")))?
        .ok_or_else(|| TransferError::Retrieval(format!("no record {record_id}")))?;

    if record.owner_id != session.user_id() {
        return Err(TransferError::Retrieval(format!(
            "record {record_id} belongs to another user"
        )));
    }
    Ok(record)
}

/// Write a reconstructed file into `dir` atomically (temp file + rename).
///
/// Only the base name of the stored file name is used, so a record cannot
/// direct the write outside `dir`.
pub async fn save_reconstructed(dir: &Path, file: &Reconstructed) -> TransferResult<PathBuf> {
    let name = Path::new(&file.file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .ok_or_else(|| {
            TransferError::Retrieval(format!("unusable file name: {:?}", file.file_name))
        })?;

    tokio::fs::create_dir_all(dir).await?;
    let target = dir.join(name);
    let tmp = dir.join(format!(".{name}.qvault_tmp"));

    tokio::fs::write(&tmp, &file.bytes).await?;
    tokio::fs::rename(&tmp, &target).await?;

    debug!(path = %target.display(), bytes = file.bytes.len(), "saved");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn reconstructed(name: &str) -> Reconstructed {
        Reconstructed {
            file_name: name.into(),
            content_type: content_type_for(name).into(),
            kind: RecordKind::File,
            bytes: b"plaintext".to_vec(),
        }
    }

    #[tokio::test]
    async fn test_save_writes_under_base_name() {
        let tmp = TempDir::new().unwrap();
        let path = save_reconstructed(tmp.path(), &reconstructed("../../etc/notes.txt"))
            .await
            .unwrap();

        assert_eq!(path, tmp.path().join("notes.txt"));
        assert_eq!(std::fs::read(&path).unwrap(), b"plaintext");
        assert!(!tmp.path().join(".notes.txt.qvault_tmp").exists());
    }

    #[tokio::test]
    async fn test_save_rejects_empty_name() {
        let tmp = TempDir::new().unwrap();
        let err = save_reconstructed(tmp.path(), &reconstructed(".."))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Retrieval(_)));
    }

    #[test]
    fn test_debug_hides_bytes() {
        let dbg = format!("{:?}", reconstructed("a.txt"));
        assert!(!dbg.contains("plaintext"));
        assert!(dbg.contains("text/plain"));
    }
}
