//! Batch upload orchestrator
//!
//! One batch = one selection + one fresh key:
//! ```text
//! Idle -> KeyReady -> { encrypt item -> upload blob -> write record }* -> Completed
//!                                                                     | PartiallyFailed
//!                                                                     | Failed
//! ```
//! In individual-files mode a failing item is logged and tallied and the
//! batch moves on. In folder mode the whole folder is one archive item and
//! any failure aborts the batch.

use futures::stream::{self, StreamExt};
use secrecy::SecretString;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use qvault_core::config::{CryptoConfig, TransferConfig};
use qvault_core::types::now_millis;
use qvault_core::{BatchMode, RecordKind, SelectedItem, Selection, Session, TransferRecord};
use qvault_crypto::{encrypt, export_key, generate_batch_key, seal_key_string, KdfParams, SymmetricKey};
use qvault_storage::Stores;

use crate::archive::{archive_name, pack_folder};
use crate::collect::check_extensions;
use crate::error::{TransferError, TransferResult};
use crate::mime::content_type_for;

/// Progress callback type (items_done, items_total, item name)
pub type ProgressFn = Box<dyn Fn(u64, u64, &str) + Send + Sync>;

/// Terminal state of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Completed,
    /// Some items were stored, some were not
    PartiallyFailed,
    /// Nothing was stored
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub name: String,
    pub reason: String,
}

/// Outcome of an upload batch
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub mode: BatchMode,
    pub status: BatchStatus,
    pub succeeded: usize,
    pub failed: usize,
    /// Records written, in selection order
    pub records: Vec<TransferRecord>,
    pub failures: Vec<ItemFailure>,
}

/// Seal the batch key string under the vault passphrase before storing it.
#[derive(Clone)]
pub struct SealOptions {
    pub passphrase: SecretString,
    pub params: KdfParams,
}

impl std::fmt::Debug for SealOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealOptions")
            .field("passphrase", &"[REDACTED]")
            .field("params", &self.params)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Items in flight at once; 1 is strictly sequential
    pub workers: usize,
    /// Accepted extensions; empty accepts everything
    pub allowed_extensions: Vec<String>,
    pub seal: Option<SealOptions>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            allowed_extensions: Vec::new(),
            seal: None,
        }
    }
}

impl BatchOptions {
    pub fn from_config(config: &TransferConfig) -> Self {
        Self {
            workers: config.workers.max(1),
            allowed_extensions: config.allowed_extensions.clone(),
            seal: None,
        }
    }

    /// Enable key sealing with the configured Argon2 parameters.
    pub fn with_seal(mut self, passphrase: SecretString, crypto: &CryptoConfig) -> Self {
        self.seal = Some(SealOptions {
            passphrase,
            params: kdf_params(crypto),
        });
        self
    }
}

/// Argon2id costs from the `[crypto]` config section.
pub fn kdf_params(crypto: &CryptoConfig) -> KdfParams {
    KdfParams {
        mem_cost_kib: crypto.argon2_mem_cost_kib,
        time_cost: crypto.argon2_time_cost,
        parallelism: crypto.argon2_parallelism,
    }
}

/// Upload the session's current selection as one batch.
///
/// Refuses with `NoSelection` when nothing is selected and with
/// `InsecureContext` when the session's transport is not secure. On any
/// success the selection is cleared and a refresh is signalled.
pub async fn upload_batch(
    session: &mut Session,
    stores: &Stores,
    options: &BatchOptions,
    progress: Option<&ProgressFn>,
) -> TransferResult<BatchReport> {
    let report = run_batch(session, stores, options, progress).await?;

    if report.succeeded > 0 {
        session.clear_selection();
        session.signal_refresh();
    }
    Ok(report)
}

async fn run_batch(
    session: &Session,
    stores: &Stores,
    options: &BatchOptions,
    progress: Option<&ProgressFn>,
) -> TransferResult<BatchReport> {
    let selection = session.selection();
    if selection.is_empty() {
        return Err(TransferError::NoSelection);
    }
    if !session.transport().is_secure() {
        return Err(TransferError::InsecureContext);
    }
    check_extensions(selection.items(), &options.allowed_extensions)?;

    let key = generate_batch_key()?;
    let key_string = batch_key_string(&key, options.seal.as_ref())?;
    debug!(items = selection.len(), sealed = options.seal.is_some(), "batch key ready");

    let batch = BatchContext {
        stores,
        owner: session.user_id(),
        key: &key,
        key_string: &key_string,
    };

    match selection {
        Selection::Empty => Err(TransferError::NoSelection),
        Selection::Files(items) => Ok(batch.upload_files(items, options.workers, progress).await),
        Selection::Folder { name, items } => batch.upload_folder(name, items, progress).await,
    }
}

fn batch_key_string(
    key: &SymmetricKey,
    seal: Option<&SealOptions>,
) -> TransferResult<Zeroizing<String>> {
    let exported = Zeroizing::new(export_key(key)?);
    match seal {
        Some(seal) => Ok(Zeroizing::new(seal_key_string(
            &exported,
            &seal.passphrase,
            &seal.params,
        )?)),
        None => Ok(exported),
    }
}

struct BatchContext<'a> {
    stores: &'a Stores,
    owner: &'a str,
    key: &'a SymmetricKey,
    key_string: &'a str,
}

impl BatchContext<'_> {
    async fn upload_files(
        &self,
        items: &[SelectedItem],
        workers: usize,
        progress: Option<&ProgressFn>,
    ) -> BatchReport {
        let total = items.len() as u64;
        let mut done = 0u64;
        let mut records = Vec::new();
        let mut failures = Vec::new();

        // `buffered` keeps results in selection order
        let mut results = stream::iter(items)
            .map(|item| async move {
                let result = self
                    .upload_item(item, RecordKind::File, item.relative_path.clone())
                    .await;
                (item, result)
            })
            .buffered(workers.max(1));

        while let Some((item, result)) = results.next().await {
            done += 1;
            match result {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(file = %item.name, "upload failed: {e}");
                    failures.push(ItemFailure {
                        name: item.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
            if let Some(cb) = progress {
                cb(done, total, &item.name);
            }
        }

        let status = match (records.len(), failures.len()) {
            (_, 0) => BatchStatus::Completed,
            (0, _) => BatchStatus::Failed,
            _ => BatchStatus::PartiallyFailed,
        };
        info!(
            succeeded = records.len(),
            failed = failures.len(),
            ?status,
            "batch finished"
        );

        BatchReport {
            mode: BatchMode::Files,
            status,
            succeeded: records.len(),
            failed: failures.len(),
            records,
            failures,
        }
    }

    async fn upload_folder(
        &self,
        folder: &str,
        items: &[SelectedItem],
        progress: Option<&ProgressFn>,
    ) -> TransferResult<BatchReport> {
        let archive = SelectedItem::new(archive_name(folder), pack_folder(items)?);
        debug!(folder = %folder, entries = items.len(), bytes = archive.data.len(), "folder packed");

        let record = self
            .upload_item(&archive, RecordKind::FolderArchive, Some(folder.to_string()))
            .await?;
        if let Some(cb) = progress {
            cb(1, 1, &archive.name);
        }
        info!(folder = %folder, record = %record.record_id, "folder batch finished");

        Ok(BatchReport {
            mode: BatchMode::Folder,
            status: BatchStatus::Completed,
            succeeded: 1,
            failed: 0,
            records: vec![record],
            failures: Vec::new(),
        })
    }

    /// Encrypt one item, store its blob under a fresh id, then write its record.
    async fn upload_item(
        &self,
        item: &SelectedItem,
        kind: RecordKind,
        relative_path: Option<String>,
    ) -> TransferResult<TransferRecord> {
        debug!(file = %item.name, bytes = item.data.len(), "encrypting");
        let envelope = encrypt(&item.data, self.key)?;

        let blob_id = Uuid::new_v4().to_string();
        debug!(file = %item.name, blob = %blob_id, "uploading");
        self.stores
            .blobs
            .put(&blob_id, envelope)
            .await
            .map_err(|e| upload_error(item, e))?;

        let record = TransferRecord {
            record_id: Uuid::new_v4().to_string(),
            owner_id: self.owner.to_string(),
            blob_id,
            file_name: item.name.clone(),
            encryption_key: self.key_string.to_string(),
            uploaded_at: now_millis(),
            size: Some(item.size()),
            content_type: Some(content_type_for(&item.name).to_string()),
            relative_path,
            kind,
        };
        self.stores
            .records
            .put_record(&record)
            .await
            .map_err(|e| upload_error(item, e))?;

        info!(file = %item.name, record = %record.record_id, "uploaded");
        Ok(record)
    }
}

fn upload_error(item: &SelectedItem, e: qvault_core::QvaultError) -> TransferError {
    TransferError::Upload {
        item: item.name.clone(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qvault_core::TransportSecurity;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn files(names: &[&str]) -> Selection {
        Selection::Files(
            names
                .iter()
                .map(|n| SelectedItem::new(*n, n.as_bytes().to_vec()))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_empty_selection_refused() {
        let stores = Stores::in_memory().unwrap();
        let mut session = Session::new("u", TransportSecurity::Local);

        let err = upload_batch(&mut session, &stores, &BatchOptions::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::NoSelection));
    }

    #[tokio::test]
    async fn test_insecure_transport_refused() {
        let stores = Stores::in_memory().unwrap();
        let mut session = Session::new("u", TransportSecurity::Plaintext);
        session.select(files(&["a.txt"]));

        let err = upload_batch(&mut session, &stores, &BatchOptions::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::InsecureContext));
        assert_eq!(session.selection().len(), 1, "selection kept on refusal");
        assert!(stores.records.list_by_owner("u").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disallowed_extension_refused_before_upload() {
        let stores = Stores::in_memory().unwrap();
        let mut session = Session::new("u", TransportSecurity::Local);
        session.select(files(&["a.txt", "b.exe"]));
        let options = BatchOptions {
            allowed_extensions: vec!["txt".into()],
            ..Default::default()
        };

        let err = upload_batch(&mut session, &stores, &options, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Selection(_)));
        assert!(stores.records.list_by_owner("u").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_files_batch_clears_selection_and_signals() {
        let stores = Stores::in_memory().unwrap();
        let mut session = Session::new("u", TransportSecurity::Tls);
        let rx = session.subscribe_refresh();
        session.select(files(&["a.txt", "b.md"]));

        let report = upload_batch(&mut session, &stores, &BatchOptions::default(), None)
            .await
            .unwrap();

        assert_eq!(report.status, BatchStatus::Completed);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.records[0].file_name, "a.txt");
        assert_eq!(report.records[1].content_type.as_deref(), Some("text/markdown"));
        assert!(session.selection().is_empty());
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_progress_reports_every_item_in_order() {
        let stores = Stores::in_memory().unwrap();
        let mut session = Session::new("u", TransportSecurity::Local);
        session.select(files(&["1.txt", "2.txt", "3.txt", "4.txt"]));

        let seen = Arc::new(AtomicU64::new(0));
        let seen_cb = seen.clone();
        let progress: ProgressFn = Box::new(move |done, total, _name| {
            assert_eq!(total, 4);
            assert_eq!(done, seen_cb.fetch_add(1, Ordering::SeqCst) + 1);
        });
        let options = BatchOptions {
            workers: 3,
            ..Default::default()
        };

        let report = upload_batch(&mut session, &stores, &options, Some(&progress))
            .await
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 4);
        let names: Vec<_> = report.records.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["1.txt", "2.txt", "3.txt", "4.txt"]);
    }

    #[tokio::test]
    async fn test_folder_batch_single_archive_record() {
        let stores = Stores::in_memory().unwrap();
        let mut session = Session::new("u", TransportSecurity::Loopback);
        session.select(Selection::Folder {
            name: "a".into(),
            items: vec![
                SelectedItem::new("x.txt", b"x".to_vec()).with_relative_path("a/x.txt"),
                SelectedItem::new("y.txt", b"y".to_vec()).with_relative_path("a/b/y.txt"),
            ],
        });

        let report = upload_batch(&mut session, &stores, &BatchOptions::default(), None)
            .await
            .unwrap();
        assert_eq!(report.mode, BatchMode::Folder);
        assert_eq!(report.records.len(), 1);

        let record = &report.records[0];
        assert_eq!(record.file_name, "a.zip");
        assert_eq!(record.kind, RecordKind::FolderArchive);
        assert_eq!(record.relative_path.as_deref(), Some("a"));
        assert_eq!(record.content_type.as_deref(), Some("application/zip"));
    }

    #[test]
    fn test_options_from_config() {
        let config = TransferConfig {
            workers: 0,
            allowed_extensions: vec!["txt".into()],
            ..Default::default()
        };
        let options = BatchOptions::from_config(&config)
            .with_seal(SecretString::from("pw"), &CryptoConfig::default());
        assert_eq!(options.workers, 1);
        assert!(options.seal.is_some());
        assert!(format!("{options:?}").contains("[REDACTED]"));
    }
}
