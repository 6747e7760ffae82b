//! Transfer record and profile documents
//!
//! Records live at `{prefix}/records/{record_id}.json`, profiles at
//! `{prefix}/profiles/{owner_id}.json`. Listing by owner scans the record
//! prefix and filters, which is fine at per-user scale.

use async_trait::async_trait;
use opendal::Operator;
use tracing::{debug, warn};

use qvault_core::{Profile, QvaultResult, TransferRecord};

use crate::{map_opendal, normalize_prefix, validate_id};

/// Document store for transfer records.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn put_record(&self, record: &TransferRecord) -> QvaultResult<()>;

    /// `Ok(None)` when no record has this id.
    async fn get_record(&self, record_id: &str) -> QvaultResult<Option<TransferRecord>>;

    /// Records owned by `owner_id`, newest first.
    async fn list_by_owner(&self, owner_id: &str) -> QvaultResult<Vec<TransferRecord>>;
}

/// Per-user profile documents.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, owner_id: &str) -> QvaultResult<Option<Profile>>;

    async fn put_profile(&self, profile: &Profile) -> QvaultResult<()>;
}

#[derive(Clone)]
pub struct OpendalMetadataStore {
    op: Operator,
    prefix: String,
}

impl OpendalMetadataStore {
    pub fn new(op: Operator, prefix: &str) -> Self {
        Self {
            op,
            prefix: normalize_prefix(prefix),
        }
    }

    fn records_dir(&self) -> String {
        format!("{}/records/", self.prefix)
    }

    fn record_path(&self, record_id: &str) -> String {
        format!("{}/records/{record_id}.json", self.prefix)
    }

    fn profile_path(&self, owner_id: &str) -> String {
        format!("{}/profiles/{owner_id}.json", self.prefix)
    }

    async fn read_optional(&self, path: &str) -> QvaultResult<Option<Vec<u8>>> {
        match self.op.read(path).await {
            Ok(buf) => Ok(Some(buf.to_vec())),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(map_opendal(format!("reading {path}"), e)),
        }
    }
}

/// Newest first; ties broken by record id for a stable order.
pub(crate) fn sort_newest_first(records: &mut [TransferRecord]) {
    records.sort_by(|a, b| {
        b.uploaded_at
            .cmp(&a.uploaded_at)
            .then_with(|| a.record_id.cmp(&b.record_id))
    });
}

#[async_trait]
impl MetadataStore for OpendalMetadataStore {
    async fn put_record(&self, record: &TransferRecord) -> QvaultResult<()> {
        validate_id("record", &record.record_id)?;
        let path = self.record_path(&record.record_id);
        self.op
            .write(&path, record.to_bytes()?)
            .await
            .map_err(|e| map_opendal(format!("writing record {path}"), e))?;
        debug!(record = %record.record_id, blob = %record.blob_id, "record stored");
        Ok(())
    }

    async fn get_record(&self, record_id: &str) -> QvaultResult<Option<TransferRecord>> {
        validate_id("record", record_id)?;
        match self.read_optional(&self.record_path(record_id)).await? {
            Some(bytes) => Ok(Some(TransferRecord::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list_by_owner(&self, owner_id: &str) -> QvaultResult<Vec<TransferRecord>> {
        let dir = self.records_dir();
        let entries = match self.op.list(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(map_opendal(format!("listing {dir}"), e)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let path = entry.path();
            if !path.ends_with(".json") {
                continue;
            }
            let Some(bytes) = self.read_optional(path).await? else {
                continue;
            };
            match TransferRecord::from_bytes(&bytes) {
                Ok(record) if record.owner_id == owner_id => records.push(record),
                Ok(_) => {}
                Err(e) => warn!(path = %path, "skipping unreadable record: {e}"),
            }
        }

        sort_newest_first(&mut records);
        Ok(records)
    }
}

#[async_trait]
impl ProfileStore for OpendalMetadataStore {
    async fn get_profile(&self, owner_id: &str) -> QvaultResult<Option<Profile>> {
        validate_id("owner", owner_id)?;
        match self.read_optional(&self.profile_path(owner_id)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_profile(&self, profile: &Profile) -> QvaultResult<()> {
        validate_id("owner", &profile.owner_id)?;
        let path = self.profile_path(&profile.owner_id);
        let bytes = serde_json::to_vec_pretty(profile)?;
        self.op
            .write(&path, bytes)
            .await
            .map_err(|e| map_opendal(format!("writing profile {path}"), e))?;
        Ok(())
    }
}
