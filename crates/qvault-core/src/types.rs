use serde::{Deserialize, Serialize};

/// What kind of logical item a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A single uploaded file
    #[default]
    File,
    /// A ZIP archive packed from a selected folder
    FolderArchive,
}

/// Metadata linking one uploaded blob to its owner and its key.
///
/// Records written by the same batch carry the same `encryption_key` string
/// by value; there is no batch entity to join on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub record_id: String,
    pub owner_id: String,
    pub blob_id: String,
    /// Original file name (or `<folder>.zip` for folder archives)
    pub file_name: String,
    /// Exported (or passphrase-sealed) key string
    pub encryption_key: String,
    /// Unix timestamp in milliseconds
    pub uploaded_at: u64,
    /// Plaintext size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Folder root name for archives, item path for folder members
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
    #[serde(default)]
    pub kind: RecordKind,
}

impl TransferRecord {
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_bytes(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}

/// Per-user profile document; currently only carries the vault gate hash
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_hash: Option<String>,
}

/// One file picked for upload
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedItem {
    pub name: String,
    /// Path relative to the selected folder's parent, `/`-separated
    pub relative_path: Option<String>,
    pub data: Vec<u8>,
}

impl SelectedItem {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            relative_path: None,
            data,
        }
    }

    pub fn with_relative_path(mut self, path: impl Into<String>) -> Self {
        self.relative_path = Some(path.into());
        self
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl std::fmt::Debug for SelectedItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedItem")
            .field("name", &self.name)
            .field("relative_path", &self.relative_path)
            .field("size", &self.data.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// Each item becomes its own blob and record
    Files,
    /// All items are packed into one archive blob
    Folder,
}

/// The user's current file selection
#[derive(Debug, Clone, Default)]
pub enum Selection {
    #[default]
    Empty,
    Files(Vec<SelectedItem>),
    Folder {
        /// Folder root name; the archive is stored as `<name>.zip`
        name: String,
        items: Vec<SelectedItem>,
    },
}

impl Selection {
    pub fn mode(&self) -> Option<BatchMode> {
        match self {
            Selection::Empty => None,
            Selection::Files(_) => Some(BatchMode::Files),
            Selection::Folder { .. } => Some(BatchMode::Folder),
        }
    }

    pub fn items(&self) -> &[SelectedItem] {
        match self {
            Selection::Empty => &[],
            Selection::Files(items) | Selection::Folder { items, .. } => items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }
}

/// Current time as Unix milliseconds
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> TransferRecord {
        TransferRecord {
            record_id: "rec-1".into(),
            owner_id: "user-1".into(),
            blob_id: "blob-1".into(),
            file_name: "notes.txt".into(),
            encryption_key: "{\"kty\":\"oct\"}".into(),
            uploaded_at: 1_700_000_000_000,
            size: Some(12),
            content_type: Some("text/plain".into()),
            relative_path: None,
            kind: RecordKind::File,
        }
    }

    #[test]
    fn test_record_roundtrip() {
        let record = sample_record();
        let bytes = record.to_bytes().unwrap();
        let parsed = TransferRecord::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_record_optional_fields_default() {
        let json = r#"{
            "record_id": "r", "owner_id": "o", "blob_id": "b",
            "file_name": "f.bin", "encryption_key": "k", "uploaded_at": 5
        }"#;
        let parsed = TransferRecord::from_bytes(json.as_bytes()).unwrap();
        assert_eq!(parsed.size, None);
        assert_eq!(parsed.kind, RecordKind::File);
    }

    #[test]
    fn test_record_kind_serialized_snake_case() {
        let mut record = sample_record();
        record.kind = RecordKind::FolderArchive;
        let json = String::from_utf8(record.to_bytes().unwrap()).unwrap();
        assert!(json.contains("\"folder_archive\""));
    }

    #[test]
    fn test_selection_modes() {
        assert!(Selection::Empty.is_empty());
        assert_eq!(Selection::Empty.mode(), None);

        let files = Selection::Files(vec![SelectedItem::new("a.txt", b"a".to_vec())]);
        assert_eq!(files.mode(), Some(BatchMode::Files));
        assert_eq!(files.len(), 1);

        let folder = Selection::Folder {
            name: "docs".into(),
            items: vec![],
        };
        assert_eq!(folder.mode(), Some(BatchMode::Folder));
        assert!(folder.is_empty(), "folder with no items counts as empty");
    }

    #[test]
    fn test_selected_item_debug_hides_content() {
        let item = SelectedItem::new("secret.txt", b"top secret".to_vec());
        let dbg = format!("{item:?}");
        assert!(!dbg.contains("top secret"));
        assert!(dbg.contains("size: 10"));
    }
}
