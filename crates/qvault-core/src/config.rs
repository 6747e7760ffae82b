use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{QvaultError, QvaultResult};

/// Top-level client configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QvaultConfig {
    pub log: LogConfig,
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub transfer: TransferConfig,
    pub crypto: CryptoConfig,
}

impl QvaultConfig {
    /// Load a config file, falling back to defaults if it does not exist.
    pub fn load(path: &Path) -> QvaultResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| QvaultError::Config(format!("parsing {}: {e}", path.display())))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level filter (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

/// Which backend serves blobs, records, and profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local maps; nothing survives the process
    Memory,
    /// Local filesystem under `storage.root`
    Fs,
    /// S3-compatible object storage at `storage.endpoint`
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// S3 endpoint URL
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// Bucket holding blobs, records, and profiles
    pub bucket: String,
    /// Root directory for the fs backend
    pub root: PathBuf,
    /// Key prefix inside the bucket/root
    pub prefix: String,
    /// Refuse plaintext HTTP endpoints instead of only warning
    pub enforce_tls: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Owner identifier stamped on every record
    pub user_id: Option<String>,
    /// Human-readable name shown by the CLI
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Concurrent per-item uploads within one batch (1 = strictly sequential)
    pub workers: usize,
    /// Accepted file extensions without the dot; empty accepts everything
    pub allowed_extensions: Vec<String>,
    /// Glob patterns excluded when walking a folder
    pub exclude_patterns: Vec<String>,
    /// Include dotfiles and dot-directories when walking a folder
    pub include_hidden: bool,
}

/// Vault gate and key-protection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
    /// Seal exported batch keys with a passphrase-derived key before storing them
    pub wrap_with_passphrase: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::S3,
            endpoint: "https://localhost:9000".into(),
            region: "us-east-1".into(),
            bucket: "qvault".into(),
            root: PathBuf::from("~/.local/share/qvault/store"),
            prefix: "qvault".into(),
            enforce_tls: false,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            allowed_extensions: Vec::new(),
            exclude_patterns: Vec::new(),
            include_hidden: false,
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            argon2_mem_cost_kib: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
            wrap_with_passphrase: false,
        }
    }
}
