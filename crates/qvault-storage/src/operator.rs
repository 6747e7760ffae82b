//! OpenDAL Operator factory for qvault storage backends

use anyhow::{Context, Result};
use opendal::Operator;
use std::path::Path;

use qvault_core::config::{StorageBackend, StorageConfig};

/// Access keys for S3-compatible endpoints
#[derive(Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

/// In-memory operator (tests and throwaway sessions)
pub fn memory_operator() -> Result<Operator> {
    Ok(Operator::new(opendal::services::Memory::default())
        .context("creating OpenDAL memory operator")?
        .finish())
}

/// Build an OpenDAL Operator for any S3-compatible endpoint.
///
/// Uses path-style addressing (default in opendal 0.55), which MinIO and
/// SeaweedFS require.
pub fn build_s3_operator(storage: &StorageConfig, creds: &S3Credentials) -> Result<Operator> {
    // opendal 0.55: S3 builder uses consuming pattern (methods take `self`, return `Self`)
    let builder = opendal::services::S3::default()
        .endpoint(&storage.endpoint)
        .region(&storage.region)
        .bucket(&storage.bucket)
        .access_key_id(&creds.access_key_id)
        .secret_access_key(&creds.secret_access_key);

    let op = Operator::new(builder)
        .context("creating OpenDAL S3 operator")?
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(3)
                .with_jitter(),
        )
        .finish();

    Ok(op)
}

/// Build an operator rooted at a local directory.
pub fn build_fs_operator(root: &Path) -> Result<Operator> {
    let builder = opendal::services::Fs::default().root(&root.to_string_lossy());
    let op = Operator::new(builder)
        .with_context(|| format!("creating OpenDAL fs operator at {}", root.display()))?
        .layer(opendal::layers::LoggingLayer::default())
        .finish();
    Ok(op)
}

/// Build the operator for the configured backend.
pub fn build_operator(storage: &StorageConfig, creds: Option<&S3Credentials>) -> Result<Operator> {
    match storage.backend {
        StorageBackend::Memory => memory_operator(),
        StorageBackend::Fs => build_fs_operator(&storage.root),
        StorageBackend::S3 => {
            let creds = creds.context(
                "S3 credentials not set\n\
                 Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY environment variables.",
            )?;
            build_from_core_config(storage, creds)
        }
    }
}

/// Build an S3 operator, applying the TLS policy.
///
/// If `enforce_tls` is true and the endpoint uses HTTP, this returns an error.
/// Otherwise, a warning is logged for non-HTTPS endpoints.
pub fn build_from_core_config(storage: &StorageConfig, creds: &S3Credentials) -> Result<Operator> {
    if uses_plain_http(&storage.endpoint) {
        if storage.enforce_tls {
            anyhow::bail!(
                "S3 endpoint uses plaintext HTTP ({}), but enforce_tls is enabled. \
                 Use an HTTPS endpoint or set storage.enforce_tls = false for local development.",
                storage.endpoint
            );
        }
        tracing::warn!(
            endpoint = %storage.endpoint,
            "S3 endpoint uses plaintext HTTP; uploads are refused unless it is a loopback address"
        );
    }

    build_s3_operator(storage, creds)
}

fn uses_plain_http(endpoint: &str) -> bool {
    match url::Url::parse(endpoint.trim()) {
        Ok(url) => url.scheme() == "http",
        Err(_) => endpoint
            .trim()
            .get(..7)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("http://")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> S3Credentials {
        S3Credentials {
            access_key_id: "test-key".into(),
            secret_access_key: "test-secret".into(),
        }
    }

    #[test]
    fn test_build_s3_operator_valid() {
        let storage = StorageConfig {
            endpoint: "https://s3.example.com".into(),
            ..Default::default()
        };
        assert!(build_operator(&storage, Some(&creds())).is_ok());
    }

    #[test]
    fn test_s3_requires_credentials() {
        let storage = StorageConfig::default();
        let err = build_operator(&storage, None).unwrap_err();
        assert!(err.to_string().contains("credentials"));
    }

    #[test]
    fn test_http_warning_only() {
        let storage = StorageConfig {
            endpoint: "http://localhost:9000".into(),
            enforce_tls: false,
            ..Default::default()
        };
        assert!(build_from_core_config(&storage, &creds()).is_ok());
    }

    #[test]
    fn test_http_enforce_tls() {
        let storage = StorageConfig {
            endpoint: "http://insecure:9000".into(),
            enforce_tls: true,
            ..Default::default()
        };
        let result = build_from_core_config(&storage, &creds());
        assert!(result.is_err(), "HTTP + enforce_tls must fail");
        assert!(result.unwrap_err().to_string().contains("enforce_tls"));
    }

    #[test]
    fn test_http_enforce_tls_uppercase_scheme() {
        let storage = StorageConfig {
            endpoint: "HTTP://insecure.example:9000".into(),
            enforce_tls: true,
            ..Default::default()
        };
        let result = build_from_core_config(&storage, &creds());
        assert!(result.is_err(), "uppercase HTTP scheme must still be refused");
    }

    #[test]
    fn test_fs_backend() {
        let tmp = tempfile::TempDir::new().unwrap();
        let storage = StorageConfig {
            backend: StorageBackend::Fs,
            root: tmp.path().to_path_buf(),
            ..Default::default()
        };
        assert!(build_operator(&storage, None).is_ok());
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let dbg = format!("{:?}", creds());
        assert!(!dbg.contains("test-secret"));
    }
}
