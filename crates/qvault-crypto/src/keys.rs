//! Batch key generation and JSON Web Key export/import

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::KEY_SIZE;

const JWK_KTY: &str = "oct";
const JWK_ALG: &str = "A256GCM";

/// A 256-bit AES-GCM key shared by every item in one batch. Zeroized on drop.
#[derive(Clone)]
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a fresh batch key from the operating system CSPRNG.
pub fn generate_batch_key() -> CryptoResult<SymmetricKey> {
    let mut bytes = [0u8; KEY_SIZE];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CryptoError::KeyGeneration(format!("OS randomness unavailable: {e}")))?;
    Ok(SymmetricKey::from_bytes(bytes))
}

/// JWK for a symmetric key. Field order matches what browsers emit from
/// `crypto.subtle.exportKey("jwk", ..)`.
#[derive(Serialize, Deserialize)]
struct Jwk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ext: Option<bool>,
    k: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key_ops: Option<Vec<String>>,
    kty: String,
}

impl Drop for Jwk {
    fn drop(&mut self) {
        self.k.zeroize();
    }
}

/// Serialize a key to its JSON Web Key text form.
pub fn export_key(key: &SymmetricKey) -> CryptoResult<String> {
    let jwk = Jwk {
        alg: Some(JWK_ALG.into()),
        ext: Some(true),
        k: URL_SAFE_NO_PAD.encode(key.as_bytes()),
        key_ops: Some(vec!["encrypt".into(), "decrypt".into()]),
        kty: JWK_KTY.into(),
    };
    serde_json::to_string(&jwk).map_err(|e| CryptoError::KeyFormat(format!("serializing JWK: {e}")))
}

/// Parse a JSON Web Key produced by [`export_key`] (or a browser).
pub fn import_key(exported: &str) -> CryptoResult<SymmetricKey> {
    let jwk: Jwk = serde_json::from_str(exported)
        .map_err(|e| CryptoError::KeyFormat(format!("not a JWK object: {e}")))?;

    if jwk.kty != JWK_KTY {
        return Err(CryptoError::KeyFormat(format!(
            "unsupported key type '{}' (expected '{JWK_KTY}')",
            jwk.kty
        )));
    }
    if let Some(alg) = &jwk.alg {
        if alg != JWK_ALG {
            return Err(CryptoError::KeyFormat(format!(
                "unsupported algorithm '{alg}' (expected '{JWK_ALG}')"
            )));
        }
    }

    let mut raw = URL_SAFE_NO_PAD
        .decode(jwk.k.trim_end_matches('='))
        .map_err(|e| CryptoError::KeyFormat(format!("key material is not base64url: {e}")))?;

    if raw.len() != KEY_SIZE {
        let len = raw.len();
        raw.zeroize();
        return Err(CryptoError::KeyFormat(format!(
            "key material has wrong size: {len} bytes (expected {KEY_SIZE})"
        )));
    }

    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&raw);
    raw.zeroize();
    Ok(SymmetricKey::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_keys_differ() {
        let k1 = generate_batch_key().unwrap();
        let k2 = generate_batch_key().unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes(), "random keys must differ");
    }

    #[test]
    fn test_export_import_roundtrip() {
        let key = generate_batch_key().unwrap();
        let exported = export_key(&key).unwrap();
        let imported = import_key(&exported).unwrap();
        assert_eq!(key.as_bytes(), imported.as_bytes());
    }

    #[test]
    fn test_export_is_structured_jwk() {
        let key = SymmetricKey::from_bytes([7u8; KEY_SIZE]);
        let exported = export_key(&key).unwrap();
        let value: serde_json::Value = serde_json::from_str(&exported).unwrap();

        assert_eq!(value["kty"], "oct");
        assert_eq!(value["alg"], "A256GCM");
        assert_eq!(value["ext"], true);
        assert_eq!(value["key_ops"][0], "encrypt");
        // 32 bytes → 43 base64url chars without padding
        assert_eq!(value["k"].as_str().unwrap().len(), 43);
    }

    #[test]
    fn test_import_browser_style_jwk() {
        let jwk = r#"{"alg":"A256GCM","ext":true,"k":"AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8","key_ops":["encrypt","decrypt"],"kty":"oct"}"#;
        let key = import_key(jwk).unwrap();
        let expected: Vec<u8> = (0u8..32).collect();
        assert_eq!(key.as_bytes().as_slice(), expected.as_slice());
    }

    #[test]
    fn test_import_rejects_malformed() {
        let cases = [
            "",
            "not json",
            "{}",
            r#"{"kty":"RSA","k":"AAAA"}"#,
            r#"{"kty":"oct","alg":"A128GCM","k":"AAECAwQFBgcICQoLDA0ODw"}"#,
            r#"{"kty":"oct","k":"!!!not base64!!!"}"#,
            r#"{"kty":"oct","k":"AAECAwQFBgcICQoLDA0ODw"}"#,
        ];
        for case in cases {
            let result = import_key(case);
            assert!(
                matches!(result, Err(CryptoError::KeyFormat(_))),
                "expected KeyFormat for {case:?}"
            );
        }
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = SymmetricKey::from_bytes([0xAB; KEY_SIZE]);
        let dbg = format!("{key:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("171"));
    }
}
