//! Passphrase sealing of exported batch keys
//!
//! When enabled, the JWK text stored in a transfer record is replaced by a
//! small JSON wrapper holding the AES-GCM envelope of the JWK under an
//! Argon2id-derived key. Whoever reads the metadata store then also needs the
//! vault passphrase to decrypt the blob.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::envelope::{decrypt, encrypt};
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{derive_wrap_key, KdfParams};

const SEAL_ALG: &str = "argon2id+A256GCM";
const SEAL_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SealedKey {
    v: u32,
    alg: String,
    kdf: KdfParams,
    /// base64 16-byte Argon2id salt
    salt: String,
    /// base64 envelope of the JWK text
    data: String,
}

/// Seal an exported key string under `passphrase`.
pub fn seal_key_string(
    exported: &str,
    passphrase: &SecretString,
    params: &KdfParams,
) -> CryptoResult<String> {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);

    let wrap_key = derive_wrap_key(passphrase, &salt, params)?;
    let envelope = encrypt(exported.as_bytes(), &wrap_key)?;

    let sealed = SealedKey {
        v: SEAL_VERSION,
        alg: SEAL_ALG.into(),
        kdf: *params,
        salt: STANDARD.encode(salt),
        data: STANDARD.encode(envelope),
    };
    serde_json::to_string(&sealed)
        .map_err(|e| CryptoError::KeyFormat(format!("serializing sealed key: {e}")))
}

/// Recover the exported key string sealed by [`seal_key_string`].
///
/// A wrong passphrase surfaces as [`CryptoError::Integrity`].
pub fn unseal_key_string(sealed: &str, passphrase: &SecretString) -> CryptoResult<String> {
    let parsed = parse_sealed(sealed)
        .ok_or_else(|| CryptoError::KeyFormat("not a sealed key string".into()))?;

    let salt_vec = STANDARD
        .decode(&parsed.salt)
        .map_err(|e| CryptoError::KeyFormat(format!("sealed key salt: {e}")))?;
    let salt: [u8; 16] = salt_vec
        .try_into()
        .map_err(|_| CryptoError::KeyFormat("sealed key salt must be 16 bytes".into()))?;
    let envelope = STANDARD
        .decode(&parsed.data)
        .map_err(|e| CryptoError::KeyFormat(format!("sealed key data: {e}")))?;

    let wrap_key = derive_wrap_key(passphrase, &salt, &parsed.kdf)?;
    let plaintext = decrypt(&envelope, &wrap_key)?;

    String::from_utf8(plaintext).map_err(|e| {
        e.into_bytes().zeroize();
        CryptoError::KeyFormat("sealed key is not UTF-8".into())
    })
}

/// Whether a stored key string is a passphrase-sealed wrapper.
pub fn is_sealed(stored: &str) -> bool {
    parse_sealed(stored).is_some()
}

fn parse_sealed(stored: &str) -> Option<SealedKey> {
    serde_json::from_str::<SealedKey>(stored)
        .ok()
        .filter(|s| s.alg == SEAL_ALG && s.v == SEAL_VERSION)
}
