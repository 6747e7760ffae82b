//! Vault gate passphrase hashing
//!
//! The stored hash is a PHC string (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`).
//! Verification re-derives the hash with the stored salt and parameters and
//! compares the outputs in constant time.

use argon2::password_hash::{PasswordHash, PasswordHasher, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::KdfParams;

/// Hash a new vault passphrase with a random salt.
pub fn hash_passphrase(passphrase: &SecretString, params: &KdfParams) -> CryptoResult<String> {
    if passphrase.expose_secret().is_empty() {
        return Err(CryptoError::Gate("passphrase must not be empty".into()));
    }

    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| CryptoError::Gate(format!("encoding salt: {e}")))?;
    let argon2 = params.argon2(None)?;
    let hash = argon2
        .hash_password(passphrase.expose_secret().as_bytes(), &salt)
        .map_err(|e| CryptoError::Gate(format!("hashing passphrase: {e}")))?;
    Ok(hash.to_string())
}

/// Check an entered passphrase against a stored PHC hash.
///
/// Returns `Ok(false)` on mismatch; errors only when the stored hash itself
/// cannot be parsed.
pub fn verify_passphrase(entry: &str, stored: &str) -> CryptoResult<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| CryptoError::Gate(format!("stored gate hash is malformed: {e}")))?;
    let expected = parsed
        .hash
        .ok_or_else(|| CryptoError::Gate("stored gate hash has no output".into()))?;
    let salt = parsed
        .salt
        .ok_or_else(|| CryptoError::Gate("stored gate hash has no salt".into()))?;

    let algorithm = Algorithm::try_from(parsed.algorithm)
        .map_err(|e| CryptoError::Gate(format!("unsupported gate algorithm: {e}")))?;
    let version = match parsed.version {
        Some(v) => Version::try_from(v)
            .map_err(|e| CryptoError::Gate(format!("unsupported gate version: {e}")))?,
        None => Version::default(),
    };
    let params = Params::try_from(&parsed)
        .map_err(|e| CryptoError::Gate(format!("invalid gate params: {e}")))?;

    let computed = Argon2::new(algorithm, version, params)
        .hash_password(entry.as_bytes(), salt)
        .map_err(|e| CryptoError::Gate(format!("hashing entry: {e}")))?;
    let Some(actual) = computed.hash else {
        return Ok(false);
    };

    Ok(actual.as_bytes().ct_eq(expected.as_bytes()).into())
}
