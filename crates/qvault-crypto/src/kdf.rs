//! Key derivation: Argon2id passphrase → key-wrapping key

use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};
use crate::keys::SymmetricKey;
use crate::KEY_SIZE;

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    pub(crate) fn argon2(&self, output_len: Option<usize>) -> CryptoResult<Argon2<'static>> {
        let params = Params::new(self.mem_cost_kib, self.time_cost, self.parallelism, output_len)
            .map_err(|e| CryptoError::KeyGeneration(format!("invalid Argon2id params: {e}")))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Derive a 256-bit key-wrapping key from a passphrase and salt using Argon2id.
///
/// The salt should be 16 random bytes stored next to the wrapped data; it
/// does not need to be secret.
pub fn derive_wrap_key(
    passphrase: &SecretString,
    salt: &[u8; 16],
    params: &KdfParams,
) -> CryptoResult<SymmetricKey> {
    let argon2 = params.argon2(Some(KEY_SIZE))?;

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(passphrase.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|e| CryptoError::KeyGeneration(format!("Argon2id KDF failed: {e}")))?;

    Ok(SymmetricKey::from_bytes(key))
}

#[cfg(test)]
pub(crate) fn fast_params() -> KdfParams {
    KdfParams {
        mem_cost_kib: 1024,
        time_cost: 1,
        parallelism: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kdf_deterministic() {
        let passphrase = SecretString::from("test-passphrase-123");
        let salt = [1u8; 16];

        let key1 = derive_wrap_key(&passphrase, &salt, &fast_params()).unwrap();
        let key2 = derive_wrap_key(&passphrase, &salt, &fast_params()).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes(), "KDF must be deterministic");
    }

    #[test]
    fn test_kdf_different_passphrases() {
        let salt = [1u8; 16];

        let key1 = derive_wrap_key(&SecretString::from("passphrase-a"), &salt, &fast_params()).unwrap();
        let key2 = derive_wrap_key(&SecretString::from("passphrase-b"), &salt, &fast_params()).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_kdf_different_salts() {
        let passphrase = SecretString::from("same-passphrase");

        let key1 = derive_wrap_key(&passphrase, &[1u8; 16], &fast_params()).unwrap();
        let key2 = derive_wrap_key(&passphrase, &[2u8; 16], &fast_params()).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = KdfParams {
            mem_cost_kib: 1,
            time_cost: 0,
            parallelism: 0,
        };
        let result = derive_wrap_key(&SecretString::from("x"), &[0u8; 16], &params);
        assert!(matches!(result, Err(CryptoError::KeyGeneration(_))));
    }
}
