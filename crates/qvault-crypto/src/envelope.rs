//! AES-256-GCM envelope encryption/decryption
//!
//! Envelope format (binary):
//! ```text
//! [12 bytes: random nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! Callers treat everything after the nonce as one opaque region; the AEAD
//! primitive splits ciphertext from tag internally.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::SymmetricKey;
use crate::{NONCE_SIZE, TAG_SIZE};

/// Encrypt one buffer under `key`.
///
/// A fresh random nonce is drawn for every call, so encrypting the same
/// plaintext twice yields different envelopes.
///
/// Returns: `[12-byte nonce][ciphertext][16-byte tag]`
pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Encryption(format!("AES-GCM seal failed: {e}")))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt an envelope produced by [`encrypt`].
///
/// Fails closed with [`CryptoError::Integrity`] on truncation, tampering, or
/// a wrong key; no partial plaintext is ever returned.
pub fn decrypt(envelope: &[u8], key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
    if envelope.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Integrity(format!(
            "envelope too short: {} bytes (minimum {})",
            envelope.len(),
            NONCE_SIZE + TAG_SIZE
        )));
    }

    let (nonce_bytes, ciphertext) = envelope.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    cipher.decrypt(nonce, ciphertext).map_err(|_| {
        CryptoError::Integrity("authentication tag mismatch: wrong key or corrupted data".into())
    })
}
