//! qvault-crypto: client-side encryption for qvault transfers
//!
//! Every upload batch gets one fresh AES-256-GCM key. Each item in the batch
//! is sealed into a self-contained envelope:
//! ```text
//! [12 bytes: random nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//! The key is exported as a JSON Web Key string and stored next to the blob
//! reference in the metadata record. Optionally the exported key is sealed
//! under an Argon2id key derived from the user's vault passphrase.
//!
//! The vault gate hashes a passphrase with Argon2id (PHC string) and only
//! controls access to the transfer screens; it never touches batch keys.

pub mod envelope;
pub mod error;
pub mod gate;
pub mod kdf;
pub mod keys;
pub mod seal;

pub use envelope::{decrypt, encrypt};
pub use error::{CryptoError, CryptoResult};
pub use gate::{hash_passphrase, verify_passphrase};
pub use kdf::{derive_wrap_key, KdfParams};
pub use keys::{export_key, generate_batch_key, import_key, SymmetricKey};
pub use seal::{is_sealed, seal_key_string, unseal_key_string};

/// Size of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;
