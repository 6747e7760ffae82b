//! qvault-transfer: the encrypted transfer pipeline
//!
//! - `batch`: upload a session's selection under one fresh key
//! - `archive`: pack folder selections into a single ZIP item
//! - `collect`: turn local paths into a selection
//! - `retrieve`: fetch, decrypt and save files
//! - `gate`: passphrase lock in front of the vault

pub mod archive;
pub mod batch;
pub mod collect;
pub mod error;
pub mod gate;
pub mod mime;
pub mod retrieve;

pub use batch::{
    kdf_params, upload_batch, BatchOptions, BatchReport, BatchStatus, ItemFailure, ProgressFn,
    SealOptions,
};
pub use error::{TransferError, TransferResult};
pub use gate::{create_gate, open_vault, unlock, VaultStatus};
pub use retrieve::{download, download_record, list_files, save_reconstructed, Reconstructed};
