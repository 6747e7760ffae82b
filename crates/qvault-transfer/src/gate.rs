//! Vault gate: a passphrase lock in front of the transfer screens.
//!
//! The gate hash lives in the user's profile. It is compared, never used to
//! derive batch keys.

use secrecy::SecretString;
use tracing::{info, warn};
use zeroize::Zeroize;

use qvault_core::{Profile, Session};
use qvault_crypto::{hash_passphrase, verify_passphrase, CryptoError, KdfParams};
use qvault_storage::Stores;

use crate::error::TransferResult;

/// Where opening the vault should route the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultStatus {
    /// No gate yet; ask for a new passphrase
    NeedsCreate,
    /// Gate exists; ask for the passphrase
    NeedsUnlock,
}

pub async fn open_vault(session: &Session, stores: &Stores) -> TransferResult<VaultStatus> {
    Ok(match stored_hash(session, stores).await? {
        Some(_) => VaultStatus::NeedsUnlock,
        None => VaultStatus::NeedsCreate,
    })
}

/// Hash `passphrase` and store it as the session user's gate.
///
/// Refuses to replace an existing gate.
pub async fn create_gate(
    session: &Session,
    stores: &Stores,
    passphrase: &SecretString,
    params: &KdfParams,
) -> TransferResult<String> {
    let mut profile = stores
        .profiles
        .get_profile(session.user_id())
        .await?
        .unwrap_or_else(|| Profile {
            owner_id: session.user_id().to_string(),
            vault_hash: None,
        });
    if profile.vault_hash.is_some() {
        return Err(CryptoError::Gate("a vault gate already exists".into()).into());
    }

    let hash = hash_passphrase(passphrase, params)?;
    profile.vault_hash = Some(hash.clone());
    stores.profiles.put_profile(&profile).await?;

    info!(user = %session.user_id(), "vault gate created");
    Ok(hash)
}

/// Check `entry` against the stored gate.
///
/// On mismatch the entry buffer is zeroized and cleared. The stored hash is
/// never modified.
pub async fn unlock(session: &Session, stores: &Stores, entry: &mut String) -> TransferResult<bool> {
    let Some(stored) = stored_hash(session, stores).await? else {
        entry.zeroize();
        return Err(CryptoError::Gate("no vault gate has been created".into()).into());
    };

    let ok = match verify_passphrase(entry.as_str(), &stored) {
        Ok(ok) => ok,
        Err(e) => {
            entry.zeroize();
            return Err(e.into());
        }
    };
    if ok {
        info!(user = %session.user_id(), "vault unlocked");
    } else {
        entry.zeroize();
        warn!(user = %session.user_id(), "vault unlock rejected");
    }
    Ok(ok)
}

async fn stored_hash(session: &Session, stores: &Stores) -> TransferResult<Option<String>> {
    Ok(stores
        .profiles
        .get_profile(session.user_id())
        .await?
        .and_then(|p| p.vault_hash))
}
