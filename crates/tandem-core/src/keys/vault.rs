//! Deterministic account keys derived from a BIP-39 mnemonic.
//!
//! Every account index maps to the BIP-44 path `m/44'/60'/0'/0/{index}`, so the
//! same mnemonic and index always produce the same key. Keys are derived on
//! first use and cached for the lifetime of the vault; nothing is written to disk.

use crate::keys::transaction::TxSigner;
use alloy_primitives::Address;
use alloy_signer_local::{coins_bip39::English, MnemonicBuilder, PrivateKeySigner};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors from key derivation and signing.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Mnemonic is empty")]
    EmptyMnemonic,

    #[error("Failed to derive key for account {index} at {path}: {reason}")]
    Derivation {
        index: u32,
        path: String,
        reason: String,
    },

    #[error("Account {index} holds the key for {expected}, not authorized to sign for {requested}")]
    UnauthorizedSigner {
        index: u32,
        expected: Address,
        requested: Address,
    },

    #[error("Signing with account {index} failed: {reason}")]
    Signing { index: u32, reason: String },
}

/// BIP-44 path of an Ethereum account index.
pub fn derivation_path(index: u32) -> String {
    format!("m/44'/60'/0'/0/{}", index)
}

/// Derive the key of `index` from `mnemonic`. Pure: no caching.
pub fn derive_key(mnemonic: &str, index: u32) -> Result<KeyEntry, KeyError> {
    if mnemonic.trim().is_empty() {
        return Err(KeyError::EmptyMnemonic);
    }

    let path = derivation_path(index);
    let signer = MnemonicBuilder::<English>::default()
        .phrase(mnemonic)
        .derivation_path(path.as_str())
        .and_then(|builder| builder.build())
        .map_err(|e| KeyError::Derivation {
            index,
            path: path.clone(),
            reason: e.to_string(),
        })?;

    Ok(KeyEntry {
        index,
        path,
        signer,
    })
}

/// One derived account: its index, path and private signer.
#[derive(Clone)]
pub struct KeyEntry {
    index: u32,
    path: String,
    signer: PrivateKeySigner,
}

impl KeyEntry {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub(crate) fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

// Private material never reaches logs
impl fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyEntry")
            .field("index", &self.index)
            .field("path", &self.path)
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Per-session cache of derived account keys.
///
/// The cache lock is held across derivation, so each index is derived at most
/// once even when many callers ask for it at the same time.
pub struct KeyVault {
    mnemonic: String,
    keys: Mutex<HashMap<u32, Arc<KeyEntry>>>,
}

impl KeyVault {
    pub fn new(mnemonic: impl Into<String>) -> Result<Self, KeyError> {
        let mnemonic = mnemonic.into();
        if mnemonic.trim().is_empty() {
            return Err(KeyError::EmptyMnemonic);
        }
        Ok(Self {
            mnemonic,
            keys: Mutex::new(HashMap::new()),
        })
    }

    /// Return the cached key for `index`, deriving it on first use.
    pub fn key(&self, index: u32) -> Result<Arc<KeyEntry>, KeyError> {
        let mut keys = self.keys.lock();
        if let Some(entry) = keys.get(&index) {
            return Ok(Arc::clone(entry));
        }

        let entry = Arc::new(derive_key(&self.mnemonic, index)?);
        debug!(index, address = %entry.address(), "derived account key");
        keys.insert(index, Arc::clone(&entry));
        Ok(entry)
    }

    /// Address of account `index`, the `from` of its transactions.
    pub fn address(&self, index: u32) -> Result<Address, KeyError> {
        Ok(self.key(index)?.address())
    }

    /// A signer for account `index`, bound to `chain_id`.
    pub fn signer(&self, chain_id: u64, index: u32) -> Result<TxSigner, KeyError> {
        Ok(TxSigner::new(chain_id, self.key(index)?))
    }

    /// Number of keys derived so far.
    pub fn cached(&self) -> usize {
        self.keys.lock().len()
    }
}

impl fmt::Debug for KeyVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyVault")
            .field("cached", &self.cached())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TEST_MNEMONIC;
    use alloy_primitives::address;
    use std::thread;

    #[test]
    fn test_derivation_path_format() {
        assert_eq!(derivation_path(0), "m/44'/60'/0'/0/0");
        assert_eq!(derivation_path(5), "m/44'/60'/0'/0/5");
    }

    #[test]
    fn test_known_first_account() {
        // First account of the well-known development mnemonic
        let key = derive_key(TEST_MNEMONIC, 0).unwrap();
        assert_eq!(
            key.address(),
            address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
        );
    }

    #[test]
    fn test_index_zero_and_five_differ_and_repeat() {
        let vault = KeyVault::new(TEST_MNEMONIC).unwrap();
        let first = vault.address(0).unwrap();
        let fifth = vault.address(5).unwrap();
        let again = vault.address(0).unwrap();

        assert_ne!(first, fifth);
        assert_eq!(first, again);
        // Cached and freshly derived keys agree
        assert_eq!(derive_key(TEST_MNEMONIC, 5).unwrap().address(), fifth);
        assert_eq!(vault.cached(), 2);
    }

    #[test]
    fn test_repeated_lookup_returns_same_entry() {
        let vault = KeyVault::new(TEST_MNEMONIC).unwrap();
        let a = vault.key(3).unwrap();
        let b = vault.key(3).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.index(), 3);
        assert_eq!(a.path(), "m/44'/60'/0'/0/3");
    }

    #[test]
    fn test_concurrent_derivation_keeps_every_entry() {
        let vault = KeyVault::new(TEST_MNEMONIC).unwrap();

        let entries: Vec<Arc<KeyEntry>> = thread::scope(|s| {
            let handles: Vec<_> = (0..8u32)
                .map(|i| {
                    let vault = &vault;
                    // Two threads per index race on the same cache slot
                    s.spawn(move || vault.key(i % 4).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(vault.cached(), 4);
        for i in 0..4 {
            assert!(Arc::ptr_eq(&entries[i], &entries[i + 4]));
            assert!(Arc::ptr_eq(&entries[i], &vault.key(i as u32).unwrap()));
        }
    }

    #[test]
    fn test_empty_mnemonic_rejected() {
        assert!(matches!(KeyVault::new("  "), Err(KeyError::EmptyMnemonic)));
        assert!(matches!(derive_key("", 0), Err(KeyError::EmptyMnemonic)));
    }

    #[test]
    fn test_invalid_mnemonic_reports_index() {
        let vault = KeyVault::new("not a real mnemonic phrase at all").unwrap();
        let err = vault.key(7).unwrap_err();
        assert!(matches!(err, KeyError::Derivation { index: 7, .. }));
        assert_eq!(vault.cached(), 0);
    }

    #[test]
    fn test_debug_hides_secret() {
        let key = derive_key(TEST_MNEMONIC, 0).unwrap();
        let rendered = format!("{:?}", key);
        assert!(rendered.contains("m/44'/60'/0'/0/0"));
        let secret = hex::encode(key.signer().to_bytes());
        assert!(!rendered.contains(&secret));

        let vault = KeyVault::new(TEST_MNEMONIC).unwrap();
        assert!(!format!("{:?}", vault).contains("test"));
    }
}
