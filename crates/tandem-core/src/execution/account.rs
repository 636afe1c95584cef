use crate::execution::proof::{verify_account_proof, verify_storage_proof, ProofError};
use crate::types::execution::{AccountState, ProofBundle};
use alloy_primitives::{Address, B256, U256};

/// Verify a storage proof bundle end to end.
/// This is the high-level API that combines account proof and storage proof verification.
///
/// The state_root must come from a header whose commit seals were validated.
/// The bundle can come from any source (including an untrusted node), we verify it
/// cryptographically regardless of source.
pub fn verify_proof_bundle(
    state_root: B256,
    bundle: &ProofBundle,
) -> Result<VerifiedAccountState, ProofError> {
    // First, verify the account proof to get the account state
    let account = verify_account_proof(state_root, bundle.address, &bundle.account_proof)?;

    // The node's claimed storage hash must be the one the state trie commits to
    if account.storage_root != bundle.storage_hash {
        return Err(ProofError::StorageRootMismatch {
            address: bundle.address,
            claimed: bundle.storage_hash,
            proven: account.storage_root,
        });
    }

    // Then verify each storage proof against the account's storage root
    let mut storage_slots = Vec::with_capacity(bundle.entries.len());
    for entry in &bundle.entries {
        let value = verify_storage_proof(account.storage_root, entry.key, &entry.proof)?;
        if value != entry.value {
            return Err(ProofError::ValueMismatch {
                key: entry.key,
                claimed: entry.value,
                proven: value,
            });
        }
        storage_slots.push(VerifiedStorageSlot {
            key: entry.key,
            value,
        });
    }

    Ok(VerifiedAccountState {
        address: bundle.address,
        height: bundle.height,
        account,
        storage_slots,
    })
}

/// A fully verified account state with verified storage slots.
/// Every field in this struct has been checked against a state root taken
/// from a quorum-sealed header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedAccountState {
    pub address: Address,
    /// Block the proofs are rooted at.
    pub height: u64,
    /// The verified account state (nonce, balance, storage root, code hash).
    pub account: AccountState,
    /// Verified storage slot values, in request order.
    pub storage_slots: Vec<VerifiedStorageSlot>,
}

/// A single verified storage slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedStorageSlot {
    pub key: B256,
    pub value: U256,
}

impl VerifiedAccountState {
    /// Check if this is a contract account.
    pub fn is_contract(&self) -> bool {
        self.account.is_contract()
    }

    /// Look up a verified storage slot value by key.
    pub fn get_storage(&self, key: &B256) -> Option<U256> {
        self.storage_slots
            .iter()
            .find(|s| &s.key == key)
            .map(|s| s.value)
    }
}
