use alloy_primitives::{b256, Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// An account as stored in the state trie: RLP([nonce, balance, storageRoot, codeHash]).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub nonce: u64,
    pub balance: U256,
    /// Root of the account's storage trie; [`AccountState::EMPTY_STORAGE_ROOT`] for EOAs.
    pub storage_root: B256,
    pub code_hash: B256,
}

impl AccountState {
    /// keccak256 of empty bytes, the code hash of externally owned accounts.
    pub const EMPTY_CODE_HASH: B256 =
        b256!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470");

    /// The root of an empty Merkle-Patricia trie.
    pub const EMPTY_STORAGE_ROOT: B256 =
        b256!("56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421");

    /// Check if this is a contract account (has code deployed).
    pub fn is_contract(&self) -> bool {
        self.code_hash != Self::EMPTY_CODE_HASH
    }

    pub fn has_storage(&self) -> bool {
        self.storage_root != Self::EMPTY_STORAGE_ROOT
    }
}

/// One storage slot in a [`ProofBundle`]: the requested key, the value the
/// node claims, and the trie path proving it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageProofEntry {
    pub key: B256,
    pub value: U256,
    /// RLP-encoded trie nodes, root first. Empty for non-verifying clients.
    pub proof: Vec<Bytes>,
}

impl StorageProofEntry {
    /// Placeholder entry carrying only the key, used by the mock client.
    pub fn empty(key: B256) -> Self {
        Self {
            key,
            value: U256::ZERO,
            proof: Vec::new(),
        }
    }
}

/// Storage proofs for a set of contract storage keys, rooted at one block.
///
/// `entries` is in exactly the order the caller requested the keys; an empty
/// list is valid and means no keys were requested.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofBundle {
    /// Contract whose storage is being proven.
    pub address: Address,
    /// Block number the proof is rooted at.
    pub height: u64,
    /// Account proof from the state root down to `address`.
    pub account_proof: Vec<Bytes>,
    /// Storage root the node claims for `address`.
    pub storage_hash: B256,
    pub entries: Vec<StorageProofEntry>,
}

impl ProofBundle {
    /// A trivially-shaped bundle: one empty entry per key and no account proof.
    /// Carries no cryptographic weight.
    pub fn placeholder(address: Address, height: u64, keys: &[B256]) -> Self {
        Self {
            address,
            height,
            account_proof: Vec::new(),
            storage_hash: B256::ZERO,
            entries: keys.iter().copied().map(StorageProofEntry::empty).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Requested keys, in request order.
    pub fn keys(&self) -> impl Iterator<Item = &B256> {
        self.entries.iter().map(|e| &e.key)
    }

    /// Look up the entry for a storage key.
    pub fn entry(&self, key: &B256) -> Option<&StorageProofEntry> {
        self.entries.iter().find(|e| &e.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_code_hash_is_keccak_of_nothing() {
        assert_eq!(alloy_primitives::keccak256(b""), AccountState::EMPTY_CODE_HASH);
    }

    #[test]
    fn test_placeholder_keeps_key_order() {
        let keys = [B256::repeat_byte(3), B256::repeat_byte(1), B256::repeat_byte(2)];
        let bundle = ProofBundle::placeholder(Address::ZERO, 9, &keys);
        assert_eq!(bundle.len(), 3);
        assert_eq!(bundle.keys().copied().collect::<Vec<_>>(), keys.to_vec());
        assert!(bundle.entries.iter().all(|e| e.proof.is_empty()));
        assert!(bundle.account_proof.is_empty());
    }

    #[test]
    fn test_placeholder_without_keys_is_empty() {
        let bundle = ProofBundle::placeholder(Address::ZERO, 1, &[]);
        assert!(bundle.is_empty());
        assert_eq!(bundle.height, 1);
    }

    #[test]
    fn test_account_kind() {
        let eoa = AccountState {
            nonce: 0,
            balance: U256::from(100),
            storage_root: AccountState::EMPTY_STORAGE_ROOT,
            code_hash: AccountState::EMPTY_CODE_HASH,
        };
        assert!(!eoa.is_contract());
        assert!(!eoa.has_storage());
    }
}
