use crate::types::execution::AccountState;
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::Decodable;
use thiserror::Error;

/// Errors during Merkle-Patricia trie proof verification.
/// Each variant is specific enough to diagnose exactly what went wrong.
#[derive(Debug, Error)]
pub enum ProofError {
    #[error("Empty proof: no trie nodes provided")]
    EmptyProof,

    #[error("Invalid RLP encoding in proof node {index}: {reason}")]
    InvalidRlp { index: usize, reason: String },

    #[error("Proof verification failed at node {index}: node hash {computed} does not match expected reference {expected}")]
    RootMismatch {
        index: usize,
        computed: B256,
        expected: B256,
    },

    #[error("Invalid trie node at depth {depth}: expected branch, extension or leaf, got {node_type}")]
    InvalidNodeType { depth: usize, node_type: String },

    #[error("Proof path incomplete: trie traversal ended at depth {depth} without reaching the key")]
    IncompleteProof { depth: usize },

    #[error("Account not found at address {address}")]
    AccountNotFound { address: Address },

    #[error("Invalid account RLP encoding: {reason}")]
    InvalidAccountEncoding { reason: String },

    #[error("Invalid storage value encoding for key {key}: {reason}")]
    InvalidValueEncoding { key: B256, reason: String },

    #[error("Storage root mismatch for {address}: bundle claims {claimed}, account proof gives {proven}")]
    StorageRootMismatch {
        address: Address,
        claimed: B256,
        proven: B256,
    },

    #[error("Storage value mismatch for key {key}: bundle claims {claimed}, proof gives {proven}")]
    ValueMismatch {
        key: B256,
        claimed: U256,
        proven: U256,
    },

    #[error("Proof bundle for block {bundle_height} does not belong to header {header_height}")]
    HeightMismatch {
        bundle_height: u64,
        header_height: u64,
    },

    #[error("State at height {height} was produced by a non-verifying client; its proofs carry no cryptographic weight")]
    UnverifiedState { height: u64 },
}

/// Verify an account proof against a known state root.
/// The state root comes from a header whose commit seals were validated.
/// This lets us prove balance, nonce, code hash, and storage root of any account.
///
/// IMPORTANT: The state root must come from our verified chain state.
/// Never accept a state root from an untrusted source.
pub fn verify_account_proof(
    state_root: B256,
    address: Address,
    proof: &[Bytes],
) -> Result<AccountState, ProofError> {
    if proof.is_empty() {
        return Err(ProofError::EmptyProof);
    }

    // The key in the state trie is keccak256(address)
    let key = keccak256(address);

    match verify_merkle_patricia_proof(state_root, key, proof)? {
        Some(rlp_bytes) => decode_account(&rlp_bytes),
        // A valid proof of absence is still a failure for the caller
        None => Err(ProofError::AccountNotFound { address }),
    }
}

/// Verify a storage proof for a specific slot of a contract and return the
/// proven value. The storage root comes from a verified account state.
pub fn verify_storage_proof(
    storage_root: B256,
    slot: B256,
    proof: &[Bytes],
) -> Result<U256, ProofError> {
    if proof.is_empty() {
        // Empty proof against the empty trie proves the slot is zero
        if storage_root == AccountState::EMPTY_STORAGE_ROOT {
            return Ok(U256::ZERO);
        }
        return Err(ProofError::EmptyProof);
    }

    // The key in the storage trie is keccak256(slot)
    let key = keccak256(slot);

    match verify_merkle_patricia_proof(storage_root, key, proof)? {
        Some(rlp_bytes) => {
            U256::decode(&mut rlp_bytes.as_slice()).map_err(|e| ProofError::InvalidValueEncoding {
                key: slot,
                reason: e.to_string(),
            })
        }
        // Slot not in trie: value is zero (valid proof of non-existence)
        None => Ok(U256::ZERO),
    }
}

/// Reference from a parent node to a child.
enum NodeRef<'a> {
    /// Child is stored separately and referenced by keccak256 of its RLP.
    Hash(B256),
    /// Child RLP is shorter than 32 bytes and embedded in the parent.
    Inline(&'a [u8]),
}

/// One element of a decoded trie node.
struct RlpItem<'a> {
    /// Full encoding, header included.
    raw: &'a [u8],
    payload: &'a [u8],
    list: bool,
}

/// Core Merkle-Patricia trie proof verification.
///
/// Walks the trie from root to leaf following the proof nodes.
/// At each step, verifies that the hash of the current node matches
/// what the parent node claims.
///
/// Returns Some(value) if the key exists, None for proof of non-existence.
fn verify_merkle_patricia_proof(
    expected_root: B256,
    key: B256,
    proof_nodes: &[Bytes],
) -> Result<Option<Vec<u8>>, ProofError> {
    if proof_nodes.is_empty() {
        return Err(ProofError::EmptyProof);
    }

    let nibbles = bytes_to_nibbles(key.as_slice());
    let mut nibble_index: usize = 0;
    let mut next_proof_node: usize = 0;
    let mut reference = NodeRef::Hash(expected_root);
    let mut depth: usize = 0;

    loop {
        // 1. Resolve the reference into node bytes, checking hashes
        let node: &[u8] = match reference {
            NodeRef::Hash(expected) => {
                let Some(node) = proof_nodes.get(next_proof_node) else {
                    return Err(ProofError::IncompleteProof { depth });
                };
                let computed = keccak256(node);
                if computed != expected {
                    return Err(ProofError::RootMismatch {
                        index: next_proof_node,
                        computed,
                        expected,
                    });
                }
                next_proof_node += 1;
                &node[..]
            }
            NodeRef::Inline(node) => node,
        };

        // 2. Decode and follow the path
        let items = decode_node(node).map_err(|reason| ProofError::InvalidRlp {
            index: depth,
            reason,
        })?;

        match items.len() {
            17 => {
                // Branch node: 16 children + value
                if nibble_index >= nibbles.len() {
                    let value = &items[16];
                    if value.payload.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(value.payload.to_vec()));
                }

                let child = &items[nibbles[nibble_index] as usize];
                nibble_index += 1;
                match child_reference(child, depth)? {
                    Some(next) => reference = next,
                    None => return Ok(None), // Empty slot: key not in trie
                }
            }
            2 => {
                // Extension or leaf node
                let (prefix_nibbles, is_leaf) = decode_compact_path(items[0].payload);
                let remaining = &nibbles[nibble_index..];

                if is_leaf {
                    if remaining == prefix_nibbles.as_slice() {
                        return Ok(Some(items[1].payload.to_vec()));
                    }
                    // Key doesn't match: proof of non-existence
                    return Ok(None);
                }

                if !remaining.starts_with(&prefix_nibbles) {
                    return Ok(None); // Path diverges: key not in trie
                }
                nibble_index += prefix_nibbles.len();
                match child_reference(&items[1], depth)? {
                    Some(next) => reference = next,
                    None => {
                        return Err(ProofError::InvalidNodeType {
                            depth,
                            node_type: "extension with empty child".to_string(),
                        })
                    }
                }
            }
            n => {
                return Err(ProofError::InvalidNodeType {
                    depth,
                    node_type: format!("{}-element list", n),
                });
            }
        }
        depth += 1;
    }
}

fn child_reference<'a>(
    item: &RlpItem<'a>,
    depth: usize,
) -> Result<Option<NodeRef<'a>>, ProofError> {
    if item.list {
        return Ok(Some(NodeRef::Inline(item.raw)));
    }
    match item.payload.len() {
        0 => Ok(None),
        32 => Ok(Some(NodeRef::Hash(B256::from_slice(item.payload)))),
        n => Err(ProofError::InvalidNodeType {
            depth,
            node_type: format!("{}-byte child reference", n),
        }),
    }
}

/// Split a trie node's RLP list into its items.
fn decode_node(node: &[u8]) -> Result<Vec<RlpItem<'_>>, String> {
    let mut buf = node;
    let header = alloy_rlp::Header::decode(&mut buf).map_err(|e| e.to_string())?;
    if !header.list {
        return Err("trie node is not a list".to_string());
    }
    if buf.len() != header.payload_length {
        return Err(format!(
            "node payload is {} bytes, header declares {}",
            buf.len(),
            header.payload_length
        ));
    }

    let mut items = Vec::with_capacity(17);
    while !buf.is_empty() {
        let start = buf;
        let item_header = alloy_rlp::Header::decode(&mut buf).map_err(|e| e.to_string())?;
        if buf.len() < item_header.payload_length {
            return Err("item extends past end of node".to_string());
        }
        let header_length = start.len() - buf.len();
        let (payload, rest) = buf.split_at(item_header.payload_length);
        items.push(RlpItem {
            raw: &start[..header_length + item_header.payload_length],
            payload,
            list: item_header.list,
        });
        buf = rest;
    }
    Ok(items)
}

/// Decode an Ethereum account from RLP encoding.
/// Account is RLP([nonce, balance, storageRoot, codeHash])
fn decode_account(rlp_bytes: &[u8]) -> Result<AccountState, ProofError> {
    let invalid = |e: alloy_rlp::Error| ProofError::InvalidAccountEncoding {
        reason: e.to_string(),
    };

    let mut buf = rlp_bytes;
    let header = alloy_rlp::Header::decode(&mut buf).map_err(invalid)?;
    if !header.list || buf.len() != header.payload_length {
        return Err(ProofError::InvalidAccountEncoding {
            reason: "expected a single RLP list".to_string(),
        });
    }

    let account = AccountState {
        nonce: u64::decode(&mut buf).map_err(invalid)?,
        balance: U256::decode(&mut buf).map_err(invalid)?,
        storage_root: B256::decode(&mut buf).map_err(invalid)?,
        code_hash: B256::decode(&mut buf).map_err(invalid)?,
    };

    if !buf.is_empty() {
        return Err(ProofError::InvalidAccountEncoding {
            reason: format!("{} unexpected trailing bytes", buf.len()),
        });
    }
    Ok(account)
}

/// Convert bytes to nibbles (4 bits each).
fn bytes_to_nibbles(bytes: &[u8]) -> Vec<u8> {
    let mut nibbles = Vec::with_capacity(bytes.len() * 2);
    for byte in bytes {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0F);
    }
    nibbles
}

/// Decode compact (hex-prefix) encoding used in trie nodes.
/// Returns (nibbles, is_leaf).
fn decode_compact_path(encoded: &[u8]) -> (Vec<u8>, bool) {
    let Some(&first) = encoded.first() else {
        return (vec![], false);
    };

    let flag = first >> 4;
    let is_leaf = flag >= 2;
    let is_odd = flag % 2 == 1;

    let mut nibbles = Vec::with_capacity(encoded.len() * 2);
    if is_odd {
        nibbles.push(first & 0x0F);
    }
    for &byte in &encoded[1..] {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0F);
    }
    (nibbles, is_leaf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{account_trie, storage_trie};

    #[test]
    fn test_bytes_to_nibbles() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xAB;
        bytes[1] = 0xCD;
        let nibbles = bytes_to_nibbles(&bytes);
        assert_eq!(nibbles.len(), 64);
        assert_eq!(&nibbles[..5], &[0xA, 0xB, 0xC, 0xD, 0x0]);
    }

    #[test]
    fn test_decode_compact_path_even_extension() {
        let (nibbles, is_leaf) = decode_compact_path(&[0x00, 0xAB, 0xCD]);
        assert!(!is_leaf);
        assert_eq!(nibbles, vec![0xA, 0xB, 0xC, 0xD]);
    }

    #[test]
    fn test_decode_compact_path_odd_extension() {
        let (nibbles, is_leaf) = decode_compact_path(&[0x1A, 0xBC]);
        assert!(!is_leaf);
        assert_eq!(nibbles, vec![0xA, 0xB, 0xC]);
    }

    #[test]
    fn test_decode_compact_path_even_leaf() {
        let (nibbles, is_leaf) = decode_compact_path(&[0x20, 0xAB]);
        assert!(is_leaf);
        assert_eq!(nibbles, vec![0xA, 0xB]);
    }

    #[test]
    fn test_decode_compact_path_odd_leaf() {
        let (nibbles, is_leaf) = decode_compact_path(&[0x3A, 0xBC]);
        assert!(is_leaf);
        assert_eq!(nibbles, vec![0xA, 0xB, 0xC]);
    }

    #[test]
    fn test_decode_node_splits_items() {
        // [0x01, "", [0x02]]
        let node = [0xC4, 0x01, 0x80, 0xC1, 0x02];
        let items = decode_node(&node).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].payload, &[0x01]);
        assert!(items[1].payload.is_empty());
        assert!(items[2].list);
        assert_eq!(items[2].raw, &[0xC1, 0x02]);
    }

    #[test]
    fn test_decode_node_rejects_strings() {
        assert!(decode_node(&[0x83, 1, 2, 3]).is_err());
        assert!(decode_node(&[0xC3, 0x01]).is_err());
    }

    #[test]
    fn test_storage_single_leaf() {
        let slot = B256::repeat_byte(0x01);
        let (root, proof) = storage_trie(slot, U256::from(42));
        assert_eq!(verify_storage_proof(root, slot, &proof).unwrap(), U256::from(42));
    }

    #[test]
    fn test_storage_absent_key_is_zero() {
        let (root, proof) = storage_trie(B256::repeat_byte(0x01), U256::from(42));
        let other = B256::repeat_byte(0x02);
        assert_eq!(verify_storage_proof(root, other, &proof).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_storage_wrong_root() {
        let slot = B256::repeat_byte(0x01);
        let (_, proof) = storage_trie(slot, U256::from(42));
        let result = verify_storage_proof(B256::repeat_byte(0xFF), slot, &proof);
        assert!(matches!(result, Err(ProofError::RootMismatch { index: 0, .. })));
    }

    #[test]
    fn test_storage_empty_proof() {
        let slot = B256::repeat_byte(0x01);
        assert_eq!(
            verify_storage_proof(AccountState::EMPTY_STORAGE_ROOT, slot, &[]).unwrap(),
            U256::ZERO
        );
        assert!(matches!(
            verify_storage_proof(B256::repeat_byte(0x11), slot, &[]),
            Err(ProofError::EmptyProof)
        ));
    }

    #[test]
    fn test_account_single_leaf() {
        let address = Address::repeat_byte(0xAA);
        let account = AccountState {
            nonce: 3,
            balance: U256::from(1_000_000u64),
            storage_root: B256::repeat_byte(0x5A),
            code_hash: B256::repeat_byte(0xC0),
        };
        let (root, proof) = account_trie(address, &account);
        assert_eq!(verify_account_proof(root, address, &proof).unwrap(), account);
    }

    #[test]
    fn test_account_absent() {
        let account = AccountState {
            nonce: 0,
            balance: U256::ZERO,
            storage_root: AccountState::EMPTY_STORAGE_ROOT,
            code_hash: AccountState::EMPTY_CODE_HASH,
        };
        let (root, proof) = account_trie(Address::repeat_byte(0xAA), &account);
        let result = verify_account_proof(root, Address::repeat_byte(0xBB), &proof);
        assert!(matches!(result, Err(ProofError::AccountNotFound { .. })));
    }

    #[test]
    fn test_branch_with_hashed_leaf() {
        // Root is a branch whose child at the key's first nibble is a hashed
        // leaf holding the remaining 63 nibbles.
        let slot = B256::repeat_byte(0x07);
        let hashed = keccak256(slot);
        let value = alloy_rlp::encode(U256::from(7));

        let mut path = vec![0x30 | (hashed[0] & 0x0F)];
        path.extend_from_slice(&hashed[1..]);
        let leaf = encode_list(&[
            alloy_rlp::encode(Bytes::from(path)),
            alloy_rlp::encode(Bytes::from(value)),
        ]);
        assert!(leaf.len() >= 32);

        let mut children: Vec<Vec<u8>> = vec![vec![0x80]; 17];
        children[(hashed[0] >> 4) as usize] = alloy_rlp::encode(keccak256(&leaf));
        let branch = encode_list(&children);

        let proof = vec![Bytes::from(branch.clone()), Bytes::from(leaf)];
        let root = keccak256(&branch);
        assert_eq!(verify_storage_proof(root, slot, &proof).unwrap(), U256::from(7));

        // Dropping the leaf leaves the walk stranded at the branch
        assert!(matches!(
            verify_storage_proof(root, slot, &proof[..1]),
            Err(ProofError::IncompleteProof { depth: 1 })
        ));
    }

    fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
        let payload_length: usize = items.iter().map(Vec::len).sum();
        let mut out = Vec::with_capacity(payload_length + 3);
        alloy_rlp::Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        for item in items {
            out.extend_from_slice(item);
        }
        out
    }
}
