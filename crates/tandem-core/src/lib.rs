//! # Tandem Core
//!
//! Pure Rust light-client verification and signing logic for the tandem
//! inter-chain relay harness.
//!
//! This crate contains **no networking code**. Everything a chain endpoint
//! reports passes through these functions before the harness trusts it.
//!
//! ## Trust Model
//!
//! - **Commit-seal verification** (`consensus` module): Recovers the signers
//!   of a Besu IBFT 2.0 header's commit seals and requires more than 2/3 of
//!   the configured validator voting power.
//!
//! - **Storage proof verification** (`execution` module): Verifies
//!   Merkle-Patricia trie proofs for account state and contract storage.
//!   Zero trust assumptions beyond a state root taken from a sealed header.
//!
//! - **Non-verifying states** (`types::state`): The mock client's states are
//!   explicitly `Unverified` and refuse storage verification.
//!
//! - **Keys** (`keys` module): Deterministic BIP-44 account keys and EIP-155
//!   transaction signing, one signer per account and chain.
//!
//! ## Usage
//!
//! ```ignore
//! use tandem_core::consensus::validate_commit_seals;
//! use tandem_core::keys::KeyVault;
//! ```

pub mod consensus;
pub mod execution;
pub mod keys;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types for convenience
pub use consensus::{
    extra::IbftExtra,
    seal::{
        block_hash, ibft_block_hash, validate_commit_seals, validate_raw_header, ConsensusError,
        ConsensusHeader,
    },
};
pub use execution::{
    account::{verify_proof_bundle, VerifiedAccountState},
    proof::{verify_account_proof, verify_storage_proof, ProofError},
};
pub use keys::{
    transaction::{LegacyTransaction, SignedTransaction, TxSigner},
    vault::{derive_key, KeyEntry, KeyError, KeyVault},
};
pub use types::{block::*, execution::*, state::*, validator::*};
