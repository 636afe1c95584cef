//! Error types for chain sessions.

use std::io;
use std::time::Duration;

use alloy_primitives::Address;
use tandem_core::{ConsensusError, KeyError, ProofError};
use thiserror::Error;

use crate::gateway::{BlockTag, RpcError};

/// Errors surfaced by a chain session.
///
/// Every variant names the chain it happened on. Only [`Error::TransientRpc`]
/// is retried, and only by the header tracker.
#[derive(Debug, Error)]
pub enum Error {
    /// Network trouble fetching a header; the tracker tries again.
    #[error("[{chain_id}] transient RPC failure fetching {block} block: {source}")]
    TransientRpc {
        chain_id: String,
        block: BlockTag,
        #[source]
        source: RpcError,
    },

    /// The node answered, but not with something usable.
    #[error("[{chain_id}] RPC failure during {operation}: {source}")]
    Rpc {
        chain_id: String,
        operation: &'static str,
        #[source]
        source: RpcError,
    },

    /// The header's commit seals do not prove it was finalized.
    #[error("[{chain_id}] invalid consensus proof for block {height}: {source}")]
    InvalidConsensusProof {
        chain_id: String,
        height: u64,
        #[source]
        source: ConsensusError,
    },

    #[error("[{chain_id}] storage proof unavailable at height {height}: {reason}")]
    ProofUnavailable {
        chain_id: String,
        height: u64,
        reason: String,
    },

    /// A proof bundle failed Merkle-Patricia verification.
    #[error("[{chain_id}] storage proof at height {height} does not verify: {source}")]
    InvalidStorageProof {
        chain_id: String,
        height: u64,
        #[source]
        source: ProofError,
    },

    #[error("[{chain_id}] account {index} ({expected}) is not authorized to sign for {requested}")]
    UnauthorizedSigner {
        chain_id: String,
        index: u32,
        expected: Address,
        requested: Address,
    },

    #[error("[{chain_id}] key error for account {index}: {source}")]
    KeyDerivation {
        chain_id: String,
        index: u32,
        #[source]
        source: KeyError,
    },

    /// Submission is never retried.
    #[error("[{chain_id}] transaction from account {index} failed: {reason}")]
    Submission {
        chain_id: String,
        index: u32,
        reason: String,
    },

    #[error("[{chain_id}] no newer header within {deadline:?} after {attempts} attempts (last accepted height: {last_height:?})")]
    SyncTimeout {
        chain_id: String,
        last_height: Option<u64>,
        deadline: Duration,
        attempts: u32,
    },

    /// An operation needed an accepted state before any sync succeeded.
    #[error("[{chain_id}] no light-client state accepted yet")]
    NotSynced { chain_id: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Error {
    /// Map a header-fetch failure: transient failures become retryable.
    pub fn header_fetch(chain_id: &str, block: BlockTag, source: RpcError) -> Self {
        if source.is_transient() {
            Error::TransientRpc {
                chain_id: chain_id.to_string(),
                block,
                source,
            }
        } else {
            Error::Rpc {
                chain_id: chain_id.to_string(),
                operation: "header fetch",
                source,
            }
        }
    }

    /// Map a key failure for `index`, keeping unauthorized signing distinct.
    pub fn key(chain_id: &str, index: u32, source: KeyError) -> Self {
        match source {
            KeyError::UnauthorizedSigner {
                index,
                expected,
                requested,
            } => Error::UnauthorizedSigner {
                chain_id: chain_id.to_string(),
                index,
                expected,
                requested,
            },
            source => Error::KeyDerivation {
                chain_id: chain_id.to_string(),
                index,
                source,
            },
        }
    }

    /// Only transient header-fetch failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TransientRpc { .. })
    }

    /// Chain the error happened on, when it is chain-scoped.
    pub fn chain_id(&self) -> Option<&str> {
        match self {
            Error::TransientRpc { chain_id, .. }
            | Error::Rpc { chain_id, .. }
            | Error::InvalidConsensusProof { chain_id, .. }
            | Error::ProofUnavailable { chain_id, .. }
            | Error::InvalidStorageProof { chain_id, .. }
            | Error::UnauthorizedSigner { chain_id, .. }
            | Error::KeyDerivation { chain_id, .. }
            | Error::Submission { chain_id, .. }
            | Error::SyncTimeout { chain_id, .. }
            | Error::NotSynced { chain_id } => Some(chain_id),
            Error::Config(_) | Error::Io(_) | Error::Parse(_) => None,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
