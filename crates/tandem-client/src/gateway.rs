//! The chain endpoint surface the harness consumes.
//!
//! Three blocking calls: fetch a block header, fetch storage proofs at a
//! height, submit a signed transaction. Nothing at this layer retries.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::Deserialize;
use std::fmt;
use tandem_core::{BlockHeader, SignedTransaction};
use thiserror::Error;

/// Failures talking to a chain endpoint.
#[derive(Clone, Debug, Error)]
pub enum RpcError {
    /// Connection refused, reset, DNS failure.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Error object returned by the node.
    #[error("RPC error {code}: {message}")]
    JsonRpc { code: i64, message: String },

    /// The node returned `null` for something that should exist.
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl RpcError {
    /// Whether asking again later might succeed.
    ///
    /// Network trouble, overloaded nodes (5xx, 429) and blocks a lagging node
    /// has not seen yet are transient; anything the node deliberately
    /// answered with is not.
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::Transport(_) | RpcError::Timeout(_) | RpcError::NotFound(_) => true,
            RpcError::Http { status, .. } => *status >= 500 || *status == 429,
            RpcError::JsonRpc { .. } | RpcError::InvalidResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RpcError::Timeout(e.to_string())
        } else if e.is_decode() {
            RpcError::InvalidResponse(e.to_string())
        } else if let Some(status) = e.status() {
            RpcError::Http {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else {
            RpcError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        RpcError::InvalidResponse(e.to_string())
    }
}

/// Which block to fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Number(u64),
}

impl BlockTag {
    /// Block parameter as JSON-RPC expects it.
    pub fn to_param(&self) -> String {
        match self {
            BlockTag::Latest => "latest".to_string(),
            BlockTag::Number(n) => format!("0x{:x}", n),
        }
    }

    pub fn number(&self) -> Option<u64> {
        match self {
            BlockTag::Latest => None,
            BlockTag::Number(n) => Some(*n),
        }
    }
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockTag::Latest => f.write_str("latest"),
            BlockTag::Number(n) => write!(f, "{}", n),
        }
    }
}

/// `eth_getProof` response.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProofResponse {
    pub address: Address,
    pub account_proof: Vec<Bytes>,
    pub balance: U256,
    pub code_hash: B256,
    pub nonce: U256,
    pub storage_hash: B256,
    pub storage_proof: Vec<StorageProofResponse>,
}

/// One storage slot of an `eth_getProof` response.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct StorageProofResponse {
    /// Some nodes return minimal quantities ("0x0") instead of 32-byte words.
    pub key: U256,
    pub value: U256,
    pub proof: Vec<Bytes>,
}

impl StorageProofResponse {
    pub fn slot(&self) -> B256 {
        B256::from(self.key.to_be_bytes::<32>())
    }
}

/// Outcome of a submitted transaction once mined.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_hash: B256,
    #[serde(default, with = "quantity_opt")]
    pub block_number: Option<u64>,
    #[serde(default, with = "quantity_opt")]
    pub gas_used: Option<u64>,
    /// `Some(false)` means the transaction reverted.
    #[serde(default, with = "status_opt")]
    pub status: Option<bool>,
}

impl TxReceipt {
    pub fn succeeded(&self) -> bool {
        self.status != Some(false)
    }
}

/// A chain endpoint. Implementations block until the node answers.
pub trait RpcGateway: Send + Sync {
    /// Fetch the latest or a numbered block header.
    fn block(&self, tag: BlockTag) -> Result<BlockHeader, RpcError>;

    /// Fetch account and storage proofs for `keys` of `address` at `height`.
    fn storage_proof(
        &self,
        address: Address,
        keys: &[B256],
        height: u64,
    ) -> Result<AccountProofResponse, RpcError>;

    /// Pending-inclusive transaction count of `address`.
    fn nonce(&self, address: Address) -> Result<u64, RpcError>;

    /// Submit a signed transaction and wait for its receipt.
    fn submit(&self, tx: &SignedTransaction) -> Result<TxReceipt, RpcError>;
}

mod quantity_opt {
    use alloy_primitives::U64;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        Ok(Option::<U64>::deserialize(d)?.map(|q| q.to::<u64>()))
    }
}

mod status_opt {
    use alloy_primitives::U64;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(Option::<U64>::deserialize(d)?.map(|q| q.to::<u64>() == 1))
    }
}
