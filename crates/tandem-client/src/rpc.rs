//! JSON-RPC client for Ethereum-compatible chain endpoints.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use alloy_primitives::{Address, B256, U64};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tandem_core::{block_hash, BlockHeader, SignedTransaction};
use tracing::debug;
use url::Url;

use crate::gateway::{AccountProofResponse, BlockTag, RpcError, RpcGateway, TxReceipt};

/// Default per-request HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// How long [`RpcGateway::submit`] waits for a receipt.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(30);
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// JSON-RPC request structure.
#[derive(Debug, Clone, Serialize)]
struct JsonRpcRequest<T> {
    jsonrpc: &'static str,
    method: &'static str,
    params: T,
    id: u64,
}

/// JSON-RPC response structure.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error structure.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// Block header as returned by `eth_getBlockByNumber`: the node's hash
/// alongside the consensus header. Transactions and other body fields are
/// ignored.
type RpcBlock = alloy_rpc_types_eth::Header;

/// Take the consensus header out of `block`, checking it hashes to what the
/// node claims.
fn into_verified_header(block: RpcBlock) -> Result<BlockHeader, RpcError> {
    let header = block.inner;
    let computed = block_hash(&header);
    if computed != block.hash {
        return Err(RpcError::InvalidResponse(format!(
            "block {} reported hash {} but its fields hash to {}",
            header.number, block.hash, computed
        )));
    }
    Ok(header)
}

/// Blocking JSON-RPC gateway to one chain endpoint.
pub struct JsonRpcGateway {
    url: Url,
    http_client: reqwest::blocking::Client,
    receipt_timeout: Duration,
    next_id: AtomicU64,
}

impl JsonRpcGateway {
    /// Create a gateway with the default timeouts.
    pub fn new(url: Url) -> Result<Self, RpcError> {
        Self::with_timeouts(url, DEFAULT_REQUEST_TIMEOUT, DEFAULT_RECEIPT_TIMEOUT)
    }

    pub fn with_timeouts(
        url: Url,
        request_timeout: Duration,
        receipt_timeout: Duration,
    ) -> Result<Self, RpcError> {
        let http_client = reqwest::blocking::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            url,
            http_client,
            receipt_timeout,
            next_id: AtomicU64::new(1),
        })
    }

    /// Return url of the endpoint.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Send a JSON-RPC request to the node.
    ///
    /// Serializes the request, sends it to the endpoint, and deserializes the response.
    /// Returns `None` if the RPC response has a null `result`.
    fn request<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &'static str,
        params: P,
    ) -> Result<Option<R>, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        debug!(method, id = request.id, url = %self.url, "sending JSON-RPC request");

        let response = self
            .http_client
            .post(self.url.clone())
            .json(&request)
            .send()?;

        if !response.status().is_success() {
            return Err(RpcError::Http {
                status: response.status().as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let rpc_response: JsonRpcResponse<R> = response.json()?;

        if let Some(error) = rpc_response.error {
            return Err(RpcError::JsonRpc {
                code: error.code,
                message: error.message,
            });
        }

        Ok(rpc_response.result)
    }

    fn receipt(&self, hash: B256) -> Result<Option<TxReceipt>, RpcError> {
        self.request("eth_getTransactionReceipt", (hash,))
    }
}

impl RpcGateway for JsonRpcGateway {
    fn block(&self, tag: BlockTag) -> Result<BlockHeader, RpcError> {
        let block: Option<RpcBlock> =
            self.request("eth_getBlockByNumber", (tag.to_param(), false))?;
        let block = block.ok_or_else(|| RpcError::NotFound(format!("block {}", tag)))?;
        into_verified_header(block)
    }

    fn storage_proof(
        &self,
        address: Address,
        keys: &[B256],
        height: u64,
    ) -> Result<AccountProofResponse, RpcError> {
        let tag = BlockTag::Number(height);
        let proof: Option<AccountProofResponse> =
            self.request("eth_getProof", (address, keys, tag.to_param()))?;
        proof.ok_or_else(|| {
            RpcError::NotFound(format!("proof for {} at block {}", address, height))
        })
    }

    fn nonce(&self, address: Address) -> Result<u64, RpcError> {
        let count: Option<U64> = self.request("eth_getTransactionCount", (address, "pending"))?;
        count
            .map(|c| c.to::<u64>())
            .ok_or_else(|| RpcError::NotFound(format!("transaction count of {}", address)))
    }

    fn submit(&self, tx: &SignedTransaction) -> Result<TxReceipt, RpcError> {
        let hash: B256 = self
            .request("eth_sendRawTransaction", (tx.encoded(),))?
            .ok_or_else(|| {
                RpcError::InvalidResponse("eth_sendRawTransaction returned null".into())
            })?;
        debug!(%hash, from = %tx.from(), "transaction submitted, waiting for receipt");

        let deadline = Instant::now() + self.receipt_timeout;
        loop {
            if let Some(receipt) = self.receipt(hash)? {
                return Ok(receipt);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(RpcError::Timeout(format!(
                    "no receipt for {} after {:?}",
                    hash, self.receipt_timeout
                )));
            }
            thread::sleep(RECEIPT_POLL_INTERVAL.min(deadline - now));
        }
    }
}
