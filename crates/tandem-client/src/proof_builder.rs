//! Storage proof bundles assembled from `eth_getProof`.

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use tandem_core::{ProofBundle, StorageProofEntry};
use tracing::debug;

use crate::error::{Error, Result};
use crate::gateway::RpcGateway;

/// Requests storage proofs for a contract and shapes them into a [`ProofBundle`].
///
/// One gateway call per bundle. Gateway failures and malformed answers are
/// reported as [`Error::ProofUnavailable`] and never retried here.
#[derive(Clone)]
pub struct ProofBuilder {
    chain_id: String,
    gateway: Arc<dyn RpcGateway>,
}

impl ProofBuilder {
    pub fn new(chain_id: impl Into<String>, gateway: Arc<dyn RpcGateway>) -> Self {
        Self {
            chain_id: chain_id.into(),
            gateway,
        }
    }

    /// Build the bundle for `keys` of `address` at `height`.
    ///
    /// Entries come back in exactly the order of `keys`. An empty key set
    /// yields an empty bundle that still carries the account proof.
    pub fn build(&self, address: Address, keys: &[B256], height: u64) -> Result<ProofBundle> {
        let unavailable = |reason: String| Error::ProofUnavailable {
            chain_id: self.chain_id.clone(),
            height,
            reason,
        };

        let response = self
            .gateway
            .storage_proof(address, keys, height)
            .map_err(|e| unavailable(format!("gateway error: {}", e)))?;

        if response.address != address {
            return Err(unavailable(format!(
                "requested proof for {} but node answered for {}",
                address, response.address
            )));
        }

        if response.storage_proof.len() != keys.len() {
            return Err(unavailable(format!(
                "requested {} storage keys but node returned {} entries",
                keys.len(),
                response.storage_proof.len()
            )));
        }

        let mut entries = Vec::with_capacity(keys.len());
        for (position, (requested, proof)) in keys.iter().zip(response.storage_proof).enumerate() {
            let returned = proof.slot();
            if returned != *requested {
                return Err(unavailable(format!(
                    "entry {} is for key {} but {} was requested there",
                    position, returned, requested
                )));
            }
            entries.push(StorageProofEntry {
                key: *requested,
                value: proof.value,
                proof: proof.proof,
            });
        }

        debug!(
            chain_id = %self.chain_id,
            %address,
            height,
            keys = keys.len(),
            "built storage proof bundle"
        );

        Ok(ProofBundle {
            address,
            height,
            account_proof: response.account_proof,
            storage_hash: response.storage_hash,
            entries,
        })
    }
}
