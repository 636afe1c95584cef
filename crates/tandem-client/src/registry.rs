//! Per-client-type dispatch from a fetched block to a [`LightClientState`].

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use tandem_core::{validate_commit_seals, ClientType, LightClientState, ProofBundle, ValidatorSet};
use tracing::debug;

use crate::error::{Error, Result};
use crate::gateway::{BlockTag, RpcGateway};
use crate::proof_builder::ProofBuilder;

/// How a configured client turns a block into a state.
#[derive(Clone, Debug)]
pub enum ClientMode {
    /// No consensus check, placeholder proofs.
    Mock,
    /// Commit-seal quorum against a fixed validator set, real storage proofs.
    BesuIbft2 { validators: ValidatorSet },
}

impl ClientMode {
    /// Pair a client type with the validator set it needs.
    /// A proposer client without validators cannot verify anything.
    pub fn new(client_type: ClientType, validators: Option<ValidatorSet>) -> Result<Self> {
        match (client_type, validators) {
            (ClientType::Mock, _) => Ok(ClientMode::Mock),
            (ClientType::BesuIbft2, Some(validators)) => Ok(ClientMode::BesuIbft2 { validators }),
            (ClientType::BesuIbft2, None) => Err(Error::Config(format!(
                "client type {} requires a validator set",
                client_type
            ))),
        }
    }

    pub fn client_type(&self) -> ClientType {
        match self {
            ClientMode::Mock => ClientType::Mock,
            ClientMode::BesuIbft2 { .. } => ClientType::BesuIbft2,
        }
    }
}

/// Stateless dispatcher from a chain's configured client type to the fetch,
/// validate and prove steps that produce its states.
#[derive(Clone)]
pub struct ClientRegistry {
    chain_id: String,
    mode: ClientMode,
    contract: Address,
    gateway: Arc<dyn RpcGateway>,
    proofs: ProofBuilder,
}

impl ClientRegistry {
    pub fn new(
        chain_id: impl Into<String>,
        mode: ClientMode,
        contract: Address,
        gateway: Arc<dyn RpcGateway>,
    ) -> Self {
        let chain_id = chain_id.into();
        Self {
            proofs: ProofBuilder::new(chain_id.clone(), Arc::clone(&gateway)),
            chain_id,
            mode,
            contract,
            gateway,
        }
    }

    /// Build from a client-type tag as written in configuration.
    pub fn from_tag(
        chain_id: impl Into<String>,
        tag: &str,
        validators: Option<ValidatorSet>,
        contract: Address,
        gateway: Arc<dyn RpcGateway>,
    ) -> Result<Self> {
        let client_type: ClientType = tag.parse().map_err(|e| Error::Config(format!("{}", e)))?;
        let mode = ClientMode::new(client_type, validators)?;
        Ok(Self::new(chain_id, mode, contract, gateway))
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn client_type(&self) -> ClientType {
        self.mode.client_type()
    }

    pub fn mode(&self) -> &ClientMode {
        &self.mode
    }

    /// Contract whose storage is proven.
    pub fn contract(&self) -> Address {
        self.contract
    }

    /// Fetch the block at `tag` and turn it into a state proving `keys`.
    ///
    /// Any failure propagates unchanged; no partial state is returned, and a
    /// proposer header that fails validation is never downgraded to unverified.
    pub fn fetch(&self, keys: &[B256], tag: BlockTag) -> Result<LightClientState> {
        let header = self
            .gateway
            .block(tag)
            .map_err(|e| Error::header_fetch(&self.chain_id, tag, e))?;
        let height = header.number;

        match &self.mode {
            ClientMode::Mock => {
                debug!(chain_id = %self.chain_id, height, "fetched unverified state");
                let proof = ProofBundle::placeholder(self.contract, height, keys);
                Ok(LightClientState::unverified(header, proof))
            }
            ClientMode::BesuIbft2 { validators } => {
                let consensus = validate_commit_seals(&header, validators).map_err(|source| {
                    Error::InvalidConsensusProof {
                        chain_id: self.chain_id.clone(),
                        height,
                        source,
                    }
                })?;
                debug!(
                    chain_id = %self.chain_id,
                    height,
                    signers = consensus.signers().len(),
                    signed_power = %consensus.signed_power(),
                    total_power = %consensus.total_power(),
                    "commit seals verified"
                );
                let proof = self.proofs.build(self.contract, keys, height)?;
                Ok(LightClientState::proposer_verified(consensus, proof))
            }
        }
    }
}
