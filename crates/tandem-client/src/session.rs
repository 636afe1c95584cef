//! One chain's side of a relay path: keys, light client and transactions.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256};
use tandem_core::{
    BlockHeader, ClientType, KeyVault, LegacyTransaction, LightClientState, SignedTransaction,
    TxSigner, VerifiedAccountState,
};
use tracing::{debug, info};

use crate::config::{ChainConfig, ChannelInfo};
use crate::error::{Error, Result};
use crate::gateway::{BlockTag, RpcGateway, TxReceipt};
use crate::registry::{ClientMode, ClientRegistry};
use crate::rpc::JsonRpcGateway;
use crate::tracker::{HeaderTracker, SyncPolicy};

/// A connected chain: its endpoint, account keys and tracked light-client state.
///
/// Sessions share nothing with each other. Within a session the key cache
/// and the accepted state are safe to use from several threads.
pub struct ChainSession {
    config: ChainConfig,
    channel: ChannelInfo,
    vault: KeyVault,
    gateway: Arc<dyn RpcGateway>,
    registry: ClientRegistry,
    tracker: HeaderTracker,
}

impl ChainSession {
    pub fn new(
        config: ChainConfig,
        channel: ChannelInfo,
        mnemonic: &str,
        policy: SyncPolicy,
        gateway: Arc<dyn RpcGateway>,
    ) -> Result<Self> {
        config.validate()?;
        let vault = KeyVault::new(mnemonic)
            .map_err(|e| Error::Config(format!("[{}] {}", config.chain_id, e)))?;
        let mode = ClientMode::new(config.client_type, config.validator_set()?)?;
        let registry = ClientRegistry::new(
            config.chain_id.clone(),
            mode,
            config.ibc_handler,
            Arc::clone(&gateway),
        );
        let tracker = HeaderTracker::new(config.chain_id.clone(), policy);

        debug!(
            chain_id = %config.chain_id,
            client_type = %config.client_type,
            url = %config.client_url,
            "chain session created"
        );

        Ok(Self {
            config,
            channel,
            vault,
            gateway,
            registry,
            tracker,
        })
    }

    /// Open a session against the JSON-RPC endpoint in `config`.
    pub fn connect(
        config: ChainConfig,
        channel: ChannelInfo,
        mnemonic: &str,
        policy: SyncPolicy,
    ) -> Result<Self> {
        let gateway = JsonRpcGateway::new(config.client_url.clone()).map_err(|source| Error::Rpc {
            chain_id: config.chain_id.clone(),
            operation: "connect",
            source,
        })?;
        Self::new(config, channel, mnemonic, policy, Arc::new(gateway))
    }

    pub fn chain_id(&self) -> &str {
        &self.config.chain_id
    }

    pub fn eth_chain_id(&self) -> u64 {
        self.config.eth_chain_id
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn channel(&self) -> &ChannelInfo {
        &self.channel
    }

    pub fn client_type(&self) -> ClientType {
        self.registry.client_type()
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Address of account `index`, the `from` of its transactions.
    pub fn address(&self, index: u32) -> Result<Address> {
        self.vault
            .address(index)
            .map_err(|e| Error::key(self.chain_id(), index, e))
    }

    /// Signer for account `index` on this chain.
    pub fn signer(&self, index: u32) -> Result<TxSigner> {
        self.vault
            .signer(self.eth_chain_id(), index)
            .map_err(|e| Error::key(self.chain_id(), index, e))
    }

    /// Sign `tx` with account `index` on behalf of `from`.
    pub fn sign(
        &self,
        index: u32,
        from: Address,
        tx: LegacyTransaction,
    ) -> Result<SignedTransaction> {
        self.signer(index)?
            .sign_transaction(from, tx)
            .map_err(|e| Error::key(self.chain_id(), index, e))
    }

    /// Sign `tx` with account `index` and submit it once.
    ///
    /// A gateway failure or a reverted receipt is reported as
    /// [`Error::Submission`]; nothing is retried.
    pub fn submit(&self, index: u32, tx: LegacyTransaction) -> Result<TxReceipt> {
        let from = self.address(index)?;
        let signed = self.sign(index, from, tx)?;
        self.send(index, &signed)
    }

    /// Call `to` from account `index` at its next nonce.
    pub fn call(&self, index: u32, to: Address, input: Bytes) -> Result<TxReceipt> {
        let from = self.address(index)?;
        let nonce = self.gateway.nonce(from).map_err(|source| Error::Rpc {
            chain_id: self.chain_id().to_string(),
            operation: "nonce lookup",
            source,
        })?;
        self.submit(index, LegacyTransaction::call(nonce, to, input))
    }

    fn send(&self, index: u32, signed: &SignedTransaction) -> Result<TxReceipt> {
        let submission = |reason: String| Error::Submission {
            chain_id: self.chain_id().to_string(),
            index,
            reason,
        };

        let receipt = self
            .gateway
            .submit(signed)
            .map_err(|e| submission(format!("{} not accepted: {}", signed.hash(), e)))?;
        if !receipt.succeeded() {
            return Err(submission(format!(
                "{} reverted in block {:?}",
                receipt.transaction_hash, receipt.block_number
            )));
        }

        info!(
            chain_id = %self.chain_id(),
            index,
            tx = %receipt.transaction_hash,
            block = ?receipt.block_number,
            "transaction mined"
        );
        Ok(receipt)
    }

    /// Wait for a header newer than the last accepted one, proving no storage.
    pub fn update_header(&self) -> Result<Arc<LightClientState>> {
        self.tracker.sync_with(&self.registry, &[])
    }

    /// Wait for a header newer than the last accepted one and prove `keys`
    /// of the IBC handler at its height.
    pub fn update_state(&self, keys: &[B256]) -> Result<Arc<LightClientState>> {
        self.tracker.sync_with(&self.registry, keys)
    }

    /// One-shot state at a fixed height. Not tracked and not retried.
    pub fn state_at(&self, keys: &[B256], height: u64) -> Result<LightClientState> {
        self.registry.fetch(keys, BlockTag::Number(height))
    }

    pub fn last_state(&self) -> Option<Arc<LightClientState>> {
        self.tracker.latest()
    }

    pub fn last_header(&self) -> Option<BlockHeader> {
        self.tracker.latest().map(|state| state.header().clone())
    }

    /// Last accepted height plus `offset`, for packet timeouts.
    pub fn timeout_height(&self, offset: u64) -> Result<u64> {
        self.tracker
            .last_height()
            .map(|height| height.saturating_add(offset))
            .ok_or_else(|| Error::NotSynced {
                chain_id: self.chain_id().to_string(),
            })
    }

    /// Verify the last accepted state's storage proofs against its header.
    pub fn verified_storage(&self) -> Result<VerifiedAccountState> {
        let state = self.tracker.latest().ok_or_else(|| Error::NotSynced {
            chain_id: self.chain_id().to_string(),
        })?;
        state
            .verify_storage()
            .map_err(|source| Error::InvalidStorageProof {
                chain_id: self.chain_id().to_string(),
                height: state.height(),
                source,
            })
    }
}
