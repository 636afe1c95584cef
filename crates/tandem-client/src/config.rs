//! Path configuration: the two chains of a relay path and the shared mnemonic.

use std::fs;
use std::path::Path;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use tandem_core::{ClientType, Validator, ValidatorSet};
use url::Url;

use crate::error::{Error, Result};

/// One relay path as stored on disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PathConfig {
    pub src: ChainConfig,
    pub dst: ChainConfig,
    pub mnemonic: String,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Endpoint, client and channel identifiers of one chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChainConfig {
    pub chain_id: String,
    pub client_id: String,
    pub connection_id: String,
    pub channel_id: String,
    pub port_id: String,
    pub order: String,
    pub version: String,
    pub client_url: Url,
    pub eth_chain_id: u64,
    #[serde(default)]
    pub client_type: ClientType,
    /// Required for proposer-verified chains.
    #[serde(default)]
    pub validators: Vec<Validator>,
    /// IBC handler contract whose storage is proven.
    #[serde(default)]
    pub ibc_handler: Address,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SyncConfig {
    pub deadline_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 30,
            poll_interval_ms: 200,
        }
    }
}

/// Channel end of one chain, as seen by the harness.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelInfo {
    pub port_id: String,
    pub channel_id: String,
    pub client_id: String,
    pub counterparty_client_id: String,
    pub connection_id: String,
    pub version: String,
    pub order: String,
}

impl PathConfig {
    /// Load and validate a path file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let config: PathConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mnemonic.trim().is_empty() {
            return Err(Error::Config("mnemonic must not be empty".into()));
        }
        if self.sync.poll_interval_ms == 0 {
            return Err(Error::Config("sync poll-interval-ms must be positive".into()));
        }
        self.src.validate()?;
        self.dst.validate()?;
        if self.src.chain_id == self.dst.chain_id {
            return Err(Error::Config(format!(
                "src and dst share chain id {}",
                self.src.chain_id
            )));
        }
        Ok(())
    }
}

impl ChainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chain_id.is_empty() {
            return Err(Error::Config("chain-id must not be empty".into()));
        }
        match self.client_url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(Error::Config(format!(
                    "[{}] client-url must be http(s), got {}",
                    self.chain_id, scheme
                )))
            }
        }
        self.validator_set()?;
        Ok(())
    }

    /// The configured validator set, if this chain's client verifies one.
    pub fn validator_set(&self) -> Result<Option<ValidatorSet>> {
        match self.client_type {
            ClientType::Mock => Ok(None),
            ClientType::BesuIbft2 => {
                if self.validators.is_empty() {
                    return Err(Error::Config(format!(
                        "[{}] client type {} requires validators",
                        self.chain_id, self.client_type
                    )));
                }
                ValidatorSet::new(self.validators.clone())
                    .map(Some)
                    .map_err(|e| Error::Config(format!("[{}] {}", self.chain_id, e)))
            }
        }
    }

    /// This chain's channel end, facing `counterparty`.
    pub fn channel(&self, counterparty: &ChainConfig) -> ChannelInfo {
        ChannelInfo {
            port_id: self.port_id.clone(),
            channel_id: self.channel_id.clone(),
            client_id: self.client_id.clone(),
            counterparty_client_id: counterparty.client_id.clone(),
            connection_id: self.connection_id.clone(),
            version: self.version.clone(),
            order: self.order.clone(),
        }
    }
}
