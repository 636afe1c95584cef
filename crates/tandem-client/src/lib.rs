//! # Tandem Client
//!
//! Chain sessions for the tandem relay harness: everything that talks to a
//! chain endpoint. Headers and proofs fetched here are handed to
//! `tandem-core` for verification before anything is trusted.
//!
//! ## Layers
//!
//! - **Gateway** (`gateway`, `rpc`): blocking access to a chain's JSON-RPC
//!   endpoint. No retries at this layer.
//! - **Light client** (`proof_builder`, `registry`, `tracker`): turns blocks
//!   into [`tandem_core::LightClientState`] values per client type and keeps
//!   the accepted height monotonic under a deadline.
//! - **Sessions** (`session`, `relay`): per-chain keys, transaction
//!   submission and state, paired into a relay path from one config file.
//!
//! ## Usage
//!
//! ```ignore
//! use tandem_client::{PathConfig, RelayPath};
//!
//! tandem_client::logging::init();
//! let config = PathConfig::load("path.json")?;
//! let relay = RelayPath::connect(&config)?;
//! let (src, dst) = relay.update_headers()?;
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod proof_builder;
pub mod registry;
pub mod relay;
pub mod rpc;
pub mod session;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use config::{ChainConfig, ChannelInfo, PathConfig, SyncConfig};
pub use error::{Error, Result};
pub use gateway::{BlockTag, RpcError, RpcGateway, TxReceipt};
pub use proof_builder::ProofBuilder;
pub use registry::{ClientMode, ClientRegistry};
pub use relay::RelayPath;
pub use rpc::JsonRpcGateway;
pub use session::ChainSession;
pub use tracker::{HeaderTracker, SyncPolicy, SyncState};
