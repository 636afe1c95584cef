//! A relay path: the source and destination sessions of one channel.

use std::panic;
use std::sync::Arc;
use std::thread;

use tandem_core::LightClientState;
use tracing::info;

use crate::config::PathConfig;
use crate::error::Result;
use crate::session::ChainSession;
use crate::tracker::SyncPolicy;

pub struct RelayPath {
    src: ChainSession,
    dst: ChainSession,
}

impl RelayPath {
    pub fn new(src: ChainSession, dst: ChainSession) -> Self {
        Self { src, dst }
    }

    /// Validate `config` and open JSON-RPC sessions to both chains.
    pub fn connect(config: &PathConfig) -> Result<Self> {
        config.validate()?;
        let policy = SyncPolicy::from(config.sync);
        let src = ChainSession::connect(
            config.src.clone(),
            config.src.channel(&config.dst),
            &config.mnemonic,
            policy,
        )?;
        let dst = ChainSession::connect(
            config.dst.clone(),
            config.dst.channel(&config.src),
            &config.mnemonic,
            policy,
        )?;
        info!(src = %src.chain_id(), dst = %dst.chain_id(), "relay path connected");
        Ok(Self::new(src, dst))
    }

    pub fn src(&self) -> &ChainSession {
        &self.src
    }

    pub fn dst(&self) -> &ChainSession {
        &self.dst
    }

    /// The session across the channel from the chain named `chain_id`.
    pub fn counterparty(&self, chain_id: &str) -> Option<&ChainSession> {
        if self.src.chain_id() == chain_id {
            Some(&self.dst)
        } else if self.dst.chain_id() == chain_id {
            Some(&self.src)
        } else {
            None
        }
    }

    /// Sync both chains' headers concurrently.
    ///
    /// Both syncs run to completion; the source's error is reported first.
    pub fn update_headers(&self) -> Result<(Arc<LightClientState>, Arc<LightClientState>)> {
        let (src, dst) = thread::scope(|s| {
            let src = s.spawn(|| self.src.update_header());
            let dst = self.dst.update_header();
            let src = src.join().unwrap_or_else(|payload| panic::resume_unwind(payload));
            (src, dst)
        });
        Ok((src?, dst?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::path;
    use crate::error::Error;
    use crate::gateway::RpcError;
    use crate::testing::MockGateway;
    use std::time::{Duration, Instant};
    use tandem_core::testing::{plain_header, TEST_MNEMONIC};

    fn policy() -> SyncPolicy {
        SyncPolicy {
            deadline: Duration::from_millis(200),
            poll_interval: Duration::from_millis(5),
        }
    }

    fn relay(src_gateway: &Arc<MockGateway>, dst_gateway: &Arc<MockGateway>) -> RelayPath {
        let config = path();
        let src = ChainSession::new(
            config.src.clone(),
            config.src.channel(&config.dst),
            TEST_MNEMONIC,
            policy(),
            src_gateway.clone(),
        )
        .unwrap();
        let dst = ChainSession::new(
            config.dst.clone(),
            config.dst.channel(&config.src),
            TEST_MNEMONIC,
            policy(),
            dst_gateway.clone(),
        )
        .unwrap();
        RelayPath::new(src, dst)
    }

    #[test]
    fn test_channels_face_each_other() {
        let relay = relay(&Arc::new(MockGateway::new()), &Arc::new(MockGateway::new()));
        assert_eq!(relay.src().channel().counterparty_client_id, relay.dst().channel().client_id);
        assert_eq!(relay.dst().channel().counterparty_client_id, relay.src().channel().client_id);
        assert_eq!(relay.counterparty("ibc0").unwrap().chain_id(), "ibc1");
        assert_eq!(relay.counterparty("ibc1").unwrap().chain_id(), "ibc0");
        assert!(relay.counterparty("ibc2").is_none());
    }

    #[test]
    fn test_update_headers_syncs_both_chains_concurrently() {
        let src_gateway = Arc::new(MockGateway::new());
        let dst_gateway = Arc::new(MockGateway::new());
        src_gateway.set_block_delay(Duration::from_millis(100));
        dst_gateway.set_block_delay(Duration::from_millis(100));
        src_gateway.push_block(plain_header(10));
        dst_gateway.push_block(plain_header(500));
        let relay = relay(&src_gateway, &dst_gateway);

        let started = Instant::now();
        let (src, dst) = relay.update_headers().unwrap();
        assert_eq!(src.height(), 10);
        assert_eq!(dst.height(), 500);
        // Two 100ms fetches side by side, not back to back
        assert!(started.elapsed() < Duration::from_millis(195));
    }

    #[test]
    fn test_one_failing_chain_fails_the_update() {
        let src_gateway = Arc::new(MockGateway::new());
        let dst_gateway = Arc::new(MockGateway::new());
        src_gateway.push_block(plain_header(10));
        dst_gateway.push_error(RpcError::InvalidResponse("bad block".into()));
        let relay = relay(&src_gateway, &dst_gateway);

        let err = relay.update_headers().unwrap_err();
        assert_eq!(err.chain_id(), Some("ibc1"));
        assert!(matches!(err, Error::Rpc { .. }));
        // The healthy chain still advanced
        assert_eq!(relay.src().last_header().unwrap().number, 10);
    }

    #[test]
    fn test_connect_rejects_invalid_path() {
        let mut config = path();
        config.mnemonic.clear();
        assert!(matches!(RelayPath::connect(&config), Err(Error::Config(_))));
    }
}
