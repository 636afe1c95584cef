//! Monotonic header tracking with a hard deadline.
//!
//! A tracker keeps the last accepted [`LightClientState`] of one chain and
//! only ever replaces it with a strictly higher one. Load-balanced endpoints
//! can answer with a stale or equal-height block, so a sync polls until the
//! chain has moved past the last accepted height or the deadline expires.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use alloy_primitives::B256;
use parking_lot::RwLock;
use tandem_core::LightClientState;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::gateway::BlockTag;
use crate::registry::ClientRegistry;

/// Deadline and poll cadence of one sync operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncPolicy {
    pub deadline: Duration,
    pub poll_interval: Duration,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        SyncConfig::default().into()
    }
}

impl From<SyncConfig> for SyncPolicy {
    fn from(config: SyncConfig) -> Self {
        Self {
            deadline: Duration::from_secs(config.deadline_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

/// Where a candidate height stands against the last accepted state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    /// Candidate is not newer; keep polling.
    Behind,
    /// Candidate is strictly newer and would be accepted.
    Synced,
}

pub struct HeaderTracker {
    chain_id: String,
    policy: SyncPolicy,
    current: RwLock<Option<Arc<LightClientState>>>,
}

impl HeaderTracker {
    pub fn new(chain_id: impl Into<String>, policy: SyncPolicy) -> Self {
        Self {
            chain_id: chain_id.into(),
            policy,
            current: RwLock::new(None),
        }
    }

    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }

    /// Last accepted state, if any sync has succeeded.
    pub fn latest(&self) -> Option<Arc<LightClientState>> {
        self.current.read().clone()
    }

    pub fn last_height(&self) -> Option<u64> {
        self.current.read().as_ref().map(|state| state.height())
    }

    pub fn evaluate(&self, height: u64) -> SyncState {
        match self.last_height() {
            Some(last) if height <= last => SyncState::Behind,
            _ => SyncState::Synced,
        }
    }

    /// Poll `fetch` until it yields a state newer than the last accepted one.
    ///
    /// Retryable errors are logged and polled through; anything else aborts
    /// the sync. The deadline is checked after every attempt, so an attempt
    /// already in flight when it expires is allowed to finish.
    pub fn sync<F>(&self, mut fetch: F) -> Result<Arc<LightClientState>>
    where
        F: FnMut() -> Result<LightClientState>,
    {
        let started = Instant::now();
        let deadline = started + self.policy.deadline;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match fetch() {
                Ok(candidate) => {
                    let height = candidate.height();
                    if let Some(accepted) = self.try_accept(candidate) {
                        info!(
                            chain_id = %self.chain_id,
                            height,
                            verified = accepted.is_verified(),
                            attempts,
                            elapsed = ?started.elapsed(),
                            "accepted new light-client state"
                        );
                        return Ok(accepted);
                    }
                    debug!(
                        chain_id = %self.chain_id,
                        height,
                        last_height = ?self.last_height(),
                        attempts,
                        "candidate not newer than accepted state"
                    );
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        chain_id = %self.chain_id,
                        attempts,
                        error = %e,
                        "transient failure, retrying"
                    );
                }
                Err(e) => return Err(e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::SyncTimeout {
                    chain_id: self.chain_id.clone(),
                    last_height: self.last_height(),
                    deadline: self.policy.deadline,
                    attempts,
                });
            }
            thread::sleep(self.policy.poll_interval.min(deadline - now));
        }
    }

    /// Sync through `registry`, proving `keys` at each candidate's height.
    pub fn sync_with(
        &self,
        registry: &ClientRegistry,
        keys: &[B256],
    ) -> Result<Arc<LightClientState>> {
        self.sync(|| registry.fetch(keys, BlockTag::Latest))
    }

    /// Swap in `candidate` if it is still newer once the write lock is held.
    fn try_accept(&self, candidate: LightClientState) -> Option<Arc<LightClientState>> {
        let mut current = self.current.write();
        let newer = current
            .as_ref()
            .map_or(true, |last| candidate.height() > last.height());
        if !newer {
            return None;
        }
        let accepted = Arc::new(candidate);
        *current = Some(Arc::clone(&accepted));
        Some(accepted)
    }
}
