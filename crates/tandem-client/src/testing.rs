//! In-memory gateway for session, registry and tracker tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use parking_lot::Mutex;
use tandem_core::testing::ContractFixture;
use tandem_core::{AccountState, BlockHeader, ProofBundle, SignedTransaction};

use crate::gateway::{
    AccountProofResponse, BlockTag, RpcError, RpcGateway, StorageProofResponse, TxReceipt,
};

/// Scripted answer to one `latest` block request.
enum Step {
    Block(BlockHeader),
    Fail(RpcError),
}

/// Gateway that replays a scripted block sequence and records every call.
///
/// `latest` requests consume the script in order; once it runs dry the last
/// block served is repeated, which looks like a chain that stopped producing
/// blocks.
#[derive(Default)]
pub struct MockGateway {
    script: Mutex<VecDeque<Step>>,
    known: Mutex<HashMap<u64, BlockHeader>>,
    last_served: Mutex<Option<BlockHeader>>,
    block_delay: Mutex<Option<Duration>>,
    block_calls: AtomicUsize,

    slots: Mutex<HashMap<B256, U256>>,
    contract: Mutex<Option<ProofBundle>>,
    proof_failure: Mutex<Option<RpcError>>,
    drop_last_entry: AtomicBool,
    reverse_entries: AtomicBool,
    proof_calls: AtomicUsize,

    submitted: Mutex<Vec<SignedTransaction>>,
    submit_failure: Mutex<Option<RpcError>>,
    revert: AtomicBool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a block for the next `latest` request.
    pub fn push_block(&self, header: BlockHeader) {
        self.known.lock().insert(header.number, header.clone());
        self.script.lock().push_back(Step::Block(header));
    }

    /// Queue a failure for the next `latest` request.
    pub fn push_error(&self, error: RpcError) {
        self.script.lock().push_back(Step::Fail(error));
    }

    /// Make every block request take at least `delay`.
    pub fn set_block_delay(&self, delay: Duration) {
        *self.block_delay.lock() = Some(delay);
    }

    pub fn set_slot(&self, key: B256, value: U256) {
        self.slots.lock().insert(key, value);
    }

    /// Serve real proofs for the fixture's contract.
    pub fn set_contract(&self, fixture: &ContractFixture) {
        *self.contract.lock() = Some(fixture.bundle.clone());
    }

    pub fn fail_proofs(&self, error: RpcError) {
        *self.proof_failure.lock() = Some(error);
    }

    pub fn drop_last_proof_entry(&self, enabled: bool) {
        self.drop_last_entry.store(enabled, Ordering::SeqCst);
    }

    pub fn reverse_proof_entries(&self, enabled: bool) {
        self.reverse_entries.store(enabled, Ordering::SeqCst);
    }

    pub fn fail_submissions(&self, error: RpcError) {
        *self.submit_failure.lock() = Some(error);
    }

    pub fn revert_submissions(&self, enabled: bool) {
        self.revert.store(enabled, Ordering::SeqCst);
    }

    pub fn block_calls(&self) -> usize {
        self.block_calls.load(Ordering::SeqCst)
    }

    pub fn proof_calls(&self) -> usize {
        self.proof_calls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<SignedTransaction> {
        self.submitted.lock().clone()
    }

    fn fake_entries(&self, keys: &[B256]) -> Vec<StorageProofResponse> {
        let slots = self.slots.lock();
        keys.iter()
            .map(|key| StorageProofResponse {
                key: U256::from_be_bytes(key.0),
                value: slots.get(key).copied().unwrap_or_default(),
                proof: vec![],
            })
            .collect()
    }
}

impl RpcGateway for MockGateway {
    fn block(&self, tag: BlockTag) -> Result<BlockHeader, RpcError> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = *self.block_delay.lock() {
            thread::sleep(delay);
        }

        match tag {
            BlockTag::Number(n) => self
                .known
                .lock()
                .get(&n)
                .cloned()
                .ok_or_else(|| RpcError::NotFound(format!("block {}", n))),
            BlockTag::Latest => {
                let step = self.script.lock().pop_front();
                match step {
                    Some(Step::Block(header)) => {
                        *self.last_served.lock() = Some(header.clone());
                        Ok(header)
                    }
                    Some(Step::Fail(error)) => Err(error),
                    None => self
                        .last_served
                        .lock()
                        .clone()
                        .ok_or_else(|| RpcError::NotFound("latest block".into())),
                }
            }
        }
    }

    fn storage_proof(
        &self,
        address: Address,
        keys: &[B256],
        _height: u64,
    ) -> Result<AccountProofResponse, RpcError> {
        self.proof_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.proof_failure.lock().clone() {
            return Err(error);
        }

        let mut response = match self.contract.lock().as_ref() {
            Some(bundle) => AccountProofResponse {
                address,
                account_proof: bundle.account_proof.clone(),
                balance: U256::ZERO,
                code_hash: AccountState::EMPTY_CODE_HASH,
                nonce: U256::from(1),
                storage_hash: bundle.storage_hash,
                storage_proof: keys
                    .iter()
                    .map(|key| match bundle.entry(key) {
                        Some(entry) => StorageProofResponse {
                            key: U256::from_be_bytes(key.0),
                            value: entry.value,
                            proof: entry.proof.clone(),
                        },
                        None => StorageProofResponse {
                            key: U256::from_be_bytes(key.0),
                            value: U256::ZERO,
                            proof: bundle
                                .entries
                                .first()
                                .map(|e| e.proof.clone())
                                .unwrap_or_default(),
                        },
                    })
                    .collect(),
            },
            None => AccountProofResponse {
                address,
                account_proof: vec![],
                balance: U256::ZERO,
                code_hash: AccountState::EMPTY_CODE_HASH,
                nonce: U256::ZERO,
                storage_hash: AccountState::EMPTY_STORAGE_ROOT,
                storage_proof: self.fake_entries(keys),
            },
        };

        if self.drop_last_entry.load(Ordering::SeqCst) {
            response.storage_proof.pop();
        }
        if self.reverse_entries.load(Ordering::SeqCst) {
            response.storage_proof.reverse();
        }
        Ok(response)
    }

    fn nonce(&self, address: Address) -> Result<u64, RpcError> {
        let sent = self
            .submitted
            .lock()
            .iter()
            .filter(|tx| tx.from() == address)
            .count();
        Ok(sent as u64)
    }

    fn submit(&self, tx: &SignedTransaction) -> Result<TxReceipt, RpcError> {
        if let Some(error) = self.submit_failure.lock().clone() {
            return Err(error);
        }
        self.submitted.lock().push(tx.clone());
        Ok(TxReceipt {
            transaction_hash: tx.hash(),
            block_number: Some(1),
            gas_used: Some(21_000),
            status: Some(!self.revert.load(Ordering::SeqCst)),
        })
    }
}
