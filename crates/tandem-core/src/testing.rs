//! Fixtures for tests: IBFT 2.0 headers carrying real secp256k1 commit seals,
//! and single-leaf Merkle-Patricia tries with their proofs.
//!
//! Also fixed IBFT 2.0 and Cancun block vectors whose RLP, hashes and seals
//! were computed outside this crate.
//!
//! Compiled for this crate's tests and for dependents that enable `test-utils`.

use crate::consensus::extra::IbftExtra;
use crate::consensus::seal::commit_seal_signing_hash;
use crate::types::block::{BlockHeader, HeaderExt};
use crate::types::execution::{AccountState, ProofBundle, StorageProofEntry};
use crate::types::validator::ValidatorSet;
use alloy_primitives::{address, b256, keccak256, Address, Bytes, B256, U256};
use alloy_rlp::Encodable;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use hex_literal::hex;

/// The well-known development mnemonic.
pub const TEST_MNEMONIC: &str = "test test test test test test test test test test test junk";

/// A header with empty extra-data and the given number.
pub fn plain_header(number: u64) -> BlockHeader {
    BlockHeader {
        ommers_hash: B256::ZERO,
        state_root: B256::repeat_byte(0x5A),
        transactions_root: B256::ZERO,
        receipts_root: B256::ZERO,
        difficulty: U256::from(1),
        number,
        gas_limit: 30_000_000,
        timestamp: 1_700_000_000 + number,
        ..Default::default()
    }
}

/// Builds IBFT 2.0 headers signed by a deterministic validator set.
///
/// Validator `i` uses the private key `i + 1`; validator 0 is the proposer.
#[derive(Clone)]
pub struct IbftHeaderBuilder {
    number: u64,
    state_root: B256,
    validators: Vec<PrivateKeySigner>,
}

impl IbftHeaderBuilder {
    pub fn new(number: u64, validator_count: usize) -> Self {
        let validators = (0..validator_count)
            .map(|i| test_signer(i as u64 + 1))
            .collect();
        Self {
            number,
            state_root: B256::repeat_byte(0x5A),
            validators,
        }
    }

    pub fn with_state_root(mut self, state_root: B256) -> Self {
        self.state_root = state_root;
        self
    }

    /// Same validators, different block number.
    pub fn at_height(&self, number: u64) -> Self {
        Self {
            number,
            ..self.clone()
        }
    }

    pub fn address(&self, index: usize) -> Address {
        self.validators[index].address()
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.validators.iter().map(PrivateKeySigner::address).collect()
    }

    pub fn validator_set(&self) -> ValidatorSet {
        ValidatorSet::with_equal_power(&self.addresses()).expect("builder has validators")
    }

    fn base_header(&self) -> BlockHeader {
        BlockHeader {
            beneficiary: self.validators.first().map_or(Address::ZERO, |v| v.address()),
            state_root: self.state_root,
            ..plain_header(self.number)
        }
    }

    /// Header whose extra-data lists `validators` but carries no seals.
    pub fn unsealed_with_validators(&self, validators: Vec<Address>) -> BlockHeader {
        let extra = IbftExtra {
            vanity: B256::ZERO,
            validators,
            vote: None,
            round: 0,
            seals: vec![],
        };
        self.base_header().with_extra_data(extra.encode_to_bytes())
    }

    /// Header sealed by the validators at `signers` (indices may repeat).
    pub fn sealed_by(&self, signers: &[usize]) -> BlockHeader {
        let keys: Vec<&PrivateKeySigner> = signers.iter().map(|&i| &self.validators[i]).collect();
        self.seal(&keys)
    }

    /// Like [`Self::sealed_by`], with one extra seal from a non-validator appended.
    pub fn sealed_by_with_outsider(&self, signers: &[usize]) -> BlockHeader {
        let outsider = test_signer(0xDEAD);
        let mut keys: Vec<&PrivateKeySigner> =
            signers.iter().map(|&i| &self.validators[i]).collect();
        keys.push(&outsider);
        self.seal(&keys)
    }

    fn seal(&self, keys: &[&PrivateKeySigner]) -> BlockHeader {
        let mut extra = IbftExtra {
            vanity: B256::ZERO,
            validators: self.addresses(),
            vote: None,
            round: 0,
            seals: vec![],
        };
        let header = self.base_header();
        let signing_hash = commit_seal_signing_hash(&header, &extra);

        extra.seals = keys
            .iter()
            .map(|key| {
                let signature = key.sign_hash_sync(&signing_hash).expect("sign commit seal");
                // Besu layout: r || s || recovery id (0/1)
                let mut seal = Vec::with_capacity(65);
                seal.extend_from_slice(&signature.r().to_be_bytes::<32>());
                seal.extend_from_slice(&signature.s().to_be_bytes::<32>());
                seal.push(u8::from(signature.v()));
                Bytes::from(seal)
            })
            .collect();

        header.with_extra_data(extra.encode_to_bytes())
    }
}

fn test_signer(seed: u64) -> PrivateKeySigner {
    let mut key = [0u8; 32];
    key[24..].copy_from_slice(&seed.to_be_bytes());
    PrivateKeySigner::from_bytes(&B256::from(key)).expect("valid secp256k1 scalar")
}

/// A trie holding exactly one `key -> value` leaf. Returns (root, proof).
fn single_leaf_trie(hashed_key: B256, value: Bytes) -> (B256, Vec<Bytes>) {
    let mut path = Vec::with_capacity(33);
    path.push(0x20); // even-length leaf
    path.extend_from_slice(hashed_key.as_slice());
    let path = Bytes::from(path);

    let mut leaf = Vec::new();
    alloy_rlp::Header {
        list: true,
        payload_length: path.length() + value.length(),
    }
    .encode(&mut leaf);
    path.encode(&mut leaf);
    value.encode(&mut leaf);

    (keccak256(&leaf), vec![Bytes::from(leaf)])
}

/// Storage trie with a single non-zero slot.
pub fn storage_trie(slot: B256, value: U256) -> (B256, Vec<Bytes>) {
    single_leaf_trie(keccak256(slot), alloy_rlp::encode(value).into())
}

/// State trie with a single account.
pub fn account_trie(address: Address, account: &AccountState) -> (B256, Vec<Bytes>) {
    let payload_length = account.nonce.length()
        + account.balance.length()
        + account.storage_root.length()
        + account.code_hash.length();
    let mut encoded = Vec::new();
    alloy_rlp::Header {
        list: true,
        payload_length,
    }
    .encode(&mut encoded);
    account.nonce.encode(&mut encoded);
    account.balance.encode(&mut encoded);
    account.storage_root.encode(&mut encoded);
    account.code_hash.encode(&mut encoded);

    single_leaf_trie(keccak256(address), encoded.into())
}

/// A contract with one storage slot, and a bundle proving it.
pub struct ContractFixture {
    pub state_root: B256,
    pub bundle: ProofBundle,
}

pub fn contract_with_slot(
    address: Address,
    slot: B256,
    value: U256,
    height: u64,
) -> ContractFixture {
    let (storage_root, storage_proof) = storage_trie(slot, value);
    let account = AccountState {
        nonce: 1,
        balance: U256::ZERO,
        storage_root,
        code_hash: keccak256(b"contract code"),
    };
    let (state_root, account_proof) = account_trie(address, &account);

    ContractFixture {
        state_root,
        bundle: ProofBundle {
            address,
            height,
            account_proof,
            storage_hash: storage_root,
            entries: vec![StorageProofEntry {
                key: slot,
                value,
                proof: storage_proof,
            }],
        },
    }
}

/// Validators of the sealed IBFT 2.0 vector block, in extra-data order.
pub const IBFT2_VECTOR_VALIDATORS: [Address; 4] = [
    address!("2c7536e3605d9c16a7a3d7b1898e529396a65c23"),
    address!("63fac9201494f0bd17b9892b9fae4d52fe3bd377"),
    address!("f17f52151ebef6c7334fad080c5704d77216b732"),
    address!("c5fdf4076b8f3a5357c5e395ab970b5b54098fef"),
];

/// RLP of block 6699 of a four-validator Besu IBFT 2.0 chain, round 2,
/// committed by the first three validators.
pub const IBFT2_VECTOR_HEADER_RLP: &[u8] = &hex!(
    "f90348a0a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a01dcc4de8dec75d"
    "7aab85b567b6ccd41ad312451b948a7413f0a142fd40d493479463fac9201494f0bd17b9892b9fae4d52fe3b"
    "d377a05f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5fa056e81f171bcc55a6"
    "ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421a056e81f171bcc55a6ff8345e692c0f86e5b48e0"
    "1b996cadc001622fb5e363b421b9010000000000000000000000000000000000000000000000000000000000"
    "0000000000000000000000000000000000000000000000000000000000000000000000000000000000000000"
    "0000000000000000000000000000000000000000000000000000000000000000000000000000000000000000"
    "0000000000000000000000000000000000000000000000000000000000000000000000000000000000000000"
    "0000000000000000000000000000000000000000000000000000000000000000000000000000000000000000"
    "0000000000000000000000000000000000000000000000000000000000000000000000000000000000000000"
    "000000000000000001821a2b871fffffffffffff808465f1e3c0b9014bf90148a00000000000000000000000"
    "000000000000000000000000000000000000000000f854942c7536e3605d9c16a7a3d7b1898e529396a65c23"
    "9463fac9201494f0bd17b9892b9fae4d52fe3bd37794f17f52151ebef6c7334fad080c5704d77216b73294c5"
    "fdf4076b8f3a5357c5e395ab970b5b54098fef808400000002f8c9b841221ca3e5c18d575d3cbb13fe781ee2"
    "c4425b22a3c797b803ba19dd6bd4c5b5d770022d20f841d2ce514187ee6cb16ab8e18f58b044ddf1586a9671"
    "4b4101aa1101b841e2398fa00ba864c8fbe5563dbcbda5f842f59b926f51fa79031b6aa93c10d6e044aa5787"
    "08981a083be9fc9fb055c68104655d38e6182a0adabf092d35bb51d400b8417b5ff8eea0356c7df556e6208a"
    "6ef45f72f0533ec6782a3e5169181eda6d897a4ee64edebfafe7549e78bc74508972148dff608db3154a944d"
    "47833f750a78e800a063746963616c2062797a616e74696e65206661756c7420746f6c6572616e6365880000"
    "00000000000007"
    );

/// The hash the node reports for the vector block: the header hashed with
/// seals and round stripped from the extra-data.
pub const IBFT2_VECTOR_BLOCK_HASH: B256 =
    b256!("5069bd87be78b021004fde9982f821f091aa5f672e7900dc6dd4b244888a403d");

/// The digest the vector block's commit seals sign.
pub const IBFT2_VECTOR_SIGNING_HASH: B256 =
    b256!("7f4a22d1ffb290fef6adc4c1b7c022e197e4d8ee6d8353323e2480431e5075f3");

/// `eth_getBlockByNumber` result for the vector block.
pub const IBFT2_VECTOR_BLOCK_JSON: &str = concat!(
    r#"{"number":"0x1a2b","hash":"0x5069bd87be78b021004fde9982f821f091aa5f672e7900dc6dd4b24"#,
    r#"4888a403d","mixHash":"0x63746963616c2062797a616e74696e65206661756c7420746f6c6572616e"#,
    r#"6365","parentHash":"0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1"#,
    r#"a1","nonce":"0x0000000000000000","sha3Uncles":"0x1dcc4de8dec75d7aab85b567b6ccd41ad31"#,
    r#"2451b948a7413f0a142fd40d49347","logsBloom":"0x00000000000000000000000000000000000000"#,
    r#"000000000000000000000000000000000000000000000000000000000000000000000000000000000000"#,
    r#"000000000000000000000000000000000000000000000000000000000000000000000000000000000000"#,
    r#"000000000000000000000000000000000000000000000000000000000000000000000000000000000000"#,
    r#"000000000000000000000000000000000000000000000000000000000000000000000000000000000000"#,
    r#"000000000000000000000000000000000000000000000000000000000000000000000000000000000000"#,
    r#"000000000000000000000000000000000000000000000000000000","transactionsRoot":"0x56e81f"#,
    r#"171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421","stateRoot":"0x5f5f5f5f5"#,
    r#"f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f5f","receiptsRoot":"0x56e81f171"#,
    r#"bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421","miner":"0x63fac9201494f0bd"#,
    r#"17b9892b9fae4d52fe3bd377","difficulty":"0x1","totalDifficulty":"0x1a2c","extraData":"#,
    r#""0xf90148a00000000000000000000000000000000000000000000000000000000000000000f854942c7"#,
    r#"536e3605d9c16a7a3d7b1898e529396a65c239463fac9201494f0bd17b9892b9fae4d52fe3bd37794f17"#,
    r#"f52151ebef6c7334fad080c5704d77216b73294c5fdf4076b8f3a5357c5e395ab970b5b54098fef80840"#,
    r#"0000002f8c9b841221ca3e5c18d575d3cbb13fe781ee2c4425b22a3c797b803ba19dd6bd4c5b5d770022"#,
    r#"d20f841d2ce514187ee6cb16ab8e18f58b044ddf1586a96714b4101aa1101b841e2398fa00ba864c8fbe"#,
    r#"5563dbcbda5f842f59b926f51fa79031b6aa93c10d6e044aa578708981a083be9fc9fb055c68104655d3"#,
    r#"8e6182a0adabf092d35bb51d400b8417b5ff8eea0356c7df556e6208a6ef45f72f0533ec6782a3e51691"#,
    r#"81eda6d897a4ee64edebfafe7549e78bc74508972148dff608db3154a944d47833f750a78e800","base"#,
    r#"FeePerGas":"0x7","size":"0x34b","gasLimit":"0x1fffffffffffff","gasUsed":"0x0","times"#,
    r#"tamp":"0x65f1e3c0","uncles":[],"transactions":[]}"#,
);

/// RLP of a Cancun-era header: withdrawals root, blob gas and parent beacon
/// root all present.
pub const CANCUN_VECTOR_HEADER_RLP: &[u8] = &hex!(
    "f90254a0c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3a01dcc4de8dec75d"
    "7aab85b567b6ccd41ad312451b948a7413f0a142fd40d493479495222290dd7278aa3ddd389cc1e1d165cc4b"
    "afe5a07a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7aa056e81f171bcc55a6"
    "ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421a056e81f171bcc55a6ff8345e692c0f86e5b48e0"
    "1b996cadc001622fb5e363b421b9010000000000000000000000000000000000000000000000000000000000"
    "0000000000000000000000000000000000000000000000000000000000000000000000000000000000000000"
    "0000000000000000000000000000000000000000000000000000000000000000000000000000000000000000"
    "0000000000000000000000000000000000000000000000000000000000000000000000000000000000000000"
    "0000000000000000000000000000000000000000000000000000000000000000000000000000000000000000"
    "0000000000000000000000000000000000000000000000000000000000000000000000000000000000000000"
    "0000000000000000808401298be08401c9c380808465fadf608b726574682f76302e322e30a09e9e9e9e9e9e"
    "9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e8800000000000000008502dfdc1c35a056e8"
    "1f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b4218304000083060000a0b4b4b4b4b4"
    "b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4"
    );

pub const CANCUN_VECTOR_BLOCK_HASH: B256 =
    b256!("7cf90a9101f38d7f70e0ed099e48f23a197e8f81ce9ff55fffebf1a19e6c79a0");

/// `eth_getBlockByNumber` result for the Cancun vector block.
pub const CANCUN_VECTOR_BLOCK_JSON: &str = concat!(
    r#"{"number":"0x1298be0","hash":"0x7cf90a9101f38d7f70e0ed099e48f23a197e8f81ce9ff55fffeb"#,
    r#"f1a19e6c79a0","mixHash":"0x9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9e9"#,
    r#"e9e9e9e","parentHash":"0xc3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c"#,
    r#"3c3c3","nonce":"0x0000000000000000","sha3Uncles":"0x1dcc4de8dec75d7aab85b567b6ccd41a"#,
    r#"d312451b948a7413f0a142fd40d49347","logsBloom":"0x00000000000000000000000000000000000"#,
    r#"000000000000000000000000000000000000000000000000000000000000000000000000000000000000"#,
    r#"000000000000000000000000000000000000000000000000000000000000000000000000000000000000"#,
    r#"000000000000000000000000000000000000000000000000000000000000000000000000000000000000"#,
    r#"000000000000000000000000000000000000000000000000000000000000000000000000000000000000"#,
    r#"000000000000000000000000000000000000000000000000000000000000000000000000000000000000"#,
    r#"000000000000000000000000000000000000000000000000000000000","transactionsRoot":"0x56e"#,
    r#"81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421","stateRoot":"0x7a7a7a"#,
    r#"7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a7a","receiptsRoot":"0x56e81f"#,
    r#"171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421","miner":"0x95222290dd727"#,
    r#"8aa3ddd389cc1e1d165cc4bafe5","difficulty":"0x0","totalDifficulty":"0xc70d815d562d3cf"#,
    r#"a955","extraData":"0x726574682f76302e322e30","baseFeePerGas":"0x2dfdc1c35","size":"0"#,
    r#"x257","gasLimit":"0x1c9c380","gasUsed":"0x0","timestamp":"0x65fadf60","withdrawalsRo"#,
    r#"ot":"0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421","blobGasUse"#,
    r#"d":"0x40000","excessBlobGas":"0x60000","parentBeaconBlockRoot":"0xb4b4b4b4b4b4b4b4b4"#,
    r#"b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4","uncles":[],"transactions":[],"withd"#,
    r#"rawals":[]}"#,
);

pub fn ibft2_vector_validator_set() -> ValidatorSet {
    ValidatorSet::with_equal_power(&IBFT2_VECTOR_VALIDATORS).expect("vector has validators")
}
