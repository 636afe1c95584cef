use crate::keys::vault::{KeyEntry, KeyError};
use crate::types::block::DEFAULT_GAS_LIMIT;
use alloy_primitives::{keccak256, Address, Bytes, Signature, B256, U256};
use alloy_rlp::{BufMut, Encodable, EMPTY_STRING_CODE};
use alloy_signer::SignerSync;
use std::sync::Arc;

/// A legacy (pre-EIP-2718) transaction, signed with EIP-155 replay protection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    /// `None` deploys a contract.
    pub to: Option<Address>,
    pub value: U256,
    pub input: Bytes,
}

impl LegacyTransaction {
    /// A contract call with the harness's default gas limit.
    pub fn call(nonce: u64, to: Address, input: Bytes) -> Self {
        Self {
            nonce,
            gas_price: 0,
            gas_limit: DEFAULT_GAS_LIMIT,
            to: Some(to),
            value: U256::ZERO,
            input,
        }
    }

    /// EIP-155 digest: keccak256(rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0])).
    pub fn signature_hash(&self, chain_id: u64) -> B256 {
        let payload_length = self.fields_length() + chain_id.length() + 2;
        let mut out = Vec::with_capacity(payload_length + 3);
        alloy_rlp::Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        self.encode_fields(&mut out);
        chain_id.encode(&mut out);
        0u8.encode(&mut out);
        0u8.encode(&mut out);
        keccak256(&out)
    }

    fn to_length(&self) -> usize {
        self.to.map_or(1, |to| to.length())
    }

    fn fields_length(&self) -> usize {
        self.nonce.length()
            + self.gas_price.length()
            + self.gas_limit.length()
            + self.to_length()
            + self.value.length()
            + self.input.length()
    }

    fn encode_fields(&self, out: &mut dyn BufMut) {
        self.nonce.encode(out);
        self.gas_price.encode(out);
        self.gas_limit.encode(out);
        match self.to {
            Some(to) => to.encode(out),
            None => out.put_u8(EMPTY_STRING_CODE),
        }
        self.value.encode(out);
        self.input.encode(out);
    }
}

/// A signed legacy transaction, ready for `eth_sendRawTransaction`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    tx: LegacyTransaction,
    chain_id: u64,
    signature: Signature,
    from: Address,
}

impl SignedTransaction {
    pub fn transaction(&self) -> &LegacyTransaction {
        &self.tx
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn from(&self) -> Address {
        self.from
    }

    /// EIP-155 `v`: `35 + 2 * chainId + parity`.
    pub fn v(&self) -> u128 {
        35 + 2 * u128::from(self.chain_id) + u128::from(self.signature.v())
    }

    fn payload_length(&self) -> usize {
        self.tx.fields_length()
            + self.v().length()
            + self.signature.r().length()
            + self.signature.s().length()
    }

    /// Raw RLP bytes as submitted to the node.
    pub fn encoded(&self) -> Bytes {
        alloy_rlp::encode(self).into()
    }

    /// Transaction hash: keccak256 of the raw bytes.
    pub fn hash(&self) -> B256 {
        keccak256(alloy_rlp::encode(self))
    }
}

impl Encodable for SignedTransaction {
    fn encode(&self, out: &mut dyn BufMut) {
        alloy_rlp::Header {
            list: true,
            payload_length: self.payload_length(),
        }
        .encode(out);
        self.tx.encode_fields(out);
        self.v().encode(out);
        self.signature.r().encode(out);
        self.signature.s().encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

/// Signs on behalf of exactly one derived account, for exactly one chain.
#[derive(Clone, Debug)]
pub struct TxSigner {
    chain_id: u64,
    key: Arc<KeyEntry>,
}

impl TxSigner {
    pub(crate) fn new(chain_id: u64, key: Arc<KeyEntry>) -> Self {
        Self { chain_id, key }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn index(&self) -> u32 {
        self.key.index()
    }

    pub fn address(&self) -> Address {
        self.key.address()
    }

    /// Sign `digest` as `from`. Fails if `from` is not this signer's account.
    pub fn sign_digest(&self, from: Address, digest: &B256) -> Result<Signature, KeyError> {
        let expected = self.key.address();
        if from != expected {
            return Err(KeyError::UnauthorizedSigner {
                index: self.key.index(),
                expected,
                requested: from,
            });
        }
        self.key
            .signer()
            .sign_hash_sync(digest)
            .map_err(|e| KeyError::Signing {
                index: self.key.index(),
                reason: e.to_string(),
            })
    }

    /// Sign `tx` as `from` with this signer's chain id embedded in the digest.
    pub fn sign_transaction(
        &self,
        from: Address,
        tx: LegacyTransaction,
    ) -> Result<SignedTransaction, KeyError> {
        let digest = tx.signature_hash(self.chain_id);
        let signature = self.sign_digest(from, &digest)?;
        Ok(SignedTransaction {
            tx,
            chain_id: self.chain_id,
            signature,
            from,
        })
    }
}
