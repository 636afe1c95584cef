use alloy_primitives::Bytes;

/// An Ethereum execution-layer block header, as produced by both the mock
/// chain and Besu IBFT 2.0 chains.
///
/// Optional fork fields (London base fee, Shanghai withdrawals root, Cancun
/// blob gas and beacon root, Prague requests hash) round-trip through RLP, so
/// `hash_slow` matches the node for any fork. IBFT 2.0 chains report a
/// different hash; see [`crate::consensus::block_hash`].
pub type BlockHeader = alloy_consensus::Header;

/// Default gas limit attached to harness transactions.
pub const DEFAULT_GAS_LIMIT: u64 = 6_382_056;

/// Header edits needed to rebuild IBFT hashing pre-images.
pub trait HeaderExt {
    /// Copy of this header with the extra-data field replaced.
    fn with_extra_data(&self, extra_data: Bytes) -> Self;
}

impl HeaderExt for BlockHeader {
    fn with_extra_data(&self, extra_data: Bytes) -> Self {
        Self {
            extra_data,
            ..self.clone()
        }
    }
}

/// Decode a header from its raw RLP bytes, rejecting trailing data.
pub fn decode_header(raw: &[u8]) -> alloy_rlp::Result<BlockHeader> {
    alloy_rlp::decode_exact(raw)
}
