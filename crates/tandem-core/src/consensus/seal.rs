use crate::consensus::extra::{IbftExtra, SEAL_LENGTH};
use crate::types::block::{decode_header, BlockHeader, HeaderExt};
use crate::types::validator::{ValidatorSet, ValidatorSetError};
use alloy_primitives::{Address, Bytes, Signature, B256};
use thiserror::Error;

/// Reasons a header's consensus evidence is rejected.
/// Each variant is specific enough to tell which part of the evidence failed.
#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("Malformed header RLP: {reason}")]
    MalformedHeader { reason: String },

    #[error("Malformed IBFT extra-data in block {number}: {reason}")]
    MalformedExtraData { number: u64, reason: String },

    #[error("Malformed commit seal {index} in block {number}: {reason}")]
    MalformedSeal {
        number: u64,
        index: usize,
        reason: String,
    },

    #[error("Commit seal {index} in block {number} was signed by {signer}, which is not a validator")]
    UnknownSigner {
        number: u64,
        index: usize,
        signer: Address,
    },

    #[error("Insufficient quorum in block {number}: {signers} distinct signers with power {signed_power}/{total_power} (need {required})")]
    InsufficientQuorum {
        number: u64,
        signers: usize,
        signed_power: u128,
        total_power: u128,
        required: u128,
    },

    #[error("Invalid validator set in block {number}: {source}")]
    InvalidValidatorSet {
        number: u64,
        #[source]
        source: ValidatorSetError,
    },
}

/// A header whose commit seals have been checked against a validator set.
///
/// There is no public constructor: the only way to obtain one is
/// [`validate_commit_seals`], so holding a `ConsensusHeader` means quorum passed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsensusHeader {
    header: BlockHeader,
    hash: B256,
    signing_hash: B256,
    extra: IbftExtra,
    signers: Vec<Address>,
    signed_power: u128,
    total_power: u128,
}

impl ConsensusHeader {
    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// The block hash the chain reports: keccak256 of the header with seals
    /// and round removed from the extra-data.
    pub fn hash(&self) -> B256 {
        self.hash
    }

    /// The digest every commit seal signs.
    pub fn signing_hash(&self) -> B256 {
        self.signing_hash
    }

    /// IBFT 2.0 records the block proposer as the header beneficiary.
    pub fn proposer(&self) -> Address {
        self.header.beneficiary
    }

    pub fn round(&self) -> u32 {
        self.extra.round
    }

    pub fn extra(&self) -> &IbftExtra {
        &self.extra
    }

    /// Raw commit seals as they appeared in the header.
    pub fn commit_seals(&self) -> &[Bytes] {
        &self.extra.seals
    }

    /// Distinct validators whose seals verified, in seal order.
    pub fn signers(&self) -> &[Address] {
        &self.signers
    }

    pub fn signed_power(&self) -> u128 {
        self.signed_power
    }

    pub fn total_power(&self) -> u128 {
        self.total_power
    }
}

/// Compute the hash IBFT 2.0 validators sign when committing `header`:
/// keccak256 of the header RLP with the seals removed from the extra-data.
pub fn commit_seal_signing_hash(header: &BlockHeader, extra: &IbftExtra) -> B256 {
    header
        .with_extra_data(extra.encode_without_seals())
        .hash_slow()
}

/// Compute the hash a Besu IBFT 2.0 node reports for `header`: keccak256 of
/// the header RLP with both seals and round removed from the extra-data.
pub fn ibft_block_hash(header: &BlockHeader, extra: &IbftExtra) -> B256 {
    header.with_extra_data(extra.encode_onchain()).hash_slow()
}

/// The hash a node reports for `header`.
///
/// Headers whose extra-data parses as IBFT 2.0 hash per [`ibft_block_hash`];
/// any other header hashes over its full RLP.
pub fn block_hash(header: &BlockHeader) -> B256 {
    match IbftExtra::decode_exact(&header.extra_data) {
        Ok(extra) => ibft_block_hash(header, &extra),
        Err(_) => header.hash_slow(),
    }
}

/// Parse the IBFT 2.0 extra-data of `header`.
pub fn parse_extra(header: &BlockHeader) -> Result<IbftExtra, ConsensusError> {
    IbftExtra::decode_exact(&header.extra_data).map_err(|e| ConsensusError::MalformedExtraData {
        number: header.number,
        reason: e.to_string(),
    })
}

/// The equal-weight validator set a header's extra-data announces.
/// Useful to bootstrap trust from a genesis or checkpoint header.
pub fn validator_set_from_header(header: &BlockHeader) -> Result<ValidatorSet, ConsensusError> {
    let extra = parse_extra(header)?;
    ValidatorSet::with_equal_power(&extra.validators).map_err(|source| {
        ConsensusError::InvalidValidatorSet {
            number: header.number,
            source,
        }
    })
}

/// Decode a raw RLP header and validate its commit seals.
pub fn validate_raw_header(
    raw: &[u8],
    validators: &ValidatorSet,
) -> Result<ConsensusHeader, ConsensusError> {
    let header = decode_header(raw).map_err(|e| ConsensusError::MalformedHeader {
        reason: e.to_string(),
    })?;
    validate_commit_seals(&header, validators)
}

/// Validate a BFT-proposer header's commit seals against `validators`.
///
/// 1. Parses the extra-data into vanity, validators, vote, round and seals
/// 2. Recomputes the seal-free signing hash of the header
/// 3. Recovers the signer of every seal and checks it is a validator
/// 4. Requires the distinct signers to hold more than 2/3 of the voting power
///
/// Pure function: no state is read or written besides the inputs.
pub fn validate_commit_seals(
    header: &BlockHeader,
    validators: &ValidatorSet,
) -> Result<ConsensusHeader, ConsensusError> {
    let number = header.number;
    let extra = parse_extra(header)?;
    let signing_hash = commit_seal_signing_hash(header, &extra);

    let mut signers: Vec<Address> = Vec::with_capacity(extra.seals.len());
    let mut signed_power: u128 = 0;

    for (index, seal) in extra.seals.iter().enumerate() {
        let signer = recover_seal_signer(seal, &signing_hash).map_err(|reason| {
            ConsensusError::MalformedSeal {
                number,
                index,
                reason,
            }
        })?;

        let power = validators
            .power_of(&signer)
            .ok_or(ConsensusError::UnknownSigner {
                number,
                index,
                signer,
            })?;

        // A validator sealing twice still only counts once
        if !signers.contains(&signer) {
            signers.push(signer);
            signed_power += u128::from(power);
        }
    }

    if !validators.has_quorum(signed_power) {
        return Err(ConsensusError::InsufficientQuorum {
            number,
            signers: signers.len(),
            signed_power,
            total_power: validators.total_power(),
            required: validators.quorum_power(),
        });
    }

    Ok(ConsensusHeader {
        header: header.clone(),
        hash: ibft_block_hash(header, &extra),
        signing_hash,
        extra,
        signers,
        signed_power,
        total_power: validators.total_power(),
    })
}

/// Recover the address that produced a 65-byte `r || s || v` seal over `hash`.
/// Besu writes `v` as the raw recovery id (0/1); 27/28 is accepted too.
fn recover_seal_signer(seal: &[u8], hash: &B256) -> Result<Address, String> {
    if seal.len() != SEAL_LENGTH {
        return Err(format!(
            "expected {} bytes, got {}",
            SEAL_LENGTH,
            seal.len()
        ));
    }
    let signature = Signature::from_raw(seal).map_err(|e| e.to_string())?;
    signature
        .recover_address_from_prehash(hash)
        .map_err(|e| format!("signature recovery failed: {}", e))
}
