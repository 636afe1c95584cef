use crate::consensus::seal::{block_hash, ConsensusHeader};
use crate::execution::account::{verify_proof_bundle, VerifiedAccountState};
use crate::execution::proof::ProofError;
use crate::types::block::BlockHeader;
use crate::types::execution::ProofBundle;
use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The light-client variants the harness knows how to drive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientType {
    /// Trusts whatever the node reports. Proofs are placeholders.
    #[default]
    #[serde(rename = "mock-client")]
    Mock,
    /// Besu IBFT 2.0: headers must carry a commit-seal quorum.
    #[serde(rename = "hyperledger-besu-ibft2")]
    BesuIbft2,
}

impl ClientType {
    pub const MOCK_TAG: &'static str = "mock-client";
    pub const BESU_IBFT2_TAG: &'static str = "hyperledger-besu-ibft2";

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientType::Mock => Self::MOCK_TAG,
            ClientType::BesuIbft2 => Self::BESU_IBFT2_TAG,
        }
    }

    /// Whether states of this type carry consensus evidence.
    pub fn is_verifying(&self) -> bool {
        matches!(self, ClientType::BesuIbft2)
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown client type {0:?}")]
pub struct UnknownClientType(pub String);

impl FromStr for ClientType {
    type Err = UnknownClientType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            Self::MOCK_TAG => Ok(ClientType::Mock),
            Self::BESU_IBFT2_TAG => Ok(ClientType::BesuIbft2),
            other => Err(UnknownClientType(other.to_string())),
        }
    }
}

/// State produced by the non-verifying client: the header as the node
/// reported it, plus a placeholder bundle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnverifiedState {
    pub header: BlockHeader,
    pub proof: ProofBundle,
}

/// State whose header passed commit-seal validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProposerVerifiedState {
    pub consensus: ConsensusHeader,
    pub proof: ProofBundle,
}

/// A chain state snapshot at one height.
///
/// Closed over the two client variants; consumers match exhaustively. Values
/// are immutable once built and are shared behind `Arc` by sessions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LightClientState {
    Unverified(UnverifiedState),
    ProposerVerified(ProposerVerifiedState),
}

impl LightClientState {
    pub fn unverified(header: BlockHeader, proof: ProofBundle) -> Self {
        LightClientState::Unverified(UnverifiedState { header, proof })
    }

    pub fn proposer_verified(consensus: ConsensusHeader, proof: ProofBundle) -> Self {
        LightClientState::ProposerVerified(ProposerVerifiedState { consensus, proof })
    }

    pub fn header(&self) -> &BlockHeader {
        match self {
            LightClientState::Unverified(s) => &s.header,
            LightClientState::ProposerVerified(s) => s.consensus.header(),
        }
    }

    pub fn height(&self) -> u64 {
        self.header().number
    }

    /// The hash the chain reports for this height. For IBFT 2.0 headers the
    /// seals and round are not part of it.
    pub fn block_hash(&self) -> B256 {
        match self {
            LightClientState::Unverified(s) => block_hash(&s.header),
            LightClientState::ProposerVerified(s) => s.consensus.hash(),
        }
    }

    pub fn state_root(&self) -> B256 {
        self.header().state_root
    }

    pub fn proof(&self) -> &ProofBundle {
        match self {
            LightClientState::Unverified(s) => &s.proof,
            LightClientState::ProposerVerified(s) => &s.proof,
        }
    }

    pub fn client_type(&self) -> ClientType {
        match self {
            LightClientState::Unverified(_) => ClientType::Mock,
            LightClientState::ProposerVerified(_) => ClientType::BesuIbft2,
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, LightClientState::ProposerVerified(_))
    }

    /// Consensus evidence, if this state has any.
    pub fn consensus(&self) -> Option<&ConsensusHeader> {
        match self {
            LightClientState::Unverified(_) => None,
            LightClientState::ProposerVerified(s) => Some(&s.consensus),
        }
    }

    /// Block proposer, as recorded by the consensus header.
    pub fn proposer(&self) -> Option<Address> {
        self.consensus().map(ConsensusHeader::proposer)
    }

    /// Check the bundle's Merkle-Patricia paths against this state's root.
    ///
    /// Unverified states always fail: their bundles are placeholders and
    /// their roots were never checked against any quorum.
    pub fn verify_storage(&self) -> Result<VerifiedAccountState, ProofError> {
        match self {
            LightClientState::Unverified(s) => Err(ProofError::UnverifiedState {
                height: s.header.number,
            }),
            LightClientState::ProposerVerified(s) => {
                if s.proof.height != s.consensus.number() {
                    return Err(ProofError::HeightMismatch {
                        bundle_height: s.proof.height,
                        header_height: s.consensus.number(),
                    });
                }
                verify_proof_bundle(s.consensus.header().state_root, &s.proof)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::seal::validate_commit_seals;
    use crate::consensus::seal::validate_raw_header;
    use crate::testing::{
        contract_with_slot, ibft2_vector_validator_set, IbftHeaderBuilder,
        IBFT2_VECTOR_BLOCK_HASH, IBFT2_VECTOR_HEADER_RLP,
    };
    use alloy_primitives::U256;

    #[test]
    fn test_client_type_tags() {
        assert_eq!("mock-client".parse::<ClientType>().unwrap(), ClientType::Mock);
        assert_eq!(
            "hyperledger-besu-ibft2".parse::<ClientType>().unwrap(),
            ClientType::BesuIbft2
        );
        assert!("tendermint".parse::<ClientType>().is_err());
        assert_eq!(ClientType::BesuIbft2.to_string(), "hyperledger-besu-ibft2");
        assert_eq!(
            serde_json::to_string(&ClientType::Mock).unwrap(),
            "\"mock-client\""
        );
        assert!(serde_json::from_str::<ClientType>("\"solo-machine\"").is_err());
    }

    #[test]
    fn test_unverified_state_refuses_storage_verification() {
        let header = IbftHeaderBuilder::new(7, 1).unsealed_with_validators(vec![]);
        let state = LightClientState::unverified(
            header,
            ProofBundle::placeholder(Address::ZERO, 7, &[B256::ZERO]),
        );
        assert_eq!(state.height(), 7);
        assert!(!state.is_verified());
        assert_eq!(state.client_type(), ClientType::Mock);
        assert_eq!(state.proposer(), None);
        assert!(matches!(
            state.verify_storage(),
            Err(ProofError::UnverifiedState { height: 7 })
        ));
    }

    #[test]
    fn test_verified_state_proves_storage() {
        let slot = B256::repeat_byte(0x42);
        let fixture = contract_with_slot(Address::repeat_byte(0xC0), slot, U256::from(5), 30);

        let builder = IbftHeaderBuilder::new(30, 4).with_state_root(fixture.state_root);
        let consensus =
            validate_commit_seals(&builder.sealed_by(&[0, 1, 2]), &builder.validator_set())
                .unwrap();
        let state = LightClientState::proposer_verified(consensus, fixture.bundle);

        assert!(state.is_verified());
        assert_eq!(state.client_type(), ClientType::BesuIbft2);
        assert_eq!(state.state_root(), fixture.state_root);
        assert_eq!(state.proposer(), Some(builder.address(0)));
        let verified = state.verify_storage().unwrap();
        assert_eq!(verified.get_storage(&slot), Some(U256::from(5)));
    }

    #[test]
    fn test_bundle_from_other_height_rejected() {
        let slot = B256::repeat_byte(0x42);
        let fixture = contract_with_slot(Address::repeat_byte(0xC0), slot, U256::from(5), 29);

        let builder = IbftHeaderBuilder::new(30, 4).with_state_root(fixture.state_root);
        let consensus =
            validate_commit_seals(&builder.sealed_by(&[0, 1, 2]), &builder.validator_set())
                .unwrap();
        let state = LightClientState::proposer_verified(consensus, fixture.bundle);

        assert!(matches!(
            state.verify_storage(),
            Err(ProofError::HeightMismatch {
                bundle_height: 29,
                header_height: 30
            })
        ));
    }

    #[test]
    fn test_block_hash_is_the_reported_hash_for_both_variants() {
        let consensus =
            validate_raw_header(IBFT2_VECTOR_HEADER_RLP, &ibft2_vector_validator_set()).unwrap();
        let placeholder = ProofBundle::placeholder(Address::ZERO, 6699, &[]);
        let unverified = LightClientState::unverified(consensus.header().clone(), placeholder);
        let verified = LightClientState::proposer_verified(consensus, unverified.proof().clone());

        assert_eq!(verified.block_hash(), IBFT2_VECTOR_BLOCK_HASH);
        assert_eq!(unverified.block_hash(), IBFT2_VECTOR_BLOCK_HASH);
    }
}
