use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors building a validator set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidatorSetError {
    #[error("Validator set is empty")]
    Empty,

    #[error("Validator {address} appears more than once")]
    Duplicate { address: Address },

    #[error("Validator {address} has zero voting power")]
    ZeroPower { address: Address },
}

/// A single consensus participant and its voting weight.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub address: Address,
    #[serde(default = "default_power")]
    pub power: u64,
}

fn default_power() -> u64 {
    1
}

/// Ordered set of validators used to decide quorum for commit seals.
///
/// The harness never mutates a validator set; a new one is configured per chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatorSet {
    validators: Vec<Validator>,
    total_power: u128,
}

impl ValidatorSet {
    pub fn new(validators: Vec<Validator>) -> Result<Self, ValidatorSetError> {
        if validators.is_empty() {
            return Err(ValidatorSetError::Empty);
        }

        let mut total_power: u128 = 0;
        for (i, validator) in validators.iter().enumerate() {
            if validator.power == 0 {
                return Err(ValidatorSetError::ZeroPower {
                    address: validator.address,
                });
            }
            if validators[..i].iter().any(|v| v.address == validator.address) {
                return Err(ValidatorSetError::Duplicate {
                    address: validator.address,
                });
            }
            total_power += u128::from(validator.power);
        }

        Ok(Self {
            validators,
            total_power,
        })
    }

    /// Build a set where every address carries one unit of power, which is
    /// how IBFT 2.0 weighs its validators.
    pub fn with_equal_power(addresses: &[Address]) -> Result<Self, ValidatorSetError> {
        Self::new(
            addresses
                .iter()
                .map(|&address| Validator { address, power: 1 })
                .collect(),
        )
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn total_power(&self) -> u128 {
        self.total_power
    }

    /// Voting power of `address`, or `None` if it is not a member.
    pub fn power_of(&self, address: &Address) -> Option<u64> {
        self.validators
            .iter()
            .find(|v| &v.address == address)
            .map(|v| v.power)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.power_of(address).is_some()
    }

    /// Strictly more than two thirds of the total voting power.
    pub fn has_quorum(&self, signed_power: u128) -> bool {
        signed_power * 3 > self.total_power * 2
    }

    /// Smallest voting power that satisfies [`Self::has_quorum`].
    pub fn quorum_power(&self) -> u128 {
        self.total_power * 2 / 3 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[test]
    fn test_equal_power_quorum_of_four() {
        let set = ValidatorSet::with_equal_power(&[addr(1), addr(2), addr(3), addr(4)]).unwrap();
        assert_eq!(set.total_power(), 4);
        assert_eq!(set.quorum_power(), 3);
        assert!(set.has_quorum(3));
        assert!(!set.has_quorum(2));
    }

    #[test]
    fn test_exact_two_thirds_is_not_quorum() {
        let set = ValidatorSet::with_equal_power(&[addr(1), addr(2), addr(3)]).unwrap();
        // 2/3 exactly does not pass; the threshold is strict
        assert!(!set.has_quorum(2));
        assert!(set.has_quorum(3));
        assert_eq!(set.quorum_power(), 3);
    }

    #[test]
    fn test_weighted_quorum() {
        let set = ValidatorSet::new(vec![
            Validator { address: addr(1), power: 70 },
            Validator { address: addr(2), power: 20 },
            Validator { address: addr(3), power: 10 },
        ])
        .unwrap();
        assert!(set.has_quorum(70));
        assert!(!set.has_quorum(66));
        assert_eq!(set.power_of(&addr(2)), Some(20));
        assert_eq!(set.power_of(&addr(9)), None);
    }

    #[test]
    fn test_rejects_bad_sets() {
        assert_eq!(ValidatorSet::new(vec![]), Err(ValidatorSetError::Empty));
        assert_eq!(
            ValidatorSet::with_equal_power(&[addr(1), addr(1)]),
            Err(ValidatorSetError::Duplicate { address: addr(1) })
        );
        assert_eq!(
            ValidatorSet::new(vec![Validator { address: addr(1), power: 0 }]),
            Err(ValidatorSetError::ZeroPower { address: addr(1) })
        );
    }

    #[test]
    fn test_validator_power_defaults_to_one() {
        let v: Validator =
            serde_json::from_str(r#"{"address":"0x0101010101010101010101010101010101010101"}"#)
                .unwrap();
        assert_eq!(v.address, addr(1));
        assert_eq!(v.power, 1);
    }
}
