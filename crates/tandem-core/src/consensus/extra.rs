//! Besu IBFT 2.0 extra-data codec.
//!
//! IBFT 2.0 stores its consensus evidence in the header's extra-data field:
//!
//! ```text
//! RLP([vanity(32), [validator...], vote | 0x80, round(4, big-endian), [seal(65)...]])
//! ```
//!
//! Validators sign the header with the seals element removed. The block hash a
//! node reports drops the round as well, so the codec produces all three forms.

use alloy_primitives::{Address, Bytes, B256};
use alloy_rlp::{BufMut, Decodable, Encodable, EMPTY_STRING_CODE};

/// Vote byte proposing to add a validator.
const VOTE_ADD: u8 = 0xFF;
/// Vote byte proposing to drop a validator.
const VOTE_DROP: u8 = 0x00;

/// Length of a secp256k1 commit seal: r (32) || s (32) || recovery id (1).
pub const SEAL_LENGTH: usize = 65;

/// A proposer's vote to change the validator set, carried in the extra-data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vote {
    pub recipient: Address,
    /// `true` votes to add `recipient`, `false` to drop it.
    pub authorize: bool,
}

/// Parsed IBFT 2.0 extra-data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IbftExtra {
    pub vanity: B256,
    pub validators: Vec<Address>,
    pub vote: Option<Vote>,
    pub round: u32,
    pub seals: Vec<Bytes>,
}

impl IbftExtra {
    /// Parse the extra-data bytes of a header. The whole input must be consumed.
    pub fn decode_exact(mut raw: &[u8]) -> alloy_rlp::Result<Self> {
        let extra = Self::decode(&mut raw)?;
        if !raw.is_empty() {
            return Err(alloy_rlp::Error::Custom("trailing bytes after IBFT extra-data"));
        }
        Ok(extra)
    }

    /// Full encoding, seals included. This is what lands in `header.extra_data`.
    pub fn encode_to_bytes(&self) -> Bytes {
        alloy_rlp::encode(self).into()
    }

    /// Encoding with the seals element omitted: the pre-image validators sign.
    pub fn encode_without_seals(&self) -> Bytes {
        let payload_length = self.base_payload_length();
        let mut out = Vec::with_capacity(payload_length + 4);
        alloy_rlp::Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        self.encode_base(&mut out);
        out.into()
    }

    /// Encoding with both round and seals omitted: `[vanity, validators, vote]`.
    /// The block hash Besu reports is taken over the header carrying this form.
    pub fn encode_onchain(&self) -> Bytes {
        let payload_length = self.onchain_payload_length();
        let mut out = Vec::with_capacity(payload_length + 4);
        alloy_rlp::Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        self.encode_onchain_fields(&mut out);
        out.into()
    }

    fn vote_length(&self) -> usize {
        match &self.vote {
            Some(vote) => {
                let payload = vote.recipient.length() + vote_byte(vote).length();
                payload + alloy_rlp::length_of_length(payload)
            }
            None => 1,
        }
    }

    fn onchain_payload_length(&self) -> usize {
        self.vanity.length() + self.validators.length() + self.vote_length()
    }

    fn base_payload_length(&self) -> usize {
        self.onchain_payload_length() + self.round.to_be_bytes().as_slice().length()
    }

    fn encode_base(&self, out: &mut dyn BufMut) {
        self.encode_onchain_fields(out);
        // Round is a fixed 4-byte big-endian integer, not a minimal scalar
        self.round.to_be_bytes().as_slice().encode(out);
    }

    fn encode_onchain_fields(&self, out: &mut dyn BufMut) {
        self.vanity.encode(out);
        self.validators.encode(out);
        match &self.vote {
            Some(vote) => {
                let byte = vote_byte(vote);
                alloy_rlp::Header {
                    list: true,
                    payload_length: vote.recipient.length() + byte.length(),
                }
                .encode(out);
                vote.recipient.encode(out);
                byte.encode(out);
            }
            None => out.put_u8(EMPTY_STRING_CODE),
        }
    }
}

fn vote_byte(vote: &Vote) -> u8 {
    if vote.authorize {
        VOTE_ADD
    } else {
        VOTE_DROP
    }
}

impl Encodable for IbftExtra {
    fn encode(&self, out: &mut dyn BufMut) {
        let payload_length = self.base_payload_length() + self.seals.length();
        alloy_rlp::Header {
            list: true,
            payload_length,
        }
        .encode(out);
        self.encode_base(out);
        self.seals.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.base_payload_length() + self.seals.length();
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

impl Decodable for IbftExtra {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let rlp_head = alloy_rlp::Header::decode(buf)?;
        if !rlp_head.list {
            return Err(alloy_rlp::Error::UnexpectedString);
        }
        if buf.len() < rlp_head.payload_length {
            return Err(alloy_rlp::Error::InputTooShort);
        }
        let data: &[u8] = *buf;
        let (mut payload, rest) = data.split_at(rlp_head.payload_length);

        let vanity = B256::decode(&mut payload)?;
        let validators = Vec::<Address>::decode(&mut payload)?;
        let vote = decode_vote(&mut payload)?;

        let round_bytes = Bytes::decode(&mut payload)?;
        if round_bytes.len() > 4 {
            return Err(alloy_rlp::Error::Overflow);
        }
        let round = round_bytes
            .iter()
            .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));

        // Some encoders leave the seals element out entirely on unsealed headers
        let seals = if payload.is_empty() {
            Vec::new()
        } else {
            Vec::<Bytes>::decode(&mut payload)?
        };

        if !payload.is_empty() {
            return Err(alloy_rlp::Error::ListLengthMismatch {
                expected: rlp_head.payload_length,
                got: rlp_head.payload_length - payload.len(),
            });
        }

        *buf = rest;
        Ok(Self {
            vanity,
            validators,
            vote,
            round,
            seals,
        })
    }
}

/// A vote is either the RLP empty string / empty list (no vote) or
/// `[recipient, 0xFF | 0x00]`.
fn decode_vote(buf: &mut &[u8]) -> alloy_rlp::Result<Option<Vote>> {
    let rlp_head = alloy_rlp::Header::decode(buf)?;
    if rlp_head.payload_length == 0 {
        return Ok(None);
    }
    if !rlp_head.list {
        return Err(alloy_rlp::Error::Custom("IBFT vote must be a list"));
    }
    if buf.len() < rlp_head.payload_length {
        return Err(alloy_rlp::Error::InputTooShort);
    }
    let data: &[u8] = *buf;
    let (mut payload, rest) = data.split_at(rlp_head.payload_length);
    let recipient = Address::decode(&mut payload)?;
    let authorize = match u8::decode(&mut payload)? {
        VOTE_ADD => true,
        VOTE_DROP => false,
        _ => return Err(alloy_rlp::Error::Custom("unknown IBFT vote type")),
    };
    if !payload.is_empty() {
        return Err(alloy_rlp::Error::Custom("unexpected fields in IBFT vote"));
    }
    *buf = rest;
    Ok(Some(Vote {
        recipient,
        authorize,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn sample_extra() -> IbftExtra {
        IbftExtra {
            vanity: B256::ZERO,
            validators: vec![Address::repeat_byte(1), Address::repeat_byte(2)],
            vote: None,
            round: 0,
            seals: vec![Bytes::from(vec![0xAB; SEAL_LENGTH])],
        }
    }

    #[test]
    fn test_decode_own_encoding() {
        let extra = sample_extra();
        let decoded = IbftExtra::decode_exact(&extra.encode_to_bytes()).unwrap();
        assert_eq!(decoded, extra);
    }

    #[test]
    fn test_vote_and_round_survive() {
        let mut extra = sample_extra();
        extra.vote = Some(Vote {
            recipient: Address::repeat_byte(9),
            authorize: false,
        });
        extra.round = 0x0102_0304;
        let decoded = IbftExtra::decode_exact(&extra.encode_to_bytes()).unwrap();
        assert_eq!(decoded.vote, extra.vote);
        assert_eq!(decoded.round, 0x0102_0304);
    }

    #[test]
    fn test_round_is_four_bytes() {
        let extra = IbftExtra {
            vanity: B256::ZERO,
            validators: vec![],
            vote: None,
            round: 1,
            seals: vec![],
        };
        // [vanity(0xa0 + 32 zero bytes), validators(0xc0), vote(0x80), round(0x84 00000001)]
        let encoded = extra.encode_without_seals();
        let mut expected = vec![0xe8, 0xa0];
        expected.extend_from_slice(&[0u8; 32]);
        expected.extend_from_slice(&hex!("c080 8400000001"));
        assert_eq!(encoded.to_vec(), expected);
    }

    #[test]
    fn test_seal_free_encoding_ignores_seals() {
        let mut a = sample_extra();
        let mut b = sample_extra();
        a.seals.clear();
        b.seals.push(Bytes::from(vec![0xCD; SEAL_LENGTH]));
        assert_eq!(a.encode_without_seals(), b.encode_without_seals());
        assert_ne!(a.encode_to_bytes(), b.encode_to_bytes());
    }

    #[test]
    fn test_onchain_encoding_drops_round_and_seals() {
        let mut extra = sample_extra();
        extra.round = 7;
        // [vanity, [0x01.., 0x02..], no vote]
        let mut expected = vec![0xf8, 0x4d, 0xa0];
        expected.extend_from_slice(&[0u8; 32]);
        expected.extend_from_slice(&hex!("ea 94"));
        expected.extend_from_slice(&[0x01; 20]);
        expected.push(0x94);
        expected.extend_from_slice(&[0x02; 20]);
        expected.push(0x80);
        assert_eq!(extra.encode_onchain().to_vec(), expected);

        let mut next_round = extra.clone();
        next_round.round = 8;
        next_round.seals.clear();
        assert_eq!(next_round.encode_onchain(), extra.encode_onchain());
        assert_ne!(next_round.encode_without_seals(), extra.encode_without_seals());
    }

    #[test]
    fn test_missing_seals_element_decodes_as_unsealed() {
        let extra = sample_extra();
        let decoded = IbftExtra::decode_exact(&extra.encode_without_seals()).unwrap();
        assert!(decoded.seals.is_empty());
        assert_eq!(decoded.validators, extra.validators);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(IbftExtra::decode_exact(&[]).is_err());
        assert!(IbftExtra::decode_exact(&hex!("deadbeef")).is_err());
        // A 32-byte vanity string without the surrounding list
        assert!(IbftExtra::decode_exact(&alloy_rlp::encode(B256::ZERO)).is_err());
    }
}
