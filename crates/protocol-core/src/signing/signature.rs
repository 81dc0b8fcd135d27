//! Signature wire codec and signer recovery.
//!
//! On the wire a signature is `[algorithm:1][length:1][v:1][r:32][s:32]`,
//! where `length` counts the bytes after it.

use alloy_primitives::{eip191_hash_message, Address, Signature, B256, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::encoding::Bitstream;
use crate::{Error, Result};

/// How the signed digest was derived before signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignAlgorithm {
    /// Digest wrapped in the `personal_sign` message prefix.
    Ethereum = 0,
    /// Raw EIP-712 digest.
    Eip712 = 1,
}

impl SignAlgorithm {
    pub fn as_u8(&self) -> u8 {
        match self {
            SignAlgorithm::Ethereum => 0,
            SignAlgorithm::Eip712 => 1,
        }
    }

    /// The hash that actually gets signed for `digest` under this algorithm.
    pub fn signed_hash(&self, digest: B256) -> B256 {
        match self {
            SignAlgorithm::Ethereum => eip191_hash_message(digest),
            SignAlgorithm::Eip712 => digest,
        }
    }
}

impl TryFrom<u8> for SignAlgorithm {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(SignAlgorithm::Ethereum),
            1 => Ok(SignAlgorithm::Eip712),
            other => Err(Error::UnknownAlgorithm(other)),
        }
    }
}

/// Recoverable secp256k1 signature in `(v, r, s)` form, `v` in {27, 28}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EcdsaSignature {
    pub v: u8,
    pub r: B256,
    pub s: B256,
}

impl EcdsaSignature {
    /// Number of bytes in `v || r || s`.
    pub const LEN: usize = 65;

    pub fn new(v: u8, r: B256, s: B256) -> Self {
        Self { v, r, s }
    }

    pub fn from_alloy(signature: &Signature) -> Self {
        Self {
            v: 27 + u8::from(signature.v()),
            r: B256::from(signature.r().to_be_bytes::<32>()),
            s: B256::from(signature.s().to_be_bytes::<32>()),
        }
    }

    /// Convert to an alloy signature, accepting `v` as 27/28 or 0/1.
    pub fn to_alloy(&self) -> Result<Signature> {
        let y_parity = match self.v {
            0 | 27 => false,
            1 | 28 => true,
            other => {
                return Err(Error::InvalidSignature {
                    message: format!("v must be 27 or 28, got {other}"),
                })
            }
        };
        Ok(Signature::new(
            U256::from_be_bytes(self.r.0),
            U256::from_be_bytes(self.s.0),
            y_parity,
        ))
    }

    /// Recover the address that produced this signature over `digest`.
    pub fn recover_signer(&self, digest: B256) -> Result<Address> {
        self.to_alloy()?
            .recover_address_from_prehash(&digest)
            .map_err(|e| Error::InvalidSignature {
                message: e.to_string(),
            })
    }

    /// `r || s || v`, the layout wallets return from `eth_sign`.
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut bytes = [0u8; Self::LEN];
        bytes[..32].copy_from_slice(self.r.as_slice());
        bytes[32..64].copy_from_slice(self.s.as_slice());
        bytes[64] = self.v;
        bytes
    }

    /// Parse the `r || s || v` layout.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(Error::InvalidSignature {
                message: format!("expected {} bytes, got {}", Self::LEN, bytes.len()),
            });
        }
        Ok(Self {
            r: B256::from_slice(&bytes[..32]),
            s: B256::from_slice(&bytes[32..64]),
            v: bytes[64],
        })
    }
}

/// A signature together with the algorithm tag it was produced under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedSignature {
    pub algorithm: SignAlgorithm,
    pub signature: EcdsaSignature,
}

impl TaggedSignature {
    /// Payload bytes following the length byte: `v`, `r`, `s`.
    pub const PAYLOAD_LEN: u8 = EcdsaSignature::LEN as u8;

    /// Total wire size including tag and length bytes.
    pub const ENCODED_LEN: usize = 2 + EcdsaSignature::LEN;

    pub fn new(algorithm: SignAlgorithm, signature: EcdsaSignature) -> Self {
        Self {
            algorithm,
            signature,
        }
    }

    /// Append the wire form to `stream`, returning its offset.
    pub fn encode(&self, stream: &mut Bitstream) -> Result<usize> {
        let offset = stream.add_number(u64::from(self.algorithm.as_u8()), 1)?;
        stream.add_number(u64::from(Self::PAYLOAD_LEN), 1)?;
        stream.add_number(u64::from(self.signature.v), 1)?;
        stream.add_bytes32(self.signature.r);
        stream.add_bytes32(self.signature.s);
        Ok(offset)
    }

    /// Read a signature written by [`TaggedSignature::encode`] at `offset`.
    pub fn decode(stream: &Bitstream, offset: usize) -> Result<Self> {
        let algorithm = SignAlgorithm::try_from(stream.extract_u8(offset)?)?;
        let len = stream.extract_u8(offset + 1)?;
        if len != Self::PAYLOAD_LEN {
            return Err(Error::InvalidSignature {
                message: format!("payload length {len}, expected {}", Self::PAYLOAD_LEN),
            });
        }
        let v = stream.extract_u8(offset + 2)?;
        let r = stream.extract_bytes32(offset + 3)?;
        let s = stream.extract_bytes32(offset + 35)?;
        Ok(Self::new(algorithm, EcdsaSignature::new(v, r, s)))
    }

    /// Check the signature over `digest` was made by `signer`.
    ///
    /// Malformed signatures and failed recovery count as invalid.
    pub fn verify(&self, digest: B256, signer: Address) -> bool {
        match self.signature.recover_signer(self.algorithm.signed_hash(digest)) {
            Ok(recovered) => recovered == signer,
            Err(e) => {
                debug!(error = %e, "signature recovery failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::keccak256;
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;
    use std::str::FromStr;

    // Test private key (DO NOT USE IN PRODUCTION)
    const TEST_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn sample_signature() -> EcdsaSignature {
        EcdsaSignature::new(27, B256::repeat_byte(0x11), B256::repeat_byte(0x22))
    }

    #[test]
    fn test_wire_layout() {
        let tagged = TaggedSignature::new(SignAlgorithm::Eip712, sample_signature());
        let mut stream = Bitstream::new();
        stream.add_number(0xaa, 1).unwrap();
        let offset = tagged.encode(&mut stream).unwrap();

        assert_eq!(offset, 1);
        assert_eq!(stream.len(), 1 + TaggedSignature::ENCODED_LEN);
        assert_eq!(&stream.as_bytes()[1..4], &[1, 65, 27]);
        assert_eq!(stream.extract_bytes32(4).unwrap(), B256::repeat_byte(0x11));
        assert_eq!(stream.extract_bytes32(36).unwrap(), B256::repeat_byte(0x22));

        assert_eq!(TaggedSignature::decode(&stream, offset).unwrap(), tagged);
    }

    #[test]
    fn test_decode_rejects_bad_tag_and_length() {
        let mut stream = Bitstream::new();
        TaggedSignature::new(SignAlgorithm::Ethereum, sample_signature())
            .encode(&mut stream)
            .unwrap();

        let mut bad_tag = stream.clone().into_bytes();
        bad_tag[0] = 9;
        assert!(matches!(
            TaggedSignature::decode(&Bitstream::from(bad_tag), 0),
            Err(Error::UnknownAlgorithm(9))
        ));

        let mut bad_len = stream.clone().into_bytes();
        bad_len[1] = 64;
        assert!(matches!(
            TaggedSignature::decode(&Bitstream::from(bad_len), 0),
            Err(Error::InvalidSignature { .. })
        ));

        let mut truncated = stream.into_bytes();
        truncated.pop();
        assert!(matches!(
            TaggedSignature::decode(&Bitstream::from(truncated), 0),
            Err(Error::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_recover_and_verify() {
        let signer = PrivateKeySigner::from_str(TEST_PRIVATE_KEY).unwrap();
        let digest = keccak256(b"ring");

        let raw = signer.sign_hash_sync(&digest).unwrap();
        let eip712 = TaggedSignature::new(SignAlgorithm::Eip712, EcdsaSignature::from_alloy(&raw));
        assert!(eip712.verify(digest, signer.address()));
        assert!(!eip712.verify(keccak256(b"other"), signer.address()));

        let personal = signer.sign_message_sync(digest.as_slice()).unwrap();
        let ethereum =
            TaggedSignature::new(SignAlgorithm::Ethereum, EcdsaSignature::from_alloy(&personal));
        assert!(ethereum.verify(digest, signer.address()));

        // Same bytes under the other tag hash differently.
        let swapped = TaggedSignature::new(SignAlgorithm::Eip712, ethereum.signature);
        assert!(!swapped.verify(digest, signer.address()));
    }

    #[test]
    fn test_invalid_v_is_not_a_crash() {
        let signature = EcdsaSignature::new(35, B256::repeat_byte(1), B256::repeat_byte(2));
        assert!(signature.recover_signer(B256::ZERO).is_err());

        let tagged = TaggedSignature::new(SignAlgorithm::Eip712, signature);
        assert!(!tagged.verify(B256::ZERO, Address::ZERO));
    }

    #[test]
    fn test_bytes_round_trip() {
        let signature = sample_signature();
        let bytes = signature.to_bytes();

        assert_eq!(bytes[64], 27);
        assert_eq!(EcdsaSignature::from_bytes(&bytes).unwrap(), signature);
        assert!(EcdsaSignature::from_bytes(&bytes[..64]).is_err());
    }

    #[test]
    fn test_algorithm_tags() {
        assert_eq!(SignAlgorithm::Ethereum.as_u8(), 0);
        assert_eq!(SignAlgorithm::Eip712.as_u8(), 1);
        assert_eq!(SignAlgorithm::try_from(1).unwrap(), SignAlgorithm::Eip712);
        assert!(SignAlgorithm::try_from(2).is_err());
    }
}
