//! EIP-712 signing domain.
//!
//! Signer and verifier must agree on every domain member, otherwise the
//! digests diverge and recovered signers will not match.

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

use super::eip712::{FieldType, TypedField};

/// Name of the domain struct in a typed data schema.
pub const EIP712_DOMAIN_TYPE: &str = "EIP712Domain";

/// Type string of the four-member domain.
pub const EIP712_DOMAIN_TYPE_STRING: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Chain ID for Ethereum mainnet.
pub const MAINNET_CHAIN_ID: u64 = 1;

/// EIP-712 domain separator for order signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataDomain {
    /// Domain name.
    pub name: String,
    /// Domain version.
    pub version: String,
    /// Chain ID.
    pub chain_id: U256,
    /// Verifying contract address.
    pub verifying_contract: Address,
}

impl TypedDataDomain {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        chain_id: u64,
        verifying_contract: Address,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            chain_id: U256::from(chain_id),
            verifying_contract,
        }
    }

    /// Members of the standard four-field domain, in hashing order.
    pub fn default_schema() -> Vec<TypedField> {
        [
            ("name", FieldType::String),
            ("version", FieldType::String),
            ("chainId", FieldType::Uint(256)),
            ("verifyingContract", FieldType::Address),
        ]
        .into_iter()
        .map(|(name, kind)| TypedField {
            name: name.to_string(),
            type_name: kind.to_string(),
            kind,
        })
        .collect()
    }

    /// Compute the EIP-712 domain separator over all four members.
    pub fn separator(&self) -> B256 {
        let domain_type_hash = keccak256(EIP712_DOMAIN_TYPE_STRING.as_bytes());
        let name_hash = keccak256(self.name.as_bytes());
        let version_hash = keccak256(self.version.as_bytes());

        // Every member occupies a full word; addresses are left-padded.
        let contract_padded = B256::left_padding_from(self.verifying_contract.as_slice());

        let encoded = (
            domain_type_hash,
            name_hash,
            version_hash,
            self.chain_id,
            contract_padded,
        )
            .abi_encode_packed();

        keccak256(&encoded)
    }
}
