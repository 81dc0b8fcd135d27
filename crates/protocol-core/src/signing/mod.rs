//! Order hashing, EIP-712 typed data and signatures.
//!
//! ```text
//! Order ── order_hash ──► orderHash ── personal prefix ──► signed by owner
//!                                                              │
//! TypedData ── eip712 ──► digest ── signer ──► TaggedSignature ┘
//!                                                   │
//!                                        signature::verify / wire codec
//! ```
//!
//! # Example
//!
//! ```ignore
//! use protocol_core::signing::{OrderSigner, TypedDataDomain};
//!
//! let domain = TypedDataDomain::new("Ring Protocol", "2", 1, verifying_contract);
//! let signer = OrderSigner::from_private_key("0x...", domain)?;
//! let signed = signer.sign_order(&order).await?;
//! assert!(protocol_core::signing::verify_signature(&signed));
//! ```

pub mod domain;
pub mod eip712;
pub mod order_hash;
pub mod signature;
pub mod signer;

pub use domain::{TypedDataDomain, EIP712_DOMAIN_TYPE, MAINNET_CHAIN_ID};
pub use eip712::{FieldType, TypedData, TypedDataSchema, TypedField};
pub use order_hash::{compute_order_hash, to_personal_message_hash, verify_signature};
pub use signature::{EcdsaSignature, SignAlgorithm, TaggedSignature};
pub use signer::OrderSigner;
