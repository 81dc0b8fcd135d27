//! Order signing with a local private key.
//!
//! Signing is the only asynchronous step in the order flow. Callers that
//! need a deadline should wrap these futures in their own timeout.

use alloy_primitives::{Address, B256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

use super::domain::TypedDataDomain;
use super::eip712::{self, TypedDataSchema};
use super::order_hash::{compute_order_hash, to_personal_message_hash};
use super::signature::{EcdsaSignature, SignAlgorithm, TaggedSignature};
use crate::types::Order;

/// Order signer bound to one key and one EIP-712 domain.
#[derive(Clone)]
pub struct OrderSigner {
    signer: PrivateKeySigner,
    domain: TypedDataDomain,
}

impl OrderSigner {
    pub fn new(signer: PrivateKeySigner, domain: TypedDataDomain) -> Self {
        Self { signer, domain }
    }

    /// Create a signer from a hex-encoded private key, optionally `0x`-prefixed.
    pub fn from_private_key(key: &str, domain: TypedDataDomain) -> Result<Self> {
        let key_clean = key.trim().trim_start_matches("0x");
        let signer = PrivateKeySigner::from_str(key_clean)
            .context("Invalid private key format - expected 64 hex characters")?;
        Ok(Self::new(signer, domain))
    }

    /// Get the signer's address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn domain(&self) -> &TypedDataDomain {
        &self.domain
    }

    /// Sign an order owned by this key, returning a signed copy.
    pub async fn sign_order(&self, order: &Order) -> Result<Order> {
        if order.owner != self.address() {
            bail!(
                "order owner {} does not match signer {}",
                order.owner,
                self.address()
            );
        }
        order.validate()?;

        let order_hash = compute_order_hash(order);
        let signature = self
            .signer
            .sign_hash(&to_personal_message_hash(order_hash))
            .await
            .context("Failed to sign order")?;

        debug!(%order_hash, owner = %order.owner, "signed order");
        let mut signed = order.clone();
        signed.signature = Some(EcdsaSignature::from_alloy(&signature));
        Ok(signed)
    }

    /// Sign a typed message under this signer's domain.
    pub async fn sign_typed_data(
        &self,
        primary_type: &str,
        message: &Value,
        schema: &TypedDataSchema,
    ) -> Result<TaggedSignature> {
        let digest = eip712::digest(&self.domain, primary_type, message, schema)?;
        self.sign_digest(digest, SignAlgorithm::Eip712).await
    }

    /// Sign `digest` under `algorithm`, applying the personal prefix for
    /// [`SignAlgorithm::Ethereum`].
    pub async fn sign_digest(
        &self,
        digest: B256,
        algorithm: SignAlgorithm,
    ) -> Result<TaggedSignature> {
        let signature = self
            .signer
            .sign_hash(&algorithm.signed_hash(digest))
            .await
            .context("Failed to sign digest")?;

        Ok(TaggedSignature::new(
            algorithm,
            EcdsaSignature::from_alloy(&signature),
        ))
    }
}

impl std::fmt::Debug for OrderSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderSigner")
            .field("address", &format!("{:?}", self.address()))
            .field("domain", &self.domain.name)
            .finish()
    }
}
