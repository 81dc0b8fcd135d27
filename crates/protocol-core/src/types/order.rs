//! Order model for ring submission.

use alloy_primitives::{Address, B256, U256};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::signing::order_hash;
use crate::signing::signature::EcdsaSignature;
use crate::{Error, Result};

/// Upper bound for [`Order::margin_split_percentage`].
pub const MAX_MARGIN_SPLIT_PERCENTAGE: u8 = 100;

/// A trade order: sell `amount_s` of `token_s` for `amount_b` of `token_b`.
///
/// Field order matches the order hash layout. Changing any field after
/// signing invalidates the signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Delegate contract the order is bound to.
    pub delegate: Address,
    /// Order owner and expected signer.
    pub owner: Address,
    /// Token sold.
    pub token_s: Address,
    /// Token bought.
    pub token_b: Address,
    /// Wallet that receives the wallet share of the margin.
    pub wallet: Address,
    /// Address allowed to authorise ring submission for this order.
    pub auth_addr: Address,
    /// Amount of `token_s` offered.
    pub amount_s: U256,
    /// Amount of `token_b` wanted.
    pub amount_b: U256,
    /// Unix timestamp the order becomes valid.
    pub valid_since: U256,
    /// Unix timestamp the order expires.
    pub valid_until: U256,
    /// Fee paid to the miner.
    pub fee_amount: U256,
    /// When set, fills are capped by `amount_b` rather than `amount_s`.
    pub buy_no_more_than_amount_b: bool,
    /// Share of the margin (0..=100) paid instead of the fee.
    pub margin_split_percentage: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<EcdsaSignature>,
}

impl Order {
    /// Start building an order owned by `owner`.
    pub fn builder(delegate: Address, owner: Address) -> OrderBuilder {
        OrderBuilder::new(delegate, owner)
    }

    /// Canonical hash of the economic fields.
    pub fn hash(&self) -> B256 {
        order_hash::compute_order_hash(self)
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Check field ranges that the hash itself does not constrain.
    pub fn validate(&self) -> Result<()> {
        if self.margin_split_percentage > MAX_MARGIN_SPLIT_PERCENTAGE {
            return Err(Error::invalid_value(
                "marginSplitPercentage",
                format!(
                    "{} exceeds {}",
                    self.margin_split_percentage, MAX_MARGIN_SPLIT_PERCENTAGE
                ),
            ));
        }
        if self.valid_until != U256::ZERO && self.valid_until <= self.valid_since {
            return Err(Error::invalid_value(
                "validUntil",
                "must be after validSince",
            ));
        }
        Ok(())
    }
}

/// Fluent builder for [`Order`].
#[derive(Debug, Clone)]
pub struct OrderBuilder {
    delegate: Address,
    owner: Address,
    token_s: Option<Address>,
    token_b: Option<Address>,
    wallet: Address,
    auth_addr: Address,
    amount_s: Option<U256>,
    amount_b: Option<U256>,
    valid_since: U256,
    valid_until: U256,
    empty_window: bool,
    fee_amount: U256,
    buy_no_more_than_amount_b: bool,
    margin_split_percentage: u8,
}

impl OrderBuilder {
    pub fn new(delegate: Address, owner: Address) -> Self {
        Self {
            delegate,
            owner,
            token_s: None,
            token_b: None,
            wallet: Address::ZERO,
            auth_addr: Address::ZERO,
            amount_s: None,
            amount_b: None,
            valid_since: U256::ZERO,
            valid_until: U256::ZERO,
            empty_window: false,
            fee_amount: U256::ZERO,
            buy_no_more_than_amount_b: false,
            margin_split_percentage: 0,
        }
    }

    /// Set the sell side.
    pub fn sell(mut self, token: Address, amount: U256) -> Self {
        self.token_s = Some(token);
        self.amount_s = Some(amount);
        self
    }

    /// Set the buy side.
    pub fn buy(mut self, token: Address, amount: U256) -> Self {
        self.token_b = Some(token);
        self.amount_b = Some(amount);
        self
    }

    pub fn wallet(mut self, wallet: Address) -> Self {
        self.wallet = wallet;
        self
    }

    pub fn auth_addr(mut self, auth_addr: Address) -> Self {
        self.auth_addr = auth_addr;
        self
    }

    pub fn fee(mut self, fee_amount: U256) -> Self {
        self.fee_amount = fee_amount;
        self
    }

    pub fn buy_no_more_than_amount_b(mut self, enabled: bool) -> Self {
        self.buy_no_more_than_amount_b = enabled;
        self
    }

    pub fn margin_split_percentage(mut self, percentage: u8) -> Self {
        self.margin_split_percentage = percentage;
        self
    }

    /// Set an absolute validity window (unix seconds).
    pub fn valid_between(mut self, since: u64, until: u64) -> Self {
        self.valid_since = U256::from(since);
        self.valid_until = U256::from(until);
        self.empty_window = false;
        self
    }

    /// Valid from now for `seconds`. A zero-length window makes [`Self::build`] fail;
    /// use [`Self::valid_between`] with `until = 0` for an order that never expires.
    pub fn valid_for(self, seconds: u64) -> Self {
        let now = Utc::now().timestamp().max(0) as u64;
        let mut builder = self.valid_between(now, now.saturating_add(seconds));
        builder.empty_window = seconds == 0;
        builder
    }

    /// Build the order, failing if either side is missing or a field is out of range.
    pub fn build(self) -> Result<Order> {
        let missing = |field: &str| Error::MissingField {
            type_name: "Order".to_string(),
            field: field.to_string(),
        };
        if self.empty_window {
            return Err(Error::invalid_value(
                "validUntil",
                "validity window must be at least one second",
            ));
        }

        let order = Order {
            delegate: self.delegate,
            owner: self.owner,
            token_s: self.token_s.ok_or_else(|| missing("tokenS"))?,
            token_b: self.token_b.ok_or_else(|| missing("tokenB"))?,
            wallet: self.wallet,
            auth_addr: self.auth_addr,
            amount_s: self.amount_s.ok_or_else(|| missing("amountS"))?,
            amount_b: self.amount_b.ok_or_else(|| missing("amountB"))?,
            valid_since: self.valid_since,
            valid_until: self.valid_until,
            fee_amount: self.fee_amount,
            buy_no_more_than_amount_b: self.buy_no_more_than_amount_b,
            margin_split_percentage: self.margin_split_percentage,
            signature: None,
        };
        order.validate()?;
        Ok(order)
    }
}
