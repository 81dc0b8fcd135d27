//! Legacy order hash and `personal_sign` verification.
//!
//! The order hash is keccak256 over the Solidity tightly packed encoding of
//!
//! ```text
//! (address delegate, address owner, address tokenS, address tokenB,
//!  address wallet, address authAddr, uint256 amountS, uint256 amountB,
//!  uint256 validSince, uint256 validUntil, uint256 fee,
//!  bool buyNoMoreThanAmountB, uint8 marginSplitPercentage)
//! ```
//!
//! The owner signs the `personal_sign` form of that hash.

use alloy_primitives::{eip191_hash_message, keccak256, B256};
use alloy_sol_types::SolValue;
use tracing::{debug, warn};

use crate::types::Order;

/// Length of the packed field encoding: 6 addresses, 5 words, bool, uint8.
pub const PACKED_ORDER_FIELDS_LEN: usize = 6 * 20 + 5 * 32 + 1 + 1;

/// Tightly packed encoding of the hashed order fields.
pub fn encode_order_fields(order: &Order) -> Vec<u8> {
    let mut packed = (
        order.delegate,
        order.owner,
        order.token_s,
        order.token_b,
        order.wallet,
        order.auth_addr,
        order.amount_s,
        order.amount_b,
        order.valid_since,
        order.valid_until,
        order.fee_amount,
        order.buy_no_more_than_amount_b,
    )
        .abi_encode_packed();
    // uint8 packs to a single byte.
    packed.push(order.margin_split_percentage);
    packed
}

/// Compute the canonical order hash.
pub fn compute_order_hash(order: &Order) -> B256 {
    let hash = keccak256(encode_order_fields(order));
    debug!(%hash, owner = %order.owner, "computed order hash");
    hash
}

/// Wrap a 32-byte hash in the `"\x19Ethereum Signed Message:\n32"` prefix.
pub fn to_personal_message_hash(order_hash: B256) -> B256 {
    eip191_hash_message(order_hash)
}

/// Check the order's `(v, r, s)` was produced by `order.owner`.
///
/// Returns `false` for unsigned orders, malformed signatures and signer
/// mismatches.
pub fn verify_signature(order: &Order) -> bool {
    let Some(signature) = order.signature else {
        debug!(owner = %order.owner, "order has no signature");
        return false;
    };

    let message_hash = to_personal_message_hash(compute_order_hash(order));
    match signature.recover_signer(message_hash) {
        Ok(recovered) if recovered == order.owner => true,
        Ok(recovered) => {
            warn!(%recovered, owner = %order.owner, "order signed by a different key");
            false
        }
        Err(e) => {
            warn!(error = %e, owner = %order.owner, "order signature recovery failed");
            false
        }
    }
}
