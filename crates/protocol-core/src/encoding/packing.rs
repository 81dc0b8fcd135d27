//! Compact ring serialisation.
//!
//! A ring is a header followed by one fixed-size record per order:
//!
//! ```text
//! header: [version:1][numOrders:2][delegate:20]
//! order:  [owner:20][tokenS:20][tokenB:20][wallet:20][authAddr:20]
//!         [amountS:3][amountB:3][fee:2][validSince:4][validUntil:4]
//!         [flags:1][marginSplit:1][signature:67]
//! ```
//!
//! Amounts are stored as floats (24 bits for token amounts, 16 bits for the
//! fee), so unpacked amounts are the packed ones rounded down.

use alloy_primitives::{Address, U256};
use tracing::debug;

use super::bitstream::{Bitstream, ADDRESS_SIZE};
use super::float::{FloatEncoding, FLOAT_16, FLOAT_24};
use crate::signing::signature::{SignAlgorithm, TaggedSignature};
use crate::types::{Order, MAX_MARGIN_SPLIT_PERCENTAGE};
use crate::{Error, Result};

/// Layout version written in the header.
pub const RING_VERSION: u8 = 1;

/// Header bytes: version, order count, delegate.
pub const HEADER_LEN: usize = 1 + 2 + ADDRESS_SIZE;

/// Bytes per packed order.
pub const PACKED_ORDER_LEN: usize =
    5 * ADDRESS_SIZE + 3 + 3 + 2 + 4 + 4 + 1 + 1 + TaggedSignature::ENCODED_LEN;

/// Encoding used for `amountS` and `amountB`.
pub const AMOUNT_ENCODING: FloatEncoding = FLOAT_24;

/// Encoding used for the fee.
pub const FEE_ENCODING: FloatEncoding = FLOAT_16;

const TIMESTAMP_SIZE: usize = 4;
const FLAG_BUY_NO_MORE_THAN_AMOUNT_B: u8 = 0x01;

/// Orders recovered from a packed ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackedRing {
    pub delegate: Address,
    pub orders: Vec<Order>,
}

/// Serialise signed orders sharing `delegate` into a ring.
pub fn pack_ring(delegate: Address, orders: &[Order]) -> Result<Bitstream> {
    let num_orders = u16::try_from(orders.len()).map_err(|_| {
        Error::invalid_value("orders", format!("{} orders exceed u16", orders.len()))
    })?;

    let mut stream = Bitstream::with_capacity(HEADER_LEN + orders.len() * PACKED_ORDER_LEN);
    stream.add_number(u64::from(RING_VERSION), 1)?;
    stream.add_number(u64::from(num_orders), 2)?;
    stream.add_address(delegate, ADDRESS_SIZE)?;

    for (index, order) in orders.iter().enumerate() {
        if order.delegate != delegate {
            return Err(Error::invalid_value(
                "delegate",
                format!("order {index} is bound to {}, ring to {delegate}", order.delegate),
            ));
        }
        pack_order(&mut stream, order)?;
    }

    debug!(num_orders, len = stream.len(), "packed ring");
    Ok(stream)
}

fn pack_order(stream: &mut Bitstream, order: &Order) -> Result<()> {
    let signature = order.signature.ok_or(Error::MissingSignature)?;
    if order.margin_split_percentage > MAX_MARGIN_SPLIT_PERCENTAGE {
        return Err(Error::invalid_value(
            "marginSplitPercentage",
            format!(
                "{} exceeds {}",
                order.margin_split_percentage, MAX_MARGIN_SPLIT_PERCENTAGE
            ),
        ));
    }

    for address in [
        order.owner,
        order.token_s,
        order.token_b,
        order.wallet,
        order.auth_addr,
    ] {
        stream.add_address(address, ADDRESS_SIZE)?;
    }
    stream.add_float(order.amount_s, AMOUNT_ENCODING)?;
    stream.add_float(order.amount_b, AMOUNT_ENCODING)?;
    stream.add_float(order.fee_amount, FEE_ENCODING)?;
    stream.add_big_uint(order.valid_since, TIMESTAMP_SIZE)?;
    stream.add_big_uint(order.valid_until, TIMESTAMP_SIZE)?;

    let flags = if order.buy_no_more_than_amount_b {
        FLAG_BUY_NO_MORE_THAN_AMOUNT_B
    } else {
        0
    };
    stream.add_number(u64::from(flags), 1)?;
    stream.add_number(u64::from(order.margin_split_percentage), 1)?;

    TaggedSignature::new(SignAlgorithm::Ethereum, signature).encode(stream)?;
    Ok(())
}

/// Parse a ring written by [`pack_ring`].
pub fn unpack_ring(stream: &Bitstream) -> Result<UnpackedRing> {
    let version = stream.extract_u8(0)?;
    if version != RING_VERSION {
        return Err(Error::InvalidEncoding {
            message: format!("unsupported ring version {version}"),
        });
    }
    let num_orders = usize::from(stream.extract_u16(1)?);
    let delegate = stream.extract_address(3)?;

    let expected = HEADER_LEN + num_orders * PACKED_ORDER_LEN;
    if stream.len() != expected {
        return Err(Error::InvalidEncoding {
            message: format!(
                "ring of {num_orders} orders should be {expected} bytes, got {}",
                stream.len()
            ),
        });
    }

    let orders = (0..num_orders)
        .map(|i| unpack_order(stream, HEADER_LEN + i * PACKED_ORDER_LEN, delegate))
        .collect::<Result<Vec<_>>>()?;

    Ok(UnpackedRing { delegate, orders })
}

fn unpack_order(stream: &Bitstream, offset: usize, delegate: Address) -> Result<Order> {
    let mut cursor = offset;
    let mut next = |width: usize| {
        let at = cursor;
        cursor += width;
        at
    };

    let owner = stream.extract_address(next(ADDRESS_SIZE))?;
    let token_s = stream.extract_address(next(ADDRESS_SIZE))?;
    let token_b = stream.extract_address(next(ADDRESS_SIZE))?;
    let wallet = stream.extract_address(next(ADDRESS_SIZE))?;
    let auth_addr = stream.extract_address(next(ADDRESS_SIZE))?;
    let amount_s = stream.extract_float(next(AMOUNT_ENCODING.num_bytes()), AMOUNT_ENCODING)?;
    let amount_b = stream.extract_float(next(AMOUNT_ENCODING.num_bytes()), AMOUNT_ENCODING)?;
    let fee_amount = stream.extract_float(next(FEE_ENCODING.num_bytes()), FEE_ENCODING)?;
    let valid_since = stream.extract_uint(next(TIMESTAMP_SIZE), TIMESTAMP_SIZE)?;
    let valid_until = stream.extract_uint(next(TIMESTAMP_SIZE), TIMESTAMP_SIZE)?;

    let flags = stream.extract_u8(next(1))?;
    if flags & !FLAG_BUY_NO_MORE_THAN_AMOUNT_B != 0 {
        return Err(Error::InvalidEncoding {
            message: format!("unknown order flags {flags:#04x}"),
        });
    }
    let margin_split_percentage = stream.extract_u8(next(1))?;
    if margin_split_percentage > MAX_MARGIN_SPLIT_PERCENTAGE {
        return Err(Error::invalid_value(
            "marginSplitPercentage",
            format!("{margin_split_percentage} exceeds {MAX_MARGIN_SPLIT_PERCENTAGE}"),
        ));
    }

    let tagged = TaggedSignature::decode(stream, next(TaggedSignature::ENCODED_LEN))?;
    if tagged.algorithm != SignAlgorithm::Ethereum {
        return Err(Error::InvalidSignature {
            message: format!(
                "order signatures must be personal signatures, got {:?}",
                tagged.algorithm
            ),
        });
    }

    Ok(Order {
        delegate,
        owner,
        token_s,
        token_b,
        wallet,
        auth_addr,
        amount_s,
        amount_b,
        valid_since,
        valid_until,
        fee_amount,
        buy_no_more_than_amount_b: flags & FLAG_BUY_NO_MORE_THAN_AMOUNT_B != 0,
        margin_split_percentage,
        signature: Some(tagged.signature),
    })
}

/// Round an order's amounts down to what survives packing.
///
/// Sign the returned order if the signature must still verify after a
/// pack/unpack cycle.
pub fn round_amounts(order: &Order) -> Result<Order> {
    let mut rounded = order.clone();
    rounded.amount_s = super::float::round_down(order.amount_s, AMOUNT_ENCODING)?;
    rounded.amount_b = super::float::round_down(order.amount_b, AMOUNT_ENCODING)?;
    rounded.fee_amount = super::float::round_down(order.fee_amount, FEE_ENCODING)?;
    if rounded.amount_s != order.amount_s
        || rounded.amount_b != order.amount_b
        || rounded.fee_amount != order.fee_amount
    {
        rounded.signature = None;
    }
    Ok(rounded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::order_hash::verify_signature;
    use crate::signing::signature::EcdsaSignature;
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;
    use std::str::FromStr;

    // Test private key (DO NOT USE IN PRODUCTION)
    const TEST_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn delegate() -> Address {
        Address::repeat_byte(0xde)
    }

    fn order(owner: Address, amount_s: u64) -> Order {
        Order::builder(delegate(), owner)
            .sell(Address::repeat_byte(0xa1), U256::from(amount_s))
            .buy(Address::repeat_byte(0xb2), U256::from(250_000u64))
            .wallet(Address::repeat_byte(0xc3))
            .fee(U256::from(1_000u64))
            .margin_split_percentage(40)
            .buy_no_more_than_amount_b(true)
            .valid_between(1_700_000_000, 1_700_086_400)
            .build()
            .unwrap()
    }

    fn signed(order: Order) -> Order {
        let signer = PrivateKeySigner::from_str(TEST_PRIVATE_KEY).unwrap();
        let mut order = Order {
            owner: signer.address(),
            ..order
        };
        let signature = signer.sign_message_sync(order.hash().as_slice()).unwrap();
        order.signature = Some(EcdsaSignature::from_alloy(&signature));
        order
    }

    #[test]
    fn test_layout_sizes() {
        assert_eq!(HEADER_LEN, 23);
        assert_eq!(PACKED_ORDER_LEN, 185);
    }

    #[test]
    fn test_pack_unpack_signed_ring() {
        let orders = vec![
            signed(order(Address::ZERO, 1_000_000)),
            signed(order(Address::ZERO, 3_500)),
        ];

        let stream = pack_ring(delegate(), &orders).unwrap();
        assert_eq!(stream.len(), HEADER_LEN + 2 * PACKED_ORDER_LEN);
        assert_eq!(stream.extract_u8(0).unwrap(), RING_VERSION);
        assert_eq!(stream.extract_u16(1).unwrap(), 2);

        let ring = unpack_ring(&stream).unwrap();
        assert_eq!(ring.delegate, delegate());
        assert_eq!(ring.orders, orders);
        assert!(ring.orders.iter().all(verify_signature));
    }

    #[test]
    fn test_unrepresentable_amount_is_rounded() {
        let original = signed(order(Address::ZERO, 123_456_789));
        let stream = pack_ring(delegate(), std::slice::from_ref(&original)).unwrap();
        let unpacked = &unpack_ring(&stream).unwrap().orders[0];

        assert!(unpacked.amount_s < original.amount_s);
        assert!(!verify_signature(unpacked));

        let rounded = round_amounts(&original).unwrap();
        assert_eq!(rounded.amount_s, unpacked.amount_s);
        assert!(rounded.signature.is_none());
    }

    #[test]
    fn test_round_amounts_keeps_signature_when_exact() {
        let original = signed(order(Address::ZERO, 1_000_000));
        assert_eq!(round_amounts(&original).unwrap(), original);
    }

    #[test]
    fn test_unsigned_order_rejected() {
        let orders = vec![order(Address::repeat_byte(1), 1_000)];
        assert!(matches!(
            pack_ring(delegate(), &orders),
            Err(Error::MissingSignature)
        ));
    }

    #[test]
    fn test_margin_split_out_of_range_rejected() {
        let mut bad = signed(order(Address::ZERO, 1_000));
        bad.margin_split_percentage = 101;
        assert!(matches!(
            pack_ring(delegate(), &[bad]),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_foreign_delegate_rejected() {
        let orders = vec![signed(order(Address::ZERO, 1_000))];
        assert!(pack_ring(Address::repeat_byte(0x01), &orders).is_err());
    }

    #[test]
    fn test_timestamp_wider_than_four_bytes_rejected() {
        let mut bad = signed(order(Address::ZERO, 1_000));
        bad.valid_until = U256::from(1u64 << 40);
        assert!(matches!(
            pack_ring(delegate(), &[bad]),
            Err(Error::ValueTooLarge { .. })
        ));
    }

    #[test]
    fn test_unpack_rejects_truncated_and_bad_version() {
        let orders = vec![signed(order(Address::ZERO, 1_000))];
        let bytes = pack_ring(delegate(), &orders).unwrap().into_bytes();

        let mut truncated = bytes.clone();
        truncated.pop();
        assert!(unpack_ring(&Bitstream::from(truncated)).is_err());

        let mut bad_version = bytes;
        bad_version[0] = 9;
        assert!(matches!(
            unpack_ring(&Bitstream::from(bad_version)),
            Err(Error::InvalidEncoding { .. })
        ));
    }

    #[test]
    fn test_unpack_rejects_eip712_tag() {
        let orders = vec![signed(order(Address::ZERO, 1_000))];
        let mut bytes = pack_ring(delegate(), &orders).unwrap().into_bytes();
        let tag_offset = HEADER_LEN + PACKED_ORDER_LEN - TaggedSignature::ENCODED_LEN;
        bytes[tag_offset] = SignAlgorithm::Eip712.as_u8();

        assert!(matches!(
            unpack_ring(&Bitstream::from(bytes)),
            Err(Error::InvalidSignature { .. })
        ));
    }

    #[test]
    fn test_empty_ring() {
        let stream = pack_ring(delegate(), &[]).unwrap();
        assert_eq!(stream.len(), HEADER_LEN);
        assert!(unpack_ring(&stream).unwrap().orders.is_empty());
        assert_eq!(stream.extract_address(3).unwrap(), delegate());
    }
}
