//! Integration tests for component interactions.
//!
//! These tests drive orders through signing, ring packing, unpacking and
//! verification across module boundaries.

use alloy_primitives::{b256, Address, B256, U256};
use protocol_core::encoding::{float, pack_ring, packing, unpack_ring, Bitstream, FLOAT_24, FLOAT_28};
use protocol_core::signing::{
    verify_signature, OrderSigner, SignAlgorithm, TaggedSignature, TypedData, TypedDataDomain,
};
use protocol_core::types::Order;
use protocol_core::Error;

// Test private keys (DO NOT USE IN PRODUCTION)
const ALICE_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const BOB_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

fn domain() -> TypedDataDomain {
    TypedDataDomain::new("Ring Protocol", "2", 1, Address::repeat_byte(0x42))
}

fn delegate() -> Address {
    Address::repeat_byte(0xde)
}

fn signer(key: &str) -> OrderSigner {
    OrderSigner::from_private_key(key, domain()).unwrap()
}

fn order(owner: Address, token_s: Address, token_b: Address, amount_s: u64, amount_b: u64) -> Order {
    Order::builder(delegate(), owner)
        .sell(token_s, U256::from(amount_s))
        .buy(token_b, U256::from(amount_b))
        .fee(U256::from(1_500u64))
        .margin_split_percentage(100)
        .valid_between(1_700_000_000, 1_700_086_400)
        .build()
        .unwrap()
}

/// Two counterparties sign matching orders; the packed ring verifies on the other side.
#[tokio::test]
async fn test_two_order_ring_round_trip() {
    let alice = signer(ALICE_KEY);
    let bob = signer(BOB_KEY);
    let weth = Address::repeat_byte(0x01);
    let lrc = Address::repeat_byte(0x02);

    let orders = vec![
        alice
            .sign_order(&order(alice.address(), weth, lrc, 1_000_000, 4_500_000))
            .await
            .unwrap(),
        bob.sign_order(&order(bob.address(), lrc, weth, 4_500_000, 1_000_000))
            .await
            .unwrap(),
    ];

    let stream = pack_ring(delegate(), &orders).unwrap();
    let hex = stream.to_hex();

    let ring = unpack_ring(&Bitstream::from_hex(&hex).unwrap()).unwrap();
    assert_eq!(ring.delegate, delegate());
    assert_eq!(ring.orders, orders);
    assert!(ring.orders.iter().all(verify_signature));
    assert_eq!(ring.orders[0].owner, alice.address());
    assert_eq!(ring.orders[1].owner, bob.address());
}

/// Amounts that are not float-representable lose precision, and with it the signature.
#[tokio::test]
async fn test_packing_requires_representable_amounts() {
    let alice = signer(ALICE_KEY);
    let raw = order(
        alice.address(),
        Address::repeat_byte(0x01),
        Address::repeat_byte(0x02),
        987_654_321,
        1_000,
    );

    let lossy = alice.sign_order(&raw).await.unwrap();
    let ring = unpack_ring(&pack_ring(delegate(), &[lossy]).unwrap()).unwrap();
    assert!(!verify_signature(&ring.orders[0]));

    let packable = alice
        .sign_order(&packing::round_amounts(&raw).unwrap())
        .await
        .unwrap();
    let ring = unpack_ring(&pack_ring(delegate(), &[packable.clone()]).unwrap()).unwrap();
    assert!(verify_signature(&ring.orders[0]));
    assert_eq!(
        ring.orders[0].amount_s,
        float::round_down(U256::from(987_654_321u64), FLOAT_24).unwrap()
    );
}

/// A signature over one order does not carry over to a tampered copy.
#[tokio::test]
async fn test_tampered_order_fails_after_unpack() {
    let alice = signer(ALICE_KEY);
    let signed = alice
        .sign_order(&order(
            alice.address(),
            Address::repeat_byte(0x01),
            Address::repeat_byte(0x02),
            1_000,
            2_000,
        ))
        .await
        .unwrap();

    let mut bytes = pack_ring(delegate(), &[signed]).unwrap().into_bytes();
    // Last byte of the token B address in the first order.
    bytes[23 + 59] ^= 0xff;

    let ring = unpack_ring(&Bitstream::from(bytes)).unwrap();
    assert!(!verify_signature(&ring.orders[0]));
}

/// A typed-data signature survives the tagged wire codec.
#[tokio::test]
async fn test_typed_data_signature_wire_round_trip() {
    let alice = signer(ALICE_KEY);
    let payload = serde_json::json!({
        "types": {
            "EIP712Domain": [
                { "name": "name", "type": "string" },
                { "name": "version", "type": "string" },
                { "name": "chainId", "type": "uint256" },
                { "name": "verifyingContract", "type": "address" }
            ],
            "CancelOrder": [
                { "name": "owner", "type": "address" },
                { "name": "orderHash", "type": "bytes32" },
                { "name": "cutoff", "type": "uint256" }
            ]
        },
        "primaryType": "CancelOrder",
        "domain": serde_json::to_value(domain()).unwrap(),
        "message": {
            "owner": alice.address(),
            "orderHash": B256::repeat_byte(0x77),
            "cutoff": 1_700_000_000u64
        }
    });
    let typed: TypedData = serde_json::from_value(payload).unwrap();
    let digest = typed.digest().unwrap();

    // Domain JSON carries all four members, so both hashing paths agree.
    assert_eq!(typed.domain_separator().unwrap(), domain().separator());

    let tagged = alice.sign_digest(digest, SignAlgorithm::Eip712).await.unwrap();
    let mut stream = Bitstream::new();
    let offset = tagged.encode(&mut stream).unwrap();

    let decoded = TaggedSignature::decode(&stream, offset).unwrap();
    assert_eq!(decoded, tagged);
    assert!(decoded.verify(digest, alice.address()));
    assert!(!decoded.verify(digest, signer(BOB_KEY).address()));
}

/// The standard EIP-712 Mail example hashes to its published digest.
#[test]
fn test_mail_example_digest() {
    let typed = TypedData::from_json(
        r#"{
            "types": {
                "EIP712Domain": [
                    { "name": "name", "type": "string" },
                    { "name": "version", "type": "string" },
                    { "name": "chainId", "type": "uint256" },
                    { "name": "verifyingContract", "type": "address" }
                ],
                "Person": [
                    { "name": "name", "type": "string" },
                    { "name": "wallet", "type": "address" }
                ],
                "Mail": [
                    { "name": "from", "type": "Person" },
                    { "name": "to", "type": "Person" },
                    { "name": "contents", "type": "string" }
                ]
            },
            "primaryType": "Mail",
            "domain": {
                "name": "Ether Mail",
                "version": "1",
                "chainId": 1,
                "verifyingContract": "0xCcCCccccCCCCcCCCCCCcCcCccCcCCCcCcccccccC"
            },
            "message": {
                "from": { "name": "Cow", "wallet": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826" },
                "to": { "name": "Bob", "wallet": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB" },
                "contents": "Hello, Bob!"
            }
        }"#,
    )
    .unwrap();

    assert_eq!(
        typed.encode_type().unwrap(),
        "Mail(Person from,Person to,string contents)Person(string name,address wallet)"
    );
    assert_eq!(
        typed.digest().unwrap(),
        b256!("be609aee343fb3c4b28e1df9e632fca64fcfaede20f02e86244efddf30957bd2")
    );
}

/// Float fields embedded in a stream decode alongside fixed-width neighbours.
#[test]
fn test_stream_with_mixed_fields() {
    let mut stream = Bitstream::new();
    let a = stream.add_address(Address::repeat_byte(0x11), 20).unwrap();
    let f = stream
        .add_float(U256::from(1_000_000_000_000_000_000u128), FLOAT_28)
        .unwrap();
    let n = stream.add_int32(-42).unwrap();
    let t = stream.add_number(1_700_000_000, 4).unwrap();

    assert_eq!(stream.len(), 20 + 4 + 4 + 4);
    assert_eq!(stream.extract_address(a).unwrap(), Address::repeat_byte(0x11));
    assert_eq!(
        stream.extract_float(f, FLOAT_28).unwrap(),
        U256::from(1_000_000_000_000_000_000u128)
    );
    assert_eq!(stream.extract_int(n, 4).unwrap().as_i64(), -42);
    assert_eq!(stream.extract_u32(t).unwrap(), 1_700_000_000);

    // 32 bytes is exactly one word.
    let words = stream.to_bytes32_array().unwrap();
    assert_eq!(words.len(), 1);
    assert_eq!(words[0].as_slice(), stream.as_bytes());

    stream.add_bool(false);
    assert!(matches!(
        stream.to_bytes32_array(),
        Err(Error::NotWordAligned { len: 33 })
    ));
}
