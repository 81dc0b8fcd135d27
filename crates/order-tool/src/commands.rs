//! Subcommand implementations. Each returns the JSON value to print.

use alloy_primitives::{Address, U256};
use anyhow::{bail, Context, Result};
use protocol_core::config::Config;
use protocol_core::encoding::{float, packing, Bitstream, FloatEncoding};
use protocol_core::signing::{
    compute_order_hash, to_personal_message_hash, verify_signature, OrderSigner, SignAlgorithm,
    TypedData,
};
use protocol_core::types::Order;
use serde_json::{json, Value};
use std::path::Path;
use tracing::{info, warn};

pub fn read_order(path: &Path) -> Result<Order> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read order file {}", path.display()))?;
    serde_json::from_str(&json).context("Failed to parse order JSON")
}

fn signer(config: &Config) -> Result<OrderSigner> {
    OrderSigner::from_private_key(config.require_private_key()?, config.domain())
}

fn preset(bits: u32) -> Result<FloatEncoding> {
    match FloatEncoding::preset(bits) {
        Some(encoding) => Ok(encoding),
        None => bail!("no float preset with {bits} bits (expected 16, 24 or 28)"),
    }
}

pub fn hash_order(order: &Order) -> Result<Value> {
    order.validate()?;
    let order_hash = compute_order_hash(order);
    Ok(json!({
        "orderHash": order_hash,
        "personalMessageHash": to_personal_message_hash(order_hash),
    }))
}

pub fn verify_order(order: &Order) -> Result<Value> {
    let valid = verify_signature(order);
    if !valid {
        warn!(owner = %order.owner, "order signature is not valid");
    }
    Ok(json!({
        "orderHash": compute_order_hash(order),
        "owner": order.owner,
        "valid": valid,
    }))
}

pub async fn sign_order(config: &Config, order: &Order, packable: bool) -> Result<Value> {
    let order = if packable {
        packing::round_amounts(order)?
    } else {
        order.clone()
    };
    let signed = signer(config)?.sign_order(&order).await?;
    info!(order_hash = %signed.hash(), "order signed");
    Ok(serde_json::to_value(signed)?)
}

pub async fn typed_data(config: &Config, json: &str, sign: bool) -> Result<Value> {
    let typed = TypedData::from_json(json)?;
    let digest = typed.digest()?;
    let mut output = json!({
        "encodedType": typed.encode_type()?,
        "domainSeparator": typed.domain_separator()?,
        "structHash": typed.struct_hash()?,
        "digest": digest,
    });

    if sign {
        let tagged = signer(config)?
            .sign_digest(digest, SignAlgorithm::Eip712)
            .await?;
        let mut wire = Bitstream::new();
        tagged.encode(&mut wire)?;
        output["signature"] = json!(wire.to_hex());
    }
    Ok(output)
}

pub fn float_encode(value: U256, bits: u32) -> Result<Value> {
    let encoding = preset(bits)?;
    let packed = float::encode(value, encoding)?;
    let rounded = float::decode(packed, encoding)?;
    Ok(json!({
        "packed": format!("{packed:#x}"),
        "value": rounded.to_string(),
        "exact": rounded == value,
    }))
}

pub fn float_decode(packed: &str, bits: u32) -> Result<Value> {
    let encoding = preset(bits)?;
    let packed = match packed.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => packed.parse(),
    }
    .with_context(|| format!("invalid packed value {packed}"))?;
    let value = float::decode(packed, encoding)?;
    Ok(json!({ "value": value.to_string() }))
}

pub fn pack_ring(delegate: Address, orders: &[Order]) -> Result<Value> {
    let stream = packing::pack_ring(delegate, orders)?;
    info!(orders = orders.len(), bytes = stream.len(), "ring packed");
    Ok(json!({
        "numOrders": orders.len(),
        "length": stream.len(),
        "data": stream.to_hex(),
    }))
}

pub fn unpack_ring(hex: &str) -> Result<Value> {
    let stream = Bitstream::from_hex(hex.trim())?;
    let ring = packing::unpack_ring(&stream)?;
    let orders = ring
        .orders
        .iter()
        .map(|order| {
            Ok(json!({
                "order": serde_json::to_value(order)?,
                "orderHash": compute_order_hash(order),
                "valid": verify_signature(order),
            }))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(json!({
        "delegate": ring.delegate,
        "orders": orders,
    }))
}
