//! Order Tool
//!
//! Hashes, signs, verifies and packs Ring Protocol orders from the command
//! line. Orders are read as camelCase JSON; results are printed as JSON.

mod commands;

use alloy_primitives::{Address, U256};
use anyhow::Result;
use clap::{Parser, Subcommand};
use protocol_core::config::Config;
use protocol_core::types::Order;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "order-tool")]
#[command(about = "Hash, sign, verify and pack Ring Protocol orders")]
struct Args {
    /// Config file; environment variables are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the order hash and its personal-message hash
    HashOrder {
        /// Order JSON file
        order: PathBuf,
    },
    /// Check an order's signature against its owner
    VerifyOrder {
        /// Signed order JSON file
        order: PathBuf,
    },
    /// Sign an order with the configured private key
    SignOrder {
        /// Order JSON file
        order: PathBuf,
        /// Round amounts to their packed precision before signing
        #[arg(long)]
        packable: bool,
    },
    /// Hash an eth_signTypedData payload, optionally signing the digest
    TypedData {
        /// Typed data JSON file
        file: PathBuf,
        /// Sign the digest with the configured private key
        #[arg(long)]
        sign: bool,
    },
    /// Compress an amount with a float preset
    FloatEncode {
        /// Decimal or 0x-prefixed amount
        value: U256,
        /// Preset width in bits (16, 24 or 28)
        #[arg(long, default_value_t = 24)]
        bits: u32,
    },
    /// Expand a packed float
    FloatDecode {
        /// Packed value, decimal or 0x-prefixed
        packed: String,
        /// Preset width in bits (16, 24 or 28)
        #[arg(long, default_value_t = 24)]
        bits: u32,
    },
    /// Pack signed orders into a ring
    PackRing {
        /// JSON file holding an array of signed orders
        orders: PathBuf,
        /// Delegate address; defaults to the configured one
        #[arg(long)]
        delegate: Option<Address>,
    },
    /// Decode a packed ring and verify each order
    UnpackRing {
        /// Hex-encoded ring, with or without 0x
        hex: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "order_tool=info,protocol_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    debug!(?config, "loaded configuration");

    let output = match args.command {
        Command::HashOrder { order } => commands::hash_order(&commands::read_order(&order)?)?,
        Command::VerifyOrder { order } => commands::verify_order(&commands::read_order(&order)?)?,
        Command::SignOrder { order, packable } => {
            commands::sign_order(&config, &commands::read_order(&order)?, packable).await?
        }
        Command::TypedData { file, sign } => {
            let json = std::fs::read_to_string(&file)?;
            commands::typed_data(&config, &json, sign).await?
        }
        Command::FloatEncode { value, bits } => commands::float_encode(value, bits)?,
        Command::FloatDecode { packed, bits } => commands::float_decode(&packed, bits)?,
        Command::PackRing { orders, delegate } => {
            let json = std::fs::read_to_string(&orders)?;
            let orders: Vec<Order> = serde_json::from_str(&json)?;
            commands::pack_ring(delegate.unwrap_or(config.delegate_address), &orders)?
        }
        Command::UnpackRing { hex } => commands::unpack_ring(&hex)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
