//! Configuration for order signing and ring submission.

use crate::signing::TypedDataDomain;
use crate::{Error, Result};
use alloy_primitives::Address;
use serde::Deserialize;
use std::env;
use std::path::Path;

/// Prefix for environment overrides layered over a config file.
pub const ENV_PREFIX: &str = "RING";

/// Application configuration.
#[derive(Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub domain: DomainConfig,
    /// Delegate contract orders are bound to.
    pub delegate_address: Address,
    /// Hex private key used by the signing commands.
    pub signer_private_key: Option<String>,
}

/// EIP-712 domain members.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            name: "Ring Protocol".to_string(),
            version: "2".to_string(),
            chain_id: crate::signing::MAINNET_CHAIN_ID,
            verifying_contract: Address::ZERO,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Reads `.env` first if present. Every variable except
    /// `SIGNER_PRIVATE_KEY` has a default.
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = DomainConfig::default();

        Ok(Self {
            domain: DomainConfig {
                name: lookup("DOMAIN_NAME").unwrap_or(defaults.name),
                version: lookup("DOMAIN_VERSION").unwrap_or(defaults.version),
                chain_id: match lookup("CHAIN_ID") {
                    Some(value) => value.trim().parse().map_err(|_| Error::Config {
                        message: format!("CHAIN_ID is not a number: {value}"),
                    })?,
                    None => defaults.chain_id,
                },
                verifying_contract: parse_address(
                    "VERIFYING_CONTRACT",
                    lookup("VERIFYING_CONTRACT"),
                )?,
            },
            delegate_address: parse_address("DELEGATE_ADDRESS", lookup("DELEGATE_ADDRESS"))?,
            signer_private_key: lookup("SIGNER_PRIVATE_KEY").filter(|key| !key.is_empty()),
        })
    }

    /// Load configuration from a TOML/JSON/YAML file, with `RING_`-prefixed
    /// environment overrides (`RING_DOMAIN__CHAIN_ID=5`).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(cfg.try_deserialize()?)
    }

    /// The signing domain described by this configuration.
    pub fn domain(&self) -> TypedDataDomain {
        TypedDataDomain::new(
            self.domain.name.clone(),
            self.domain.version.clone(),
            self.domain.chain_id,
            self.domain.verifying_contract,
        )
    }

    /// The configured private key, or a config error naming the variable.
    pub fn require_private_key(&self) -> Result<&str> {
        self.signer_private_key
            .as_deref()
            .ok_or_else(|| Error::Config {
                message: "SIGNER_PRIVATE_KEY environment variable not set".to_string(),
            })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("domain", &self.domain)
            .field("delegate_address", &self.delegate_address)
            .field(
                "signer_private_key",
                &self.signer_private_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

fn parse_address(name: &str, value: Option<String>) -> Result<Address> {
    match value {
        Some(value) => value.trim().parse().map_err(|_| Error::Config {
            message: format!("{name} is not a valid address: {value}"),
        }),
        None => Ok(Address::ZERO),
    }
}
