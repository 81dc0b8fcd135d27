//! Error types for the ring protocol encoding and signing core.

use alloy_primitives::U256;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("value too large for requested width: {value} does not fit in {num_bytes} bytes")]
    ValueTooLarge { value: String, num_bytes: usize },

    #[error("extraction out of range: offset {offset} + {num_bytes} bytes exceeds length {len}")]
    OutOfRange {
        offset: usize,
        num_bytes: usize,
        len: usize,
    },

    #[error("hex string has odd length: {len}")]
    OddLengthHex { len: usize },

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("stream length {len} is not a multiple of 32 bytes")]
    NotWordAligned { len: usize },

    #[error("invalid float encoding: {message}")]
    InvalidEncoding { message: String },

    #[error("float value out of range: {value} exceeds maximum {max}")]
    FloatOutOfRange { value: U256, max: U256 },

    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error("unknown type: {0}")]
    UnknownType(String),

    #[error("missing field `{field}` for type {type_name}")]
    MissingField { type_name: String, field: String },

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("unknown signature algorithm tag: {0}")]
    UnknownAlgorithm(u8),

    #[error("invalid signature: {message}")]
    InvalidSignature { message: String },

    #[error("order is not signed")]
    MissingSignature,

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl Error {
    pub(crate) fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
