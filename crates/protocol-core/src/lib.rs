//! Ring Protocol Core Library
//!
//! Order hashing, EIP-712 typed data, compact float and ring encodings, and
//! signature handling for off-chain order submission.

pub mod config;
pub mod encoding;
pub mod error;
pub mod signing;
pub mod types;

pub use error::{Error, Result};
