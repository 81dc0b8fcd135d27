//! Ring Protocol: order encoding and signing toolkit
//!
//! This is the root crate that provides benchmark and integration test access
//! to the workspace crates:
//!
//! - `protocol-core`: Order hashing, EIP-712, float and ring encodings, signatures
//! - `order-tool`: Command line front end

// Re-export for benchmarks
pub use protocol_core as core;
