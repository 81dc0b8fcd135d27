//! Core domain types for ring submission.

pub mod order;

pub use order::*;
