//! Byte-level encodings shared with the settlement contract.

pub mod bitstream;
pub mod float;
pub mod packing;

pub use bitstream::Bitstream;
pub use float::{FloatEncoding, FLOAT_16, FLOAT_24, FLOAT_28};
pub use packing::{pack_ring, unpack_ring, UnpackedRing};
