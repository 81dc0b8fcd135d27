//! Lossy fixed-point compression for on-chain amounts.
//!
//! A value is stored as `mantissa * base^exponent` packed into
//! `num_bits_exponent + num_bits_mantissa` bits. Encoding always rounds
//! down, so a decoded amount never exceeds the amount that was encoded.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{Error, Result};

/// Describes one `(exponent, mantissa, base)` float layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloatEncoding {
    /// Bits reserved for the exponent (high bits).
    pub num_bits_exponent: u32,
    /// Bits reserved for the mantissa (low bits).
    pub num_bits_mantissa: u32,
    /// Base the exponent is applied to.
    pub exponent_base: u64,
}

/// 16-bit layout (5 exponent / 11 mantissa), used for fees.
pub const FLOAT_16: FloatEncoding = FloatEncoding::new(5, 11, 10);

/// 24-bit layout (5 exponent / 19 mantissa), used for order amounts.
pub const FLOAT_24: FloatEncoding = FloatEncoding::new(5, 19, 10);

/// 28-bit layout (5 exponent / 23 mantissa), used for wide amounts.
pub const FLOAT_28: FloatEncoding = FloatEncoding::new(5, 23, 10);

impl FloatEncoding {
    pub const fn new(num_bits_exponent: u32, num_bits_mantissa: u32, exponent_base: u64) -> Self {
        Self {
            num_bits_exponent,
            num_bits_mantissa,
            exponent_base,
        }
    }

    /// Look up a preset by its total bit width.
    pub fn preset(num_bits: u32) -> Option<Self> {
        match num_bits {
            16 => Some(FLOAT_16),
            24 => Some(FLOAT_24),
            28 => Some(FLOAT_28),
            _ => None,
        }
    }

    /// Total packed width in bits.
    pub const fn num_bits(&self) -> u32 {
        self.num_bits_exponent + self.num_bits_mantissa
    }

    /// Bytes needed to store a packed value.
    pub const fn num_bytes(&self) -> usize {
        self.num_bits().div_ceil(8) as usize
    }

    pub const fn max_mantissa(&self) -> u64 {
        (1u64 << self.num_bits_mantissa) - 1
    }

    pub const fn max_exponent(&self) -> u64 {
        (1u64 << self.num_bits_exponent) - 1
    }

    /// Check the descriptor can be packed into a `u32` and evaluated in 256 bits.
    pub fn validate(&self) -> Result<()> {
        if self.num_bits_exponent == 0 || self.num_bits_mantissa == 0 {
            return Err(Error::InvalidEncoding {
                message: "exponent and mantissa need at least one bit each".to_string(),
            });
        }
        if self.num_bits() > 32 {
            return Err(Error::InvalidEncoding {
                message: format!("{} bits do not fit in 32", self.num_bits()),
            });
        }
        if self.exponent_base < 2 {
            return Err(Error::InvalidEncoding {
                message: format!("exponent base {} must be at least 2", self.exponent_base),
            });
        }
        self.max_value().map(|_| ())
    }

    /// Largest representable value, `max_mantissa * base^max_exponent`.
    pub fn max_value(&self) -> Result<U256> {
        pow(self.exponent_base, self.max_exponent())
            .and_then(|scale| scale.checked_mul(U256::from(self.max_mantissa())))
            .ok_or_else(|| Error::InvalidEncoding {
                message: format!("maximum value of {self:?} overflows 256 bits"),
            })
    }
}

/// Compress `value`, rounding down to the nearest representable float.
pub fn encode(value: U256, encoding: FloatEncoding) -> Result<u32> {
    encoding.validate()?;
    let max = encoding.max_value()?;
    if value > max {
        return Err(Error::FloatOutOfRange { value, max });
    }

    let base = U256::from(encoding.exponent_base);
    let max_mantissa = U256::from(encoding.max_mantissa());

    let mut exponent = 0u32;
    let mut r = value / max_mantissa;
    let mut d = U256::from(1u64);
    while r >= base || d * max_mantissa < value {
        r /= base;
        exponent += 1;
        d *= base;
    }
    let mantissa = value / d;

    // Both bounds follow from the loop condition and the range check.
    if u64::from(exponent) > encoding.max_exponent() || mantissa > max_mantissa {
        return Err(Error::FloatOutOfRange { value, max });
    }

    let mantissa = mantissa.to::<u64>() as u32;
    let packed = (exponent << encoding.num_bits_mantissa) | mantissa;
    trace!(%value, exponent, mantissa, packed, "encoded float");
    Ok(packed)
}

/// Expand a packed float back into `mantissa * base^exponent`.
pub fn decode(packed: u32, encoding: FloatEncoding) -> Result<U256> {
    encoding.validate()?;
    if encoding.num_bits() < 32 && packed >> encoding.num_bits() != 0 {
        return Err(Error::InvalidEncoding {
            message: format!("packed value {packed:#x} wider than {} bits", encoding.num_bits()),
        });
    }

    let exponent = u64::from(packed >> encoding.num_bits_mantissa);
    let mantissa = u64::from(packed) & encoding.max_mantissa();
    pow(encoding.exponent_base, exponent)
        .and_then(|scale| scale.checked_mul(U256::from(mantissa)))
        .ok_or_else(|| Error::InvalidEncoding {
            message: format!("packed value {packed:#x} overflows 256 bits"),
        })
}

/// Largest representable value not exceeding `value`.
pub fn round_down(value: U256, encoding: FloatEncoding) -> Result<U256> {
    decode(encode(value, encoding)?, encoding)
}

fn pow(base: u64, exponent: u64) -> Option<U256> {
    U256::from(base).checked_pow(U256::from(exponent))
}
