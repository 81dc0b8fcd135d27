//! Positional byte stream used to build and parse on-chain payloads.
//!
//! Every write appends an exact-width big-endian value and returns the
//! offset it was written at. Reads take an explicit offset rather than a
//! cursor, because the settlement contract parses the same buffer by fixed
//! offsets.

use alloy_primitives::{Address, B256, I256, U256};

use super::float::{self, FloatEncoding};
use crate::{Error, Result};

/// Width of an EVM word in bytes.
pub const WORD_SIZE: usize = 32;

/// Width of an address in bytes.
pub const ADDRESS_SIZE: usize = 20;

/// Append-only byte buffer with offset-based typed readers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitstream {
    data: Vec<u8>,
}

impl Bitstream {
    /// Create an empty stream.
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Create an empty stream with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Parse a stream from a hex string, with or without `0x` prefix.
    pub fn from_hex(value: &str) -> Result<Self> {
        let mut stream = Self::new();
        stream.add_raw_hex(value)?;
        Ok(stream)
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Lowercase `0x`-prefixed hex of the whole stream.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.data))
    }

    // ------------------------------------------------------------------
    // Writers
    // ------------------------------------------------------------------

    /// Append `value` left-padded to `num_bytes` bytes.
    ///
    /// Fails if the minimal big-endian representation of `value` is wider
    /// than `num_bytes`.
    pub fn add_big_uint(&mut self, value: U256, num_bytes: usize) -> Result<usize> {
        check_width(num_bytes)?;
        if value.byte_len() > num_bytes {
            return Err(Error::ValueTooLarge {
                value: value.to_string(),
                num_bytes,
            });
        }
        let word = value.to_be_bytes::<WORD_SIZE>();
        Ok(self.append(&word[WORD_SIZE - num_bytes..]))
    }

    /// Append a full 32-byte unsigned word.
    pub fn add_uint256(&mut self, value: U256) -> Result<usize> {
        self.add_big_uint(value, WORD_SIZE)
    }

    /// Append a native integer left-padded to `num_bytes` bytes.
    pub fn add_number(&mut self, value: u64, num_bytes: usize) -> Result<usize> {
        self.add_big_uint(U256::from(value), num_bytes)
    }

    /// Append a signed integer using `num_bytes` bytes.
    ///
    /// Negative values are written as the two's complement of width
    /// `num_bytes * 8` bits. Non-negative values are written like
    /// [`Bitstream::add_big_uint`].
    pub fn add_signed_int(&mut self, value: I256, num_bytes: usize) -> Result<usize> {
        check_width(num_bytes)?;
        if !value.is_negative() {
            return self.add_big_uint(value.into_raw(), num_bytes);
        }

        let bits = num_bytes * 8;
        // -2^(bits-1) in 256-bit two's complement
        let min = I256::from_raw(U256::MAX << (bits - 1));
        if value < min {
            return Err(Error::ValueTooLarge {
                value: value.to_string(),
                num_bytes,
            });
        }

        let word = value.into_raw().to_be_bytes::<WORD_SIZE>();
        Ok(self.append(&word[WORD_SIZE - num_bytes..]))
    }

    /// Append a signed 4-byte integer.
    pub fn add_int32(&mut self, value: i32) -> Result<usize> {
        let value = I256::try_from(value)
            .map_err(|_| Error::invalid_value("int32", format!("{value} is not representable")))?;
        self.add_signed_int(value, 4)
    }

    /// Append an address left-padded to `num_bytes` bytes (at least 20).
    pub fn add_address(&mut self, value: Address, num_bytes: usize) -> Result<usize> {
        check_width(num_bytes)?;
        if num_bytes < ADDRESS_SIZE {
            return Err(Error::ValueTooLarge {
                value: value.to_string(),
                num_bytes,
            });
        }
        let word = B256::left_padding_from(value.as_slice());
        Ok(self.append(&word[WORD_SIZE - num_bytes..]))
    }

    /// Append an address given as hex text, with or without `0x` prefix.
    ///
    /// The text must hold exactly 20 bytes; width rules match [`Self::add_address`].
    pub fn add_address_hex(&mut self, value: &str, num_bytes: usize) -> Result<usize> {
        check_width(num_bytes)?;
        let stripped = strip_hex_prefix(value.trim());
        if stripped.len() % 2 != 0 {
            return Err(Error::OddLengthHex {
                len: stripped.len(),
            });
        }
        let address = stripped
            .parse::<Address>()
            .map_err(|e| Error::invalid_value("address", format!("{value:?}: {e}")))?;
        self.add_address(address, num_bytes)
    }

    /// Append raw hex data. Odd-length input is rejected.
    pub fn add_raw_hex(&mut self, value: &str) -> Result<usize> {
        let stripped = strip_hex_prefix(value);
        if stripped.len() % 2 != 0 {
            return Err(Error::OddLengthHex {
                len: stripped.len(),
            });
        }
        let raw = hex::decode(stripped)?;
        Ok(self.append(&raw))
    }

    pub fn add_raw_bytes(&mut self, value: &[u8]) -> usize {
        self.append(value)
    }

    pub fn add_bytes32(&mut self, value: B256) -> usize {
        self.append(value.as_slice())
    }

    /// Append a boolean as a single byte.
    pub fn add_bool(&mut self, value: bool) -> usize {
        self.append(&[u8::from(value)])
    }

    /// Append `value` compressed with `encoding`, using the encoding's byte width.
    pub fn add_float(&mut self, value: U256, encoding: FloatEncoding) -> Result<usize> {
        let packed = float::encode(value, encoding)?;
        self.add_number(u64::from(packed), encoding.num_bytes())
    }

    fn append(&mut self, bytes: &[u8]) -> usize {
        let offset = self.data.len();
        self.data.extend_from_slice(bytes);
        offset
    }

    // ------------------------------------------------------------------
    // Readers
    // ------------------------------------------------------------------

    /// Borrow the bytes in `[offset, offset + num_bytes)`.
    pub fn extract_fixed(&self, offset: usize, num_bytes: usize) -> Result<&[u8]> {
        let end = offset
            .checked_add(num_bytes)
            .filter(|end| *end <= self.data.len())
            .ok_or(Error::OutOfRange {
                offset,
                num_bytes,
                len: self.data.len(),
            })?;
        Ok(&self.data[offset..end])
    }

    /// Read a big-endian unsigned integer of `num_bytes` (1..=32) bytes.
    pub fn extract_uint(&self, offset: usize, num_bytes: usize) -> Result<U256> {
        check_width(num_bytes)?;
        Ok(U256::from_be_slice(self.extract_fixed(offset, num_bytes)?))
    }

    /// Read a two's complement integer of `num_bytes` bytes, sign-extended.
    pub fn extract_int(&self, offset: usize, num_bytes: usize) -> Result<I256> {
        let raw = self.extract_uint(offset, num_bytes)?;
        let bits = num_bytes * 8;
        if bits < 256 && raw.bit(bits - 1) {
            return Ok(I256::from_raw(raw | (U256::MAX << bits)));
        }
        Ok(I256::from_raw(raw))
    }

    pub fn extract_u8(&self, offset: usize) -> Result<u8> {
        Ok(self.extract_fixed(offset, 1)?[0])
    }

    pub fn extract_u16(&self, offset: usize) -> Result<u16> {
        let bytes = self.extract_fixed(offset, 2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn extract_u32(&self, offset: usize) -> Result<u32> {
        let bytes = self.extract_fixed(offset, 4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read an unsigned integer of up to 8 bytes into a `u64`.
    pub fn extract_u64(&self, offset: usize, num_bytes: usize) -> Result<u64> {
        if num_bytes == 0 || num_bytes > 8 {
            return Err(Error::invalid_value(
                "num_bytes",
                format!("{num_bytes} bytes does not fit in a u64"),
            ));
        }
        let bytes = self.extract_fixed(offset, num_bytes)?;
        Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    pub fn extract_bool(&self, offset: usize) -> Result<bool> {
        match self.extract_u8(offset)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::invalid_value(
                "bool",
                format!("byte {other:#04x} at offset {offset} is not a boolean"),
            )),
        }
    }

    /// Read a 20-byte address.
    pub fn extract_address(&self, offset: usize) -> Result<Address> {
        Ok(Address::from_slice(
            self.extract_fixed(offset, ADDRESS_SIZE)?,
        ))
    }

    pub fn extract_bytes32(&self, offset: usize) -> Result<B256> {
        Ok(B256::from_slice(self.extract_fixed(offset, WORD_SIZE)?))
    }

    /// Read and decompress a value written with [`Bitstream::add_float`].
    pub fn extract_float(&self, offset: usize, encoding: FloatEncoding) -> Result<U256> {
        let packed = self.extract_u64(offset, encoding.num_bytes())?;
        let packed = u32::try_from(packed).map_err(|_| Error::InvalidEncoding {
            message: format!("packed float {packed} wider than 32 bits"),
        })?;
        float::decode(packed, encoding)
    }

    /// Split the stream into 32-byte words for a `bytes32[]` argument.
    pub fn to_bytes32_array(&self) -> Result<Vec<B256>> {
        if self.data.len() % WORD_SIZE != 0 {
            return Err(Error::NotWordAligned {
                len: self.data.len(),
            });
        }
        Ok(self
            .data
            .chunks_exact(WORD_SIZE)
            .map(B256::from_slice)
            .collect())
    }
}

impl From<Vec<u8>> for Bitstream {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl AsRef<[u8]> for Bitstream {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

fn check_width(num_bytes: usize) -> Result<()> {
    if num_bytes == 0 || num_bytes > WORD_SIZE {
        return Err(Error::invalid_value(
            "num_bytes",
            format!("width must be between 1 and {WORD_SIZE} bytes, got {num_bytes}"),
        ));
    }
    Ok(())
}

fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}
