//! Low-level protobuf wire format reading.
//!
//! Byte-cursor primitives over an immutable buffer. Every function takes the
//! buffer and an offset and returns the value together with the offset just
//! past it; nothing is copied and nothing is mutated.
//!
//! ## Wire Format Overview
//!
//! Each protobuf field is encoded as:
//! - A varint "key" containing the field number and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types understood here:
//! - 0: VARINT
//! - 1: FIXED64 (read as a little-endian `f64`)
//! - 2: LENGTH_DELIMITED (strings, bytes, embedded messages)
//! - 5: FIXED32 (read as a little-endian `f32`)
//!
//! The deprecated group markers (3, 4) and the unassigned values (6, 7) are
//! rejected with [`Error::UnknownWireType`].

use crate::error::{Error, Result};
use serde::Serialize;

/// Longest legal varint encoding of a 64-bit value
pub const MAX_VARINT_LEN: usize = 10;

/// Protobuf wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    Fixed64 = 1,
    /// Length-delimited (strings, bytes, embedded messages)
    LengthDelimited = 2,
    /// 32-bit fixed-width
    Fixed32 = 5,
}

impl TryFrom<u8> for WireType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::Fixed32),
            _ => Err(Error::unknown_wire_type(0, value)),
        }
    }
}

/// Decode a varint starting at `offset`.
///
/// Returns the decoded value and the offset of the first byte after it.
pub fn read_varint(buf: &[u8], offset: usize) -> Result<(u64, usize)> {
    let mut result: u64 = 0;

    for (i, &byte) in buf.get(offset..).unwrap_or_default().iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            return Err(Error::malformed_varint(offset));
        }

        // The tenth byte only has room for the top bit of a u64
        if i == MAX_VARINT_LEN - 1 && byte & 0x7F > 1 {
            return Err(Error::malformed_varint(offset));
        }

        result |= u64::from(byte & 0x7F) << (7 * i);

        if byte & 0x80 == 0 {
            return Ok((result, offset + i + 1));
        }
    }

    Err(Error::malformed_varint(offset))
}

/// Read exactly `N` bytes starting at `offset`.
fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Result<([u8; N], usize)> {
    let end = offset
        .checked_add(N)
        .filter(|&end| end <= buf.len())
        .ok_or_else(|| Error::truncated(offset, N as u64, buf.len().saturating_sub(offset)))?;

    let mut bytes = [0u8; N];
    bytes.copy_from_slice(&buf[offset..end]);
    Ok((bytes, end))
}

/// Read a little-endian IEEE 754 double.
pub fn read_fixed64_as_double(buf: &[u8], offset: usize) -> Result<(f64, usize)> {
    let (bytes, next) = read_array::<8>(buf, offset)?;
    Ok((f64::from_le_bytes(bytes), next))
}

/// Read a little-endian IEEE 754 single.
pub fn read_fixed32_as_float(buf: &[u8], offset: usize) -> Result<(f32, usize)> {
    let (bytes, next) = read_array::<4>(buf, offset)?;
    Ok((f32::from_le_bytes(bytes), next))
}

/// Borrow `length` bytes starting at `offset`.
///
/// `length` is taken as decoded from the wire, so it may be far larger than
/// anything addressable; such spans are reported as truncated.
pub fn read_span(buf: &[u8], offset: usize, length: u64) -> Result<(&[u8], usize)> {
    let available = buf.len().saturating_sub(offset);

    let end = usize::try_from(length)
        .ok()
        .and_then(|len| offset.checked_add(len))
        .filter(|&end| end <= buf.len())
        .ok_or_else(|| Error::truncated(offset, length, available))?;

    Ok((&buf[offset..end], end))
}
