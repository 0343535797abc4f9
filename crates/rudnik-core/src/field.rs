//! Single-field decoding.
//!
//! A field is a key varint (`field_number << 3 | wire_type`) followed by a
//! payload whose shape the wire type dictates. Length-delimited payloads are
//! returned as borrowed spans; whether they hold text, a nested message, or
//! opaque bytes is left for the classifier to decide.

use crate::error::Result;
use crate::wire::{self, WireType};

/// The decoded value of one field, one variant per wire type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload<'a> {
    /// Wire type 0
    Varint(u64),
    /// Wire type 1, read as a double
    Fixed64(f64),
    /// Wire type 2, borrowed from the source buffer
    LengthDelimited(&'a [u8]),
    /// Wire type 5, read as a float
    Fixed32(f32),
}

impl Payload<'_> {
    /// The wire type this payload was encoded with
    pub fn wire_type(&self) -> WireType {
        match self {
            Payload::Varint(_) => WireType::Varint,
            Payload::Fixed64(_) => WireType::Fixed64,
            Payload::LengthDelimited(_) => WireType::LengthDelimited,
            Payload::Fixed32(_) => WireType::Fixed32,
        }
    }
}

/// One tag + wire type + payload triple
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedField<'a> {
    /// Field number from the key (`key >> 3`)
    pub field_number: u64,
    /// Decoded payload
    pub payload: Payload<'a>,
}

impl<'a> DecodedField<'a> {
    /// Creates a new decoded field
    pub fn new(field_number: u64, payload: Payload<'a>) -> Self {
        Self {
            field_number,
            payload,
        }
    }

    /// The wire type of this field
    pub fn wire_type(&self) -> WireType {
        self.payload.wire_type()
    }
}

/// Decode the field whose key starts at `offset`.
///
/// On success returns the field and the offset just past its payload. On
/// failure the error's offset is `offset` itself, so
/// [`Error::resume_offset`](crate::Error::resume_offset) gives the next byte a best-effort walk should try.
pub fn decode_field(buf: &[u8], offset: usize) -> Result<(DecodedField<'_>, usize)> {
    decode_at(buf, offset).map_err(|e| e.at_field(offset))
}

fn decode_at(buf: &[u8], offset: usize) -> Result<(DecodedField<'_>, usize)> {
    let (key, position) = wire::read_varint(buf, offset)?;
    let field_number = key >> 3;
    let wire_type = WireType::try_from((key & 0x07) as u8)?;

    let (payload, next) = match wire_type {
        WireType::Varint => {
            let (value, next) = wire::read_varint(buf, position)?;
            (Payload::Varint(value), next)
        }
        WireType::Fixed64 => {
            let (value, next) = wire::read_fixed64_as_double(buf, position)?;
            (Payload::Fixed64(value), next)
        }
        WireType::LengthDelimited => {
            let (length, position) = wire::read_varint(buf, position)?;
            let (span, next) = wire::read_span(buf, position, length)?;
            (Payload::LengthDelimited(span), next)
        }
        WireType::Fixed32 => {
            let (value, next) = wire::read_fixed32_as_float(buf, position)?;
            (Payload::Fixed32(value), next)
        }
    };

    Ok((DecodedField::new(field_number, payload), next))
}
