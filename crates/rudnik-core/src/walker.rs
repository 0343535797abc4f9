//! Best-effort iteration over every field in a buffer.
//!
//! The walker never aborts: when a field fails to decode at offset `o` it
//! resumes at `o + 1`. Noisy captures routinely contain stray bytes between
//! well-formed fields, and the fields on both sides are still worth having.
//!
//! Length-delimited payloads are yielded as spans and never descended into
//! here; whether a span is a nested message is the classifier's call.

use crate::field::{decode_field, DecodedField};
use tracing::trace;

/// Walk every decodable field of `buf`, front to back.
pub fn walk(buf: &[u8]) -> FieldWalker<'_> {
    FieldWalker::new(buf)
}

/// Forward-only iterator over the fields of one buffer
#[derive(Debug, Clone)]
pub struct FieldWalker<'a> {
    buf: &'a [u8],
    position: usize,
    resyncs: usize,
}

impl<'a> FieldWalker<'a> {
    /// Creates a walker positioned at the start of `buf`
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            position: 0,
            resyncs: 0,
        }
    }

    /// Current cursor position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of times the walker skipped a byte after a failed decode
    pub fn resyncs(&self) -> usize {
        self.resyncs
    }
}

impl<'a> Iterator for FieldWalker<'a> {
    type Item = DecodedField<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.position < self.buf.len() {
            match decode_field(self.buf, self.position) {
                Ok((field, next)) => {
                    self.position = next;
                    return Some(field);
                }
                Err(e) => {
                    trace!("Resyncing after {}", e);
                    self.position = e.resume_offset().unwrap_or(self.position + 1);
                    self.resyncs += 1;
                }
            }
        }

        None
    }
}

impl std::iter::FusedIterator for FieldWalker<'_> {}
