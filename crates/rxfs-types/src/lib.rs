#![forbid(unsafe_code)]
//! Shared primitives for the rxfs read-only XFS reader.
//!
//! XFS metadata blocks are self-describing byte blobs: every field is
//! located by offset arithmetic, all multi-byte integers are big-endian,
//! and the layout of a block depends on the filesystem's format revision.
//! This crate provides the pieces every decoder is built on: the
//! [`XfsVersion`] revision enum, the [`Region`] field accessor, and the
//! [`ParseError`] taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// On-disk format revision.
///
/// V5 adds checksums, a UUID, and log-sequence metadata to every metadata
/// block, which shifts field offsets relative to V4. The revision is
/// detected once per filesystem (from the superblock) and passed to each
/// decoder at construction; a decoder never switches revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum XfsVersion {
    V4,
    V5,
}

/// XFS inode number (u64, absolute).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InodeNumber(pub u64);

impl fmt::Display for InodeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("insufficient data: need {needed} bytes at offset {offset}, got {actual}")]
    InsufficientData {
        needed: usize,
        offset: usize,
        actual: usize,
    },
    #[error("wrong magic number for {structure}: {signature}")]
    InvalidMagic {
        structure: &'static str,
        signature: String,
    },
    #[error("invalid field: {field} ({reason})")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
}

/// Render raw signature bytes for diagnostics.
///
/// Printable ASCII passes through; anything else becomes `.` so that a
/// bad magic is always representable in an error message.
#[must_use]
pub fn ascii_signature(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if (0x20..0x7F).contains(&b) {
                char::from(b)
            } else {
                '.'
            }
        })
        .collect()
}

/// An immutable view over a metadata block inside a larger buffer.
///
/// All reads are relative to `base` and bounds-checked against the end of
/// the underlying buffer. A `Region` never owns or mutates the bytes it
/// looks at; decoders borrow it for their whole lifetime.
#[derive(Debug, Clone, Copy)]
pub struct Region<'a> {
    data: &'a [u8],
    base: usize,
}

impl<'a> Region<'a> {
    #[must_use]
    pub fn new(data: &'a [u8], base: usize) -> Self {
        Self { data, base }
    }

    /// Base offset of this region within the underlying buffer.
    #[must_use]
    pub fn base(&self) -> usize {
        self.base
    }

    fn ensure(&self, offset: usize, len: usize) -> Result<&'a [u8], ParseError> {
        let overflow = ParseError::InvalidField {
            field: "offset",
            reason: "overflow",
        };
        let start = self.base.checked_add(offset).ok_or(overflow.clone())?;
        let end = start.checked_add(len).ok_or(overflow)?;
        if end > self.data.len() {
            return Err(ParseError::InsufficientData {
                needed: len,
                offset: start,
                actual: self.data.len().saturating_sub(start),
            });
        }
        Ok(&self.data[start..end])
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, ParseError> {
        Ok(self.ensure(offset, 1)?[0])
    }

    pub fn read_u16_be(&self, offset: usize) -> Result<u16, ParseError> {
        let bytes = self.ensure(offset, 2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32_be(&self, offset: usize) -> Result<u32, ParseError> {
        let bytes = self.ensure(offset, 4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i64_be(&self, offset: usize) -> Result<i64, ParseError> {
        let bytes = self.ensure(offset, 8)?;
        Ok(i64::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    /// Borrow `len` raw bytes at `offset`.
    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<&'a [u8], ParseError> {
        self.ensure(offset, len)
    }

    /// Read a fixed-length field rendered as ASCII (diagnostic signatures).
    pub fn read_ascii(&self, offset: usize, len: usize) -> Result<String, ParseError> {
        Ok(ascii_signature(self.ensure(offset, len)?))
    }

    /// Read a 16-byte UUID rendered in canonical hyphenated form.
    pub fn read_uuid(&self, offset: usize) -> Result<String, ParseError> {
        let b = self.ensure(offset, 16)?;
        let mut out = String::with_capacity(36);
        for (i, byte) in b.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                out.push('-');
            }
            out.push_str(&format!("{byte:02x}"));
        }
        Ok(out)
    }
}
