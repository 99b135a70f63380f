//! XFS leaf-format extended attribute block parsing.
//!
//! Attribute key/value pairs too large for inline inode storage live in a
//! leaf block: a header, then a table of fixed-size index entries, then
//! the attribute records themselves at block-relative offsets named by the
//! index entries.

use rxfs_types::{ParseError, Region, XfsVersion, ascii_signature};
use serde::{Deserialize, Serialize};

/// Attribute leaf block magic, pre-V5 filesystems.
pub const ATTR_LEAF_MAGIC: u16 = 0xFBEE;
/// Attribute leaf block magic, V5 filesystems.
pub const ATTR_LEAF_MAGIC_V5: u16 = 0x3BEE;

/// Revision-dependent field layout, fixed at construction.
///
/// The V5 header carries an extended checksum region absent in V4, which
/// pushes both the entry-count field and the index table to larger
/// offsets.
#[derive(Debug, Clone, Copy)]
struct LeafLayout {
    entry_count_offset: usize,
    table_base: usize,
}

impl LeafLayout {
    const V4: Self = Self {
        entry_count_offset: 12,
        table_base: 0x20,
    };
    const V5: Self = Self {
        entry_count_offset: 56,
        table_base: 0x50,
    };

    fn for_version(version: XfsVersion) -> Self {
        match version {
            XfsVersion::V4 => Self::V4,
            XfsVersion::V5 => Self::V5,
        }
    }
}

/// Fixed-size index entry in the leaf's name table (8 bytes on disk).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrLeafEntry {
    /// Hash of the attribute name.
    pub hash: u32,
    /// Block-relative offset of the attribute record.
    pub name_offset: u16,
    /// Entry flags (local/remote/incomplete).
    pub flags: u8,
}

impl AttrLeafEntry {
    /// On-disk size of one index entry.
    pub const PACKED_LEN: usize = 8;

    pub fn parse(region: &Region<'_>, offset: usize) -> Result<Self, ParseError> {
        Ok(Self {
            hash: region.read_u32_be(offset)?,
            name_offset: region.read_u16_be(offset + 4)?,
            flags: region.read_u8(offset + 6)?,
        })
    }
}

/// A locally stored attribute record: name and value bytes in the leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafAttribute {
    pub name: Vec<u8>,
    pub value: Vec<u8>,
}

impl LeafAttribute {
    /// Decode one attribute record at a block-relative offset.
    ///
    /// Layout: `value length (u16) | name length (u8) | name | value`.
    pub fn parse(region: &Region<'_>, offset: usize) -> Result<Self, ParseError> {
        let value_len = usize::from(region.read_u16_be(offset)?);
        let name_len = usize::from(region.read_u8(offset + 2)?);
        let name = region.read_bytes(offset + 3, name_len)?.to_vec();
        let value = region.read_bytes(offset + 3 + name_len, value_len)?.to_vec();
        Ok(Self { name, value })
    }

    /// Return the name as a UTF-8 string (lossy).
    #[must_use]
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// Decoder for one leaf-format extended attribute block.
#[derive(Debug, Clone, Copy)]
pub struct LeafAttrBlock<'a> {
    region: Region<'a>,
    layout: LeafLayout,
}

impl<'a> LeafAttrBlock<'a> {
    /// Decode an attribute leaf block at `offset` within `data`.
    ///
    /// The 16-bit signature at offset 8 must be `0xFBEE` (V4) or `0x3BEE`
    /// (V5); anything else fails with [`ParseError::InvalidMagic`]. The
    /// detected filesystem revision fixes all other offsets.
    pub fn new(data: &'a [u8], offset: usize, version: XfsVersion) -> Result<Self, ParseError> {
        let region = Region::new(data, offset);
        let signature = region.read_u16_be(8)?;
        if signature != ATTR_LEAF_MAGIC && signature != ATTR_LEAF_MAGIC_V5 {
            return Err(ParseError::InvalidMagic {
                structure: "XFS leaf attribute block",
                signature: ascii_signature(&signature.to_be_bytes()),
            });
        }
        Ok(Self {
            region,
            layout: LeafLayout::for_version(version),
        })
    }

    /// Number of index entries in the leaf, as recorded in the header.
    ///
    /// The raw count is returned without cross-checking the table; an
    /// inconsistent count surfaces as a bounds error when the entries are
    /// resolved.
    pub fn entry_count(&self) -> Result<u16, ParseError> {
        self.region.read_u16_be(self.layout.entry_count_offset)
    }

    /// Resolve every attribute record, in on-disk index order.
    ///
    /// Recomputed on each call; no deduplication and no overlap checks.
    pub fn attributes(&self) -> Result<Vec<LeafAttribute>, ParseError> {
        let count = usize::from(self.entry_count()?);
        let mut attributes = Vec::with_capacity(count);
        for i in 0..count {
            let entry = AttrLeafEntry::parse(
                &self.region,
                self.layout.table_base + i * AttrLeafEntry::PACKED_LEN,
            )?;
            attributes.push(LeafAttribute::parse(
                &self.region,
                usize::from(entry.name_offset),
            )?);
        }
        Ok(attributes)
    }
}
