//! XFS block-format directory parsing.
//!
//! When a shortform directory outgrows its inode, the entries move into a
//! dedicated filesystem block. The block carries a fixed header followed by
//! a densely packed stream of variable-length entries, terminated by an
//! entry whose name length is zero. Everything after the sentinel is
//! padding.

use rxfs_types::{ParseError, Region, ascii_signature};
use serde::{Deserialize, Serialize};

/// Block directory magic, pre-V5 filesystems ("XD2B").
pub const DIR2_BLOCK_MAGIC: u32 = 0x5844_3242;
/// Block directory magic, V5 filesystems ("XDB3").
pub const DIR3_BLOCK_MAGIC: u32 = 0x5844_4233;

/// Offset of the first directory entry within the block.
///
/// This is the V5 data header length and is used for both revisions: the
/// entry stream is scanned from here regardless of the detected format.
pub const ENTRY_STREAM_START: usize = 64;

/// A single variable-length directory entry record.
///
/// The record is `inode (i64) | name length (u8) | name bytes`, padded so
/// that the next entry starts on an 8-byte boundary. A record with an
/// empty name is the stream's terminating sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDirEntry {
    /// Inode number referenced by this entry.
    pub inode: i64,
    /// Name bytes (empty for the sentinel).
    pub name: Vec<u8>,
}

impl BlockDirEntry {
    /// Decode one entry record at a block-relative offset.
    pub fn parse(region: &Region<'_>, offset: usize) -> Result<Self, ParseError> {
        let inode = region.read_i64_be(offset)?;
        let name_len = usize::from(region.read_u8(offset + 8)?);
        let name = region.read_bytes(offset + 9, name_len)?.to_vec();
        Ok(Self { inode, name })
    }

    /// On-disk bytes consumed by this entry, used only to advance the scan.
    ///
    /// Header (8 inode + 1 name length) + name + file type byte + 2-byte
    /// tag, rounded up to the 8-byte entry alignment.
    #[must_use]
    pub fn entry_size(&self) -> usize {
        (self.name.len() + 12 + 7) & !7
    }

    /// Whether this record is the zero-length-name stream terminator.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.name.is_empty()
    }

    /// Return the name as a UTF-8 string (lossy).
    #[must_use]
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// Raw decoder for one block-format directory block.
///
/// Validates the magic at construction and exposes the header metadata
/// plus the entry stream. Inode resolution lives a layer up, in
/// `rxfs-core`, which pairs this decoder with a filesystem session.
#[derive(Debug, Clone, Copy)]
pub struct BlockDirData<'a> {
    region: Region<'a>,
}

impl<'a> BlockDirData<'a> {
    /// Decode a directory block at `offset` within `data`.
    ///
    /// Fails with [`ParseError::InvalidMagic`] unless the 32-bit signature
    /// at offset 0 is `"XD2B"` or `"XDB3"`.
    pub fn new(data: &'a [u8], offset: usize) -> Result<Self, ParseError> {
        let region = Region::new(data, offset);
        let magic = region.read_u32_be(0)?;
        if magic != DIR2_BLOCK_MAGIC && magic != DIR3_BLOCK_MAGIC {
            return Err(ParseError::InvalidMagic {
                structure: "XFS block directory",
                signature: ascii_signature(&magic.to_be_bytes()),
            });
        }
        Ok(Self { region })
    }

    /// Checksum of the directory block.
    pub fn checksum(&self) -> Result<u32, ParseError> {
        self.region.read_u32_be(4)
    }

    /// Block number of this directory block.
    pub fn block_number(&self) -> Result<i64, ParseError> {
        self.region.read_i64_be(8)
    }

    /// Log sequence number of the last write to this block.
    pub fn log_sequence_number(&self) -> Result<i64, ParseError> {
        self.region.read_i64_be(16)
    }

    /// UUID of this block, canonical hyphenated form.
    pub fn uuid(&self) -> Result<String, ParseError> {
        self.region.read_uuid(24)
    }

    /// Inode number of the directory this block belongs to.
    pub fn parent_inode(&self) -> Result<i64, ParseError> {
        self.region.read_i64_be(40)
    }

    /// Iterate the entry stream lazily, stopping at the sentinel.
    #[must_use]
    pub fn entries_iter(&self) -> DirEntryIter<'a> {
        DirEntryIter {
            region: self.region,
            offset: ENTRY_STREAM_START,
            done: false,
        }
    }

    /// Collect the entry stream in on-disk order.
    ///
    /// A block whose stream reaches the physical end without a sentinel is
    /// reported as corruption, never as a truncated-but-successful result.
    pub fn raw_entries(&self) -> Result<Vec<BlockDirEntry>, ParseError> {
        self.entries_iter().collect()
    }
}

/// Lazy scan over a directory block's entry stream.
///
/// Yields each live entry in on-disk order and stops (yielding nothing) at
/// the zero-length-name sentinel. Restartable: a fresh iterator from the
/// same block yields the same sequence.
#[derive(Debug)]
pub struct DirEntryIter<'a> {
    region: Region<'a>,
    offset: usize,
    done: bool,
}

impl Iterator for DirEntryIter<'_> {
    type Item = Result<BlockDirEntry, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match BlockDirEntry::parse(&self.region, self.offset) {
            Ok(entry) if entry.is_sentinel() => {
                self.done = true;
                None
            }
            Ok(entry) => {
                self.offset += entry.entry_size();
                Some(Ok(entry))
            }
            Err(ParseError::InsufficientData { .. }) => {
                // Ran past the block without seeing the sentinel.
                self.done = true;
                Some(Err(ParseError::InvalidField {
                    field: "dir_entry_stream",
                    reason: "no zero-length sentinel before end of block",
                }))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put_u32(buf: &mut [u8], off: usize, v: u32) {
        buf[off..off + 4].copy_from_slice(&v.to_be_bytes());
    }

    fn put_i64(buf: &mut [u8], off: usize, v: i64) {
        buf[off..off + 8].copy_from_slice(&v.to_be_bytes());
    }

    fn put_entry(buf: &mut [u8], off: usize, inode: i64, name: &[u8]) -> usize {
        put_i64(buf, off, inode);
        buf[off + 8] = u8::try_from(name.len()).unwrap();
        buf[off + 9..off + 9 + name.len()].copy_from_slice(name);
        off + ((name.len() + 12 + 7) & !7)
    }

    /// V5 directory block with two live entries and a sentinel.
    fn sample_block() -> Vec<u8> {
        let mut buf = vec![0_u8; 512];
        put_u32(&mut buf, 0, DIR3_BLOCK_MAGIC);
        put_u32(&mut buf, 4, 0xDEAD_BEEF);
        put_i64(&mut buf, 8, 7);
        put_i64(&mut buf, 16, 99);
        for (i, b) in buf[24..40].iter_mut().enumerate() {
            *b = u8::try_from(i).unwrap();
        }
        put_i64(&mut buf, 40, 1024);
        let off = put_entry(&mut buf, 64, 128, b"alpha");
        let off = put_entry(&mut buf, off, 129, b"seventy");
        // Sentinel: name length zero at the next slot (already zeroed).
        let _ = off;
        buf
    }

    #[test]
    fn header_metadata_accessors() {
        let buf = sample_block();
        let dir = BlockDirData::new(&buf, 0).unwrap();
        assert_eq!(dir.checksum().unwrap(), 0xDEAD_BEEF);
        assert_eq!(dir.block_number().unwrap(), 7);
        assert_eq!(dir.log_sequence_number().unwrap(), 99);
        assert_eq!(dir.parent_inode().unwrap(), 1024);
        assert_eq!(
            dir.uuid().unwrap(),
            "00010203-0405-0607-0809-0a0b0c0d0e0f"
        );
    }

    #[test]
    fn scan_stops_at_zero_length_sentinel() {
        let buf = sample_block();
        let dir = BlockDirData::new(&buf, 0).unwrap();
        let entries = dir.raw_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].inode, 128);
        assert_eq!(entries[0].name, b"alpha".to_vec());
        assert_eq!(entries[1].inode, 129);
        assert_eq!(entries[1].name, b"seventy".to_vec());
    }

    #[test]
    fn v4_magic_is_accepted() {
        let mut buf = sample_block();
        put_u32(&mut buf, 0, DIR2_BLOCK_MAGIC);
        let dir = BlockDirData::new(&buf, 0).unwrap();
        assert_eq!(dir.raw_entries().unwrap().len(), 2);
    }

    #[test]
    fn wrong_magic_fails_construction_with_ascii_signature() {
        let mut buf = sample_block();
        put_u32(&mut buf, 0, 0x4241_4421); // "BAD!"
        let err = BlockDirData::new(&buf, 0).unwrap_err();
        match err {
            ParseError::InvalidMagic {
                structure,
                signature,
            } => {
                assert_eq!(structure, "XFS block directory");
                assert_eq!(signature, "BAD!");
            }
            other => panic!("expected InvalidMagic, got {other:?}"),
        }
    }

    #[test]
    fn block_at_nonzero_base_offset() {
        let inner = sample_block();
        let mut buf = vec![0xFF_u8; 128];
        buf.extend_from_slice(&inner);
        let dir = BlockDirData::new(&buf, 128).unwrap();
        assert_eq!(dir.parent_inode().unwrap(), 1024);
        assert_eq!(dir.raw_entries().unwrap().len(), 2);
    }

    #[test]
    fn missing_sentinel_is_corruption_not_empty_result() {
        // Entries fill the block right up to its physical end, and the
        // trailing bytes are non-zero so no accidental sentinel appears.
        let mut buf = vec![0xAB_u8; 128];
        put_u32(&mut buf, 0, DIR3_BLOCK_MAGIC);
        let off = put_entry(&mut buf, 64, 128, b"alpha");
        buf[off..].fill(0xAB);
        let dir = BlockDirData::new(&buf, 0).unwrap();
        let err = dir.raw_entries().unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidField {
                field: "dir_entry_stream",
                ..
            }
        ));
    }

    #[test]
    fn iterator_stops_after_reporting_corruption() {
        let mut buf = vec![0xAB_u8; 96];
        put_u32(&mut buf, 0, DIR3_BLOCK_MAGIC);
        let dir = BlockDirData::new(&buf, 0).unwrap();
        let mut iter = dir.entries_iter();
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
    }

    #[test]
    fn rescan_yields_identical_sequence() {
        let buf = sample_block();
        let dir = BlockDirData::new(&buf, 0).unwrap();
        assert_eq!(dir.raw_entries().unwrap(), dir.raw_entries().unwrap());
    }

    #[test]
    fn entry_size_is_eight_byte_aligned() {
        let entry = BlockDirEntry {
            inode: 1,
            name: b"alpha".to_vec(),
        };
        assert_eq!(entry.entry_size(), 24);
        let entry = BlockDirEntry {
            inode: 1,
            name: b"abcd".to_vec(),
        };
        assert_eq!(entry.entry_size(), 16);
    }
}
