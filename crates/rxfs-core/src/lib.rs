#![forbid(unsafe_code)]
//! Session seam and resolved directory entries.
//!
//! `rxfs-ondisk` decodes bytes; this crate pairs those decoders with the
//! owning filesystem session. The session knows the detected format
//! revision and how to resolve an inode number to inode metadata, so the
//! [`BlockDirectory`] here can turn raw directory entry records into
//! [`XfsEntry`] values usable by the rest of the driver.

use rxfs_ondisk::{BlockDirData, LeafAttrBlock, LeafAttribute};
use rxfs_types::{InodeNumber, ParseError, XfsVersion};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Unified error type for rxfs operations.
///
/// On-disk format violations arrive as [`ParseError`] from `rxfs-types`
/// and convert at this boundary; resolution failures get their own
/// variants. None of these are retried — binary layout corruption is not
/// transient.
#[derive(Debug, Error)]
pub enum RxfsError {
    /// On-disk format violation detected during byte parsing.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A directory entry referenced an inode the session cannot resolve.
    #[error("inode {0} not found")]
    UnresolvedInode(InodeNumber),

    /// A decoded field is structurally impossible.
    #[error("corrupt directory entry: {0}")]
    Corruption(&'static str),
}

pub type Result<T> = std::result::Result<T, RxfsError>;

/// Inode metadata produced by the session's inode table lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inode {
    pub number: InodeNumber,
    pub mode: u16,
    pub size: u64,
}

/// The owning filesystem session.
///
/// Passed explicitly to each decoder at construction so that decoders are
/// independently testable with fabricated sessions; never a process-wide
/// singleton.
pub trait XfsSession {
    /// Detected on-disk format revision.
    fn version(&self) -> XfsVersion;

    /// Resolve an inode number to its metadata.
    ///
    /// Failures propagate unchanged through entry enumeration; a directory
    /// entry is never silently skipped.
    fn inode(&self, number: InodeNumber) -> Result<Inode>;
}

/// Handle to the directory whose entries are being enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryHandle {
    pub inode: InodeNumber,
}

/// A resolved directory entry: inode metadata paired with its name.
///
/// `index` is dense and zero-based, reflecting enumeration order within
/// the block, not any on-disk index value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XfsEntry {
    pub inode: Inode,
    pub name: String,
    pub index: usize,
    pub parent: InodeNumber,
}

/// A block-format directory bound to its owning session.
///
/// Construction validates the block's magic; `entries()` scans the entry
/// stream and resolves every referenced inode through the session.
#[derive(Debug)]
pub struct BlockDirectory<'a, S: XfsSession> {
    raw: BlockDirData<'a>,
    session: &'a S,
}

impl<'a, S: XfsSession> BlockDirectory<'a, S> {
    /// Decode a directory block at `offset` within `data`.
    pub fn new(data: &'a [u8], offset: usize, session: &'a S) -> Result<Self> {
        Ok(Self {
            raw: BlockDirData::new(data, offset)?,
            session,
        })
    }

    /// Checksum of the directory block.
    pub fn checksum(&self) -> Result<u32> {
        Ok(self.raw.checksum()?)
    }

    /// Block number of this directory block.
    pub fn block_number(&self) -> Result<i64> {
        Ok(self.raw.block_number()?)
    }

    /// Log sequence number of the last write to this block.
    pub fn log_sequence_number(&self) -> Result<i64> {
        Ok(self.raw.log_sequence_number()?)
    }

    /// UUID of this block, canonical hyphenated form.
    pub fn uuid(&self) -> Result<String> {
        Ok(self.raw.uuid()?)
    }

    /// Inode number of the directory this block belongs to.
    pub fn parent_inode(&self) -> Result<i64> {
        Ok(self.raw.parent_inode()?)
    }

    /// Enumerate the block's entries in on-disk order.
    ///
    /// Each referenced inode is resolved through the session; resolution
    /// failures propagate unchanged. Indices are assigned densely from
    /// zero in enumeration order. The scan is recomputed on every call.
    pub fn entries(&self, parent: DirectoryHandle) -> Result<Vec<XfsEntry>> {
        let mut entries = Vec::new();
        for record in self.raw.entries_iter() {
            let record = record?;
            let number = u64::try_from(record.inode)
                .map_err(|_| RxfsError::Corruption("negative inode number"))?;
            let inode = self.session.inode(InodeNumber(number))?;
            entries.push(XfsEntry {
                inode,
                name: record.name_str(),
                index: entries.len(),
                parent: parent.inode,
            });
        }
        debug!(
            parent = %parent.inode,
            count = entries.len(),
            "enumerated block directory"
        );
        Ok(entries)
    }
}

/// Decode the leaf attribute block at `offset`, using the session's
/// detected revision for the offset layout.
pub fn leaf_attributes<S: XfsSession>(
    data: &[u8],
    offset: usize,
    session: &S,
) -> Result<Vec<LeafAttribute>> {
    let leaf = LeafAttrBlock::new(data, offset, session.version())?;
    let attributes = leaf.attributes()?;
    debug!(count = attributes.len(), "decoded leaf attribute block");
    Ok(attributes)
}
