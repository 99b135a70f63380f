#![forbid(unsafe_code)]
//! On-disk format parsing for XFS out-of-line metadata blocks.
//!
//! Pure parsing crate — no I/O, no side effects. Decodes byte regions into
//! typed structures for block-format directories and leaf-format extended
//! attribute blocks. Callers read the raw block themselves and hand it in;
//! every enumeration is recomputed from the bytes on each call.

pub mod attr;
pub mod dir;

pub use attr::{AttrLeafEntry, LeafAttrBlock, LeafAttribute};
pub use dir::{BlockDirData, BlockDirEntry, DirEntryIter};
