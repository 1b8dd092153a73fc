//! # Tablet - immutable sorted key/value files
//!
//! A tablet is a single write-once, read-many file of key/value pairs in
//! strictly increasing key order. The in-memory [`Pair`] buffer of a store is
//! flushed through [`TabletWriter`]; [`TabletReader`] serves ordered scans
//! starting from any key.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ DATA BLOCKS                                                   │
//! │                                                               │
//! │ checksum (u8, reserved) | type (u8: 0 raw, 1 snappy)          │
//! │ length (uint) | payload (prefix-compressed entries + restarts)│
//! │                                                               │
//! │ ... one frame per block ...                                   │
//! ├───────────────────────────────────────────────────────────────┤
//! │ META BLOCKS (optional auxiliary regions)                      │
//! ├───────────────────────────────────────────────────────────────┤
//! │ META INDEX   magic 0x0EA7DA7A | {offset, length, name}*       │
//! ├───────────────────────────────────────────────────────────────┤
//! │ DATA INDEX   magic 0xDA7ABA5E | {offset, length, last key}*   │
//! ├───────────────────────────────────────────────────────────────┤
//! │ FOOTER (always last 40 bytes)                                 │
//! │                                                               │
//! │ meta_index_offset | meta_index_length (0xcf u64 each)         │
//! │ data_index_offset | data_index_length (0xcf u64 each)         │
//! │ magic (u32 BE) 0x0B501E7E                                     │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Variable-width integers and byte strings use the compact tagged encoding
//! in [`codec`]. Fixed-width integers (magics, restart offsets) are big
//! endian.
//!
//! ## Example
//!
//! ```rust
//! use std::io::Cursor;
//! use tablet::{write_tablet, Pair, TabletReader, WriterOptions};
//!
//! let pairs = vec![Pair::put("apple", "red"), Pair::tombstone("banana")];
//! let mut buf = Vec::new();
//! write_tablet(&mut buf, pairs, WriterOptions::default()).unwrap();
//!
//! let reader = TabletReader::from_source(Cursor::new(buf)).unwrap();
//! let found = reader
//!     .find(Some(b"b".as_slice()))
//!     .collect::<tablet::Result<Vec<_>>>()
//!     .unwrap();
//! assert_eq!(found.len(), 1);
//! assert!(found[0].is_deleted());
//! ```

pub mod block;
pub mod codec;
mod compress;
mod error;
pub mod format;
mod pair;
mod reader;
pub mod search;
mod slice;
mod writer;

pub use compress::Compression;
pub use error::{Result, TabletError};
pub use format::{
    Footer, IndexRecord, DATA_INDEX_MAGIC, FOOTER_BYTES, META_INDEX_MAGIC, TABLET_MAGIC,
};
pub use pair::Pair;
pub use reader::{TabletIter, TabletReader};
pub use slice::Slice;
pub use writer::{
    write_tablet, TabletWriter, WriteSummary, WriterOptions, DEFAULT_BLOCK_SIZE,
    DEFAULT_KEY_RESTART_INTERVAL,
};

#[cfg(test)]
mod tests;
