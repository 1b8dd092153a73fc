//! Tablet trailer and index region encoding.
//!
//! ## File layout
//!
//! ```text
//! [data block frame]* [meta block]* [meta index] [data index] [footer]
//! ```
//!
//! ## Index region
//!
//! ```text
//! [magic: u32 BE] { [offset: uint] [length: uint] [separator: raw] }*
//! ```
//!
//! The meta index (`0x0EA7DA7A`) names auxiliary regions; the data index
//! (`0xDA7ABA5E`) maps each data block's last key to its frame.
//!
//! ## Footer (always the last 40 bytes)
//!
//! ```text
//! [meta_index_offset: 0xcf u64][meta_index_length: 0xcf u64]
//! [data_index_offset: 0xcf u64][data_index_length: 0xcf u64]
//! [magic: u32 BE = 0x0B501E7E]
//! ```

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Write};

use crate::codec;
use crate::error::{Result, TabletError};
use crate::search::search;

/// Magic number terminating every tablet file.
pub const TABLET_MAGIC: u32 = 0x0B50_1E7E;

/// Magic number opening the meta index region.
pub const META_INDEX_MAGIC: u32 = 0x0EA7_DA7A;

/// Magic number opening the data index region.
pub const DATA_INDEX_MAGIC: u32 = 0xDA7A_BA5E;

/// Size of the footer: four fixed-width `uint64`s and the magic.
pub const FOOTER_BYTES: u64 = 4 * codec::FIXED_U64_BYTES as u64 + 4;

/// Locations of the two index regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Footer {
    pub meta_index_offset: u64,
    pub meta_index_length: u64,
    pub data_index_offset: u64,
    pub data_index_length: u64,
}

impl Footer {
    pub fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        codec::write_u64_fixed(w, self.meta_index_offset)?;
        codec::write_u64_fixed(w, self.meta_index_length)?;
        codec::write_u64_fixed(w, self.data_index_offset)?;
        codec::write_u64_fixed(w, self.data_index_length)?;
        w.write_u32::<BigEndian>(TABLET_MAGIC)?;
        Ok(())
    }

    /// Parses a footer, rejecting it unless it ends in [`TABLET_MAGIC`].
    pub fn decode(bytes: &[u8]) -> Result<Footer> {
        let mut cur = Cursor::new(bytes);
        let footer = Footer {
            meta_index_offset: codec::read_uint(&mut cur)?,
            meta_index_length: codec::read_uint(&mut cur)?,
            data_index_offset: codec::read_uint(&mut cur)?,
            data_index_length: codec::read_uint(&mut cur)?,
        };
        let magic = cur.read_u32::<BigEndian>()?;
        if magic != TABLET_MAGIC {
            return Err(TabletError::validation(format!(
                "bad tablet magic {:#010x}",
                magic
            )));
        }
        Ok(footer)
    }
}

/// One entry of an index region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    pub offset: u32,
    pub length: u32,
    /// Last key of the block (data index) or region name (meta index).
    pub separator: Vec<u8>,
}

pub fn encode_index<W: Write>(w: &mut W, magic: u32, records: &[IndexRecord]) -> Result<()> {
    w.write_u32::<BigEndian>(magic)?;
    for rec in records {
        codec::write_uint(w, u64::from(rec.offset))?;
        codec::write_uint(w, u64::from(rec.length))?;
        codec::write_raw(w, &rec.separator)?;
    }
    Ok(())
}

/// Parses an index region, which must start with `expected_magic`.
pub fn decode_index(bytes: &[u8], expected_magic: u32) -> Result<Vec<IndexRecord>> {
    let mut cur = Cursor::new(bytes);
    let magic = cur.read_u32::<BigEndian>()?;
    if magic != expected_magic {
        return Err(TabletError::validation(format!(
            "bad index magic {:#010x}, expected {:#010x}",
            magic, expected_magic
        )));
    }

    let mut records = Vec::new();
    while (cur.position() as usize) < bytes.len() {
        let offset = codec::read_u32(&mut cur)?;
        let length = codec::read_u32(&mut cur)?;
        let separator = codec::read_raw(&mut cur)?;
        records.push(IndexRecord {
            offset,
            length,
            separator,
        });
    }
    Ok(records)
}

/// Position of the first record whose separator is `>= key`, or
/// `records.len()` if every separator is smaller.
pub fn seek_index(records: &[IndexRecord], key: &[u8]) -> usize {
    search(records.len(), |i| records[i].separator.as_slice() >= key)
}
