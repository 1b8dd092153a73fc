//! Block encoding, decoding and search.
//!
//! ## Block layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ ENTRIES (prefix compressed)                                   │
//! │                                                              │
//! │ common (uint) | suffix (raw) | value (raw) or nil            │
//! │ ... repeated ...                                              │
//! ├──────────────────────────────────────────────────────────────┤
//! │ RESTARTS: offset (u32 BE) * N | N (u32 BE)                    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! `common` is the number of leading bytes the key shares with the previous
//! key in the block. Every `key_restart_interval`-th entry (starting with the
//! first) is a restart: it stores its key in full (`common == 0`) and its
//! position in the entry region is recorded in the trailer. Restart keys are
//! binary searched so a lookup only decodes entries from one restart on.
//!
//! ## Frame
//!
//! On disk each block is wrapped as
//! `checksum (u8, reserved) | type (u8) | length (uint) | payload`, where the
//! payload is the block, compressed according to `type`.

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use crate::codec;
use crate::compress::Compression;
use crate::error::{Result, TabletError};
use crate::pair::Pair;
use crate::search::try_search;
use crate::slice::Slice;

/// Size of one restart offset, and of the restart count.
const RESTART_BYTES: usize = 4;

/// Checksum byte written into every frame header. Readers ignore it.
const RESERVED_CHECKSUM: u8 = 0;

/// Accumulates prefix-compressed entries for one block.
pub struct BlockBuilder {
    buf: Vec<u8>,
    restarts: Vec<u32>,
    restart_interval: usize,
    counter: usize,
    last_key: Vec<u8>,
}

impl BlockBuilder {
    /// `restart_interval` of 0 is treated as 1.
    pub fn new(restart_interval: usize) -> Self {
        Self {
            buf: Vec::new(),
            restarts: Vec::new(),
            restart_interval: restart_interval.max(1),
            counter: 0,
            last_key: Vec::new(),
        }
    }

    /// Appends one entry. Keys must arrive in strictly increasing order;
    /// this is not checked.
    pub fn add(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        let common = if self.counter % self.restart_interval == 0 {
            let pos = u32::try_from(self.buf.len()).map_err(|_| {
                TabletError::validation("block entry region exceeds u32 offsets")
            })?;
            self.restarts.push(pos);
            0
        } else {
            shared_prefix_len(&self.last_key, key)
        };

        codec::write_uint(&mut self.buf, common as u64)?;
        codec::write_raw(&mut self.buf, &key[common..])?;
        match value {
            Some(v) => codec::write_raw(&mut self.buf, v)?,
            None => codec::write_nil(&mut self.buf)?,
        }

        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.counter += 1;
        Ok(())
    }

    /// Bytes of encoded entries so far, excluding the restart trailer.
    #[must_use]
    pub fn size(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counter == 0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counter
    }

    #[must_use]
    pub fn last_key(&self) -> &[u8] {
        &self.last_key
    }

    /// Appends the restart trailer and returns the finished block, leaving
    /// the builder empty and ready for the next block.
    pub fn finish(&mut self) -> Vec<u8> {
        let mut block = std::mem::take(&mut self.buf);
        block.reserve(RESTART_BYTES * (self.restarts.len() + 1));
        for &r in &self.restarts {
            block.extend_from_slice(&r.to_be_bytes());
        }
        block.extend_from_slice(&(self.restarts.len() as u32).to_be_bytes());

        self.restarts.clear();
        self.counter = 0;
        self.last_key.clear();
        block
    }
}

/// Length of the longest common prefix of `a` and `b`.
pub fn shared_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Encodes a whole run of sorted pairs into a single block.
pub fn encode_block<'a, I>(pairs: I, restart_interval: usize) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a Pair>,
{
    let mut builder = BlockBuilder::new(restart_interval);
    for pair in pairs {
        builder.add(&pair.key, pair.value_bytes())?;
    }
    Ok(builder.finish())
}

/// A decoded block: the entry region plus its restart trailer.
#[derive(Debug, Clone)]
pub struct Block {
    data: Slice,
    kvs: Slice,
    num_restarts: usize,
}

impl Block {
    /// Splits `data` into the entry region and restart trailer.
    pub fn decode(data: Slice) -> Result<Block> {
        let len = data.len();
        if len < RESTART_BYTES {
            return Err(TabletError::validation(format!(
                "block of {} bytes is too small for a restart count",
                len
            )));
        }
        let num_restarts = BigEndian::read_u32(&data[len - RESTART_BYTES..]) as usize;
        let trailer = num_restarts
            .checked_mul(RESTART_BYTES)
            .and_then(|t| t.checked_add(RESTART_BYTES))
            .filter(|&t| t <= len)
            .ok_or_else(|| {
                TabletError::validation(format!(
                    "block of {} bytes cannot hold {} restarts",
                    len, num_restarts
                ))
            })?;
        let kvs = data.subslice(0, len - trailer)?;
        Ok(Block {
            data,
            kvs,
            num_restarts,
        })
    }

    #[must_use]
    pub fn num_restarts(&self) -> usize {
        self.num_restarts
    }

    /// Position in the entry region of restart `n`.
    pub fn restart_value(&self, n: usize) -> Result<usize> {
        if n >= self.num_restarts {
            return Err(TabletError::OutOfRange {
                what: "restart",
                index: n,
                len: self.num_restarts,
            });
        }
        let at = self.kvs.len() + RESTART_BYTES * n;
        let pos = BigEndian::read_u32(&self.data[at..at + RESTART_BYTES]) as usize;
        if pos >= self.kvs.len() {
            return Err(TabletError::validation(format!(
                "restart {} points at {} past entry region of {} bytes",
                n,
                pos,
                self.kvs.len()
            )));
        }
        Ok(pos)
    }

    /// Full key stored at restart `n`.
    pub fn restart_key(&self, n: usize) -> Result<Slice> {
        let pos = self.restart_value(n)?;
        // A restart entry starts with a one-byte zero `common`.
        let mut cur = Cursor::new(self.kvs.as_bytes());
        cur.set_position(pos as u64 + 1);
        let key_len = codec::read_raw_len(&mut cur).map_err(|e| truncated(pos, e))?;
        self.kvs
            .subslice(cur.position() as usize, key_len)
            .map_err(|e| truncated(pos, e))
    }

    /// Every pair in the block, in order.
    #[must_use]
    pub fn iter(&self) -> BlockIter {
        self.scan_from(0, None)
    }

    /// Pairs with `key >= search_key`, in order. `None` or an empty key
    /// yields the whole block.
    pub fn iter_from(&self, search_key: Option<&[u8]>) -> Result<BlockIter> {
        let target = match search_key.filter(|k| !k.is_empty()) {
            Some(k) => k,
            None => return Ok(self.iter()),
        };
        if self.num_restarts <= 1 {
            return Ok(self.scan_from(0, Some(target)));
        }

        // First restart whose key is already past the target. The target can
        // only live in the run that starts at the restart before it.
        let i = try_search(self.num_restarts, |i| {
            Ok::<_, TabletError>(self.restart_key(i)?.as_bytes() > target)
        })?;
        let start = if i == 0 {
            0
        } else {
            self.restart_value(i - 1)?
        };
        Ok(self.scan_from(start, Some(target)))
    }

    fn scan_from(&self, pos: usize, skip_to: Option<&[u8]>) -> BlockIter {
        BlockIter {
            kvs: self.kvs.clone(),
            pos,
            prev_key: None,
            skip_to: skip_to.map(<[u8]>::to_vec),
            done: false,
        }
    }
}

fn truncated(pos: usize, e: TabletError) -> TabletError {
    match e {
        TabletError::Io(_) | TabletError::OutOfRange { .. } => {
            TabletError::validation(format!("block entry at {} is truncated", pos))
        }
        other => other,
    }
}

/// Forward-only cursor over a block's entries.
///
/// Yields `Err` at most once; the iterator is finished afterwards.
pub struct BlockIter {
    kvs: Slice,
    pos: usize,
    prev_key: Option<Slice>,
    skip_to: Option<Vec<u8>>,
    done: bool,
}

impl BlockIter {
    fn decode_entry(&mut self) -> Result<Pair> {
        let entry_start = self.pos;
        let mut cur = Cursor::new(self.kvs.as_bytes());
        cur.set_position(entry_start as u64);

        let common = codec::read_uint(&mut cur).map_err(|e| truncated(entry_start, e))? as usize;
        let suffix_len = codec::read_raw_len(&mut cur).map_err(|e| truncated(entry_start, e))?;
        let suffix = self
            .kvs
            .subslice(cur.position() as usize, suffix_len)
            .map_err(|e| truncated(entry_start, e))?;
        cur.set_position(cur.position() + suffix_len as u64);

        let key = if common == 0 {
            suffix
        } else {
            match &self.prev_key {
                Some(prev) if common <= prev.len() => Slice::materialize(&prev[..common], &suffix),
                _ => {
                    return Err(TabletError::validation(format!(
                        "entry at {} shares {} bytes with a shorter previous key",
                        entry_start, common
                    )))
                }
            }
        };

        let tag = cur.read_u8().map_err(|e| truncated(entry_start, e.into()))?;
        let value = if tag == codec::NIL {
            None
        } else {
            let len = codec::read_raw_len_with_tag(tag, &mut cur)
                .map_err(|e| truncated(entry_start, e))?;
            let value = self
                .kvs
                .subslice(cur.position() as usize, len)
                .map_err(|e| truncated(entry_start, e))?;
            cur.set_position(cur.position() + len as u64);
            Some(value)
        };

        self.pos = cur.position() as usize;
        self.prev_key = Some(key.clone());
        Ok(Pair { key, value })
    }
}

impl Iterator for BlockIter {
    type Item = Result<Pair>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done && self.pos < self.kvs.len() {
            let pair = match self.decode_entry() {
                Ok(p) => p,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            if let Some(target) = &self.skip_to {
                if pair.key.as_bytes() < target.as_slice() {
                    continue;
                }
                self.skip_to = None;
            }
            return Some(Ok(pair));
        }
        None
    }
}

/// Writes `block` as a frame, compressing it with `compression`. Returns the
/// number of bytes written, header included.
pub fn write_block_frame<W: Write>(
    w: &mut W,
    compression: Compression,
    block: &[u8],
) -> Result<u64> {
    let payload = compression.compress(block)?;
    let mut header = Vec::with_capacity(2 + codec::FIXED_U64_BYTES);
    header.write_u8(RESERVED_CHECKSUM)?;
    header.write_u8(compression.as_u8())?;
    codec::write_uint(&mut header, payload.len() as u64)?;
    w.write_all(&header)?;
    w.write_all(&payload)?;
    Ok((header.len() + payload.len()) as u64)
}

/// Reads and decodes the block frame starting at `offset`.
pub fn read_block<R: Read + Seek>(r: &mut R, offset: u64) -> Result<Block> {
    r.seek(SeekFrom::Start(offset))?;
    let _checksum = r.read_u8()?;
    let compression = Compression::from_u8(r.read_u8()?)?;
    let len = codec::read_uint(r)?;

    let mut payload = Vec::new();
    r.by_ref().take(len).read_to_end(&mut payload)?;
    if payload.len() as u64 != len {
        return Err(TabletError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!(
                "block at {} declares {} payload bytes, found {}",
                offset,
                len,
                payload.len()
            ),
        )));
    }

    let bytes = match compression {
        Compression::None => payload,
        // The frame does not record the decoded size; snappy's own preamble
        // is the only copy and the decoder checks it.
        c => c.decompress(&payload, None)?,
    };
    tracing::trace!(offset, ?compression, len = bytes.len(), "loaded block");
    Block::decode(Slice::from(bytes))
}
