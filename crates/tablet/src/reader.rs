use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::block::{read_block, Block, BlockIter};
use crate::error::{Result, TabletError};
use crate::format::{
    decode_index, seek_index, Footer, IndexRecord, DATA_INDEX_MAGIC, FOOTER_BYTES,
    META_INDEX_MAGIC,
};
use crate::pair::Pair;

/// Reads a tablet for ordered scans and point lookups.
///
/// [`open`](TabletReader::open) loads the footer and both index regions into
/// memory. Data blocks are read on demand, one at a time, as a
/// [`TabletIter`] advances; a block's bytes are released once the iterator
/// moves past it and the pairs it yielded are dropped.
///
/// The byte source is kept for the lifetime of the reader, wrapped in a
/// `Mutex` so that `find` can be called through a shared `&self` reference.
/// Block loads seek the shared source, so concurrent scans on one reader
/// serialise on that lock.
pub struct TabletReader<R = BufReader<File>> {
    /// Path of the file, when opened from one (kept for diagnostics).
    path: Option<PathBuf>,
    source: Mutex<R>,
    footer: Footer,
    /// Every region the indexes name must end at or before this offset.
    footer_start: u64,
    meta_index: Vec<IndexRecord>,
    data_index: Vec<IndexRecord>,
}

impl TabletReader<BufReader<File>> {
    /// Opens a tablet file and loads its indexes.
    ///
    /// # Errors
    ///
    /// Returns [`TabletError::Validation`] if the file is too small, the
    /// footer magic is wrong, or an index region is out of bounds or carries
    /// the wrong magic. I/O failures are returned as [`TabletError::Io`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        let f = File::open(&path_buf)?;
        let mut reader = Self::from_source(BufReader::new(f))?;
        reader.path = Some(path_buf);
        Ok(reader)
    }
}

impl<R: Read + Seek> TabletReader<R> {
    /// Opens a tablet over any seekable byte source.
    pub fn from_source(mut source: R) -> Result<Self> {
        let filesize = source.seek(SeekFrom::End(0))?;
        if filesize < FOOTER_BYTES {
            return Err(TabletError::validation(format!(
                "{} bytes is too small for a tablet footer",
                filesize
            )));
        }

        let footer_start = filesize - FOOTER_BYTES;
        let footer_bytes = read_region(&mut source, footer_start, FOOTER_BYTES)?;
        let footer = Footer::decode(&footer_bytes)?;

        let meta_index = load_index(
            &mut source,
            footer.meta_index_offset,
            footer.meta_index_length,
            footer_start,
            META_INDEX_MAGIC,
        )?;
        let data_index = load_index(
            &mut source,
            footer.data_index_offset,
            footer.data_index_length,
            footer_start,
            DATA_INDEX_MAGIC,
        )?;

        tracing::debug!(
            filesize,
            data_blocks = data_index.len(),
            meta_blocks = meta_index.len(),
            "opened tablet"
        );

        Ok(Self {
            path: None,
            source: Mutex::new(source),
            footer,
            footer_start,
            meta_index,
            data_index,
        })
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn footer(&self) -> &Footer {
        &self.footer
    }

    #[must_use]
    pub fn data_index(&self) -> &[IndexRecord] {
        &self.data_index
    }

    #[must_use]
    pub fn meta_index(&self) -> &[IndexRecord] {
        &self.meta_index
    }

    #[must_use]
    pub fn block_count(&self) -> usize {
        self.data_index.len()
    }

    /// Returns `true` if the tablet holds no data blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data_index.is_empty()
    }

    /// Reads and decodes the block frame at `offset`.
    pub fn load_block(&self, offset: u64) -> Result<Block> {
        let mut src = self.lock()?;
        read_block(&mut *src, offset)
    }

    /// Every pair in the tablet, in key order.
    pub fn iter(&self) -> TabletIter<'_, R> {
        self.find(None)
    }

    /// Pairs with `key >= search_key`, in key order, across as many blocks
    /// as the caller consumes. `None` or an empty key starts at the first
    /// pair.
    ///
    /// Nothing is read until the iterator is first advanced.
    pub fn find(&self, search_key: Option<&[u8]>) -> TabletIter<'_, R> {
        let search_key = search_key.filter(|k| !k.is_empty());
        let next_block = match search_key {
            Some(k) => seek_index(&self.data_index, k),
            None => 0,
        };
        TabletIter {
            reader: self,
            next_block,
            current: None,
            search_key: search_key.map(<[u8]>::to_vec),
            done: false,
        }
    }

    /// Point lookup for a single key.
    ///
    /// Returns `Ok(Some(pair))` if the key is stored in this tablet (the pair
    /// may be a tombstone), `Ok(None)` otherwise.
    pub fn get(&self, key: &[u8]) -> Result<Option<Pair>> {
        match self.find(Some(key)).next() {
            Some(Ok(pair)) if pair.key.as_bytes() == key => Ok(Some(pair)),
            Some(Ok(_)) | None => Ok(None),
            Some(Err(e)) => Err(e),
        }
    }

    /// Returns the bytes of the auxiliary region named `name`, if the meta
    /// index lists one.
    pub fn meta_block(&self, name: &[u8]) -> Result<Option<Vec<u8>>> {
        let i = seek_index(&self.meta_index, name);
        let rec = match self.meta_index.get(i) {
            Some(rec) if rec.separator == name => rec,
            _ => return Ok(None),
        };
        let (offset, length) = (u64::from(rec.offset), u64::from(rec.length));
        check_region("meta block", offset, length, self.footer_start)?;
        let mut src = self.lock()?;
        let bytes = read_region(&mut *src, offset, length)?;
        Ok(Some(bytes))
    }

    fn lock(&self) -> Result<MutexGuard<'_, R>> {
        self.source
            .lock()
            .map_err(|e| TabletError::Io(io::Error::other(format!("lock poisoned: {}", e))))
    }
}

fn read_region<R: Read + Seek>(r: &mut R, offset: u64, length: u64) -> Result<Vec<u8>> {
    r.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::new();
    r.by_ref().take(length).read_to_end(&mut buf)?;
    if buf.len() as u64 != length {
        return Err(TabletError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("region at {} is shorter than {} bytes", offset, length),
        )));
    }
    Ok(buf)
}

fn check_region(what: &str, offset: u64, length: u64, limit: u64) -> Result<()> {
    let in_bounds = offset
        .checked_add(length)
        .is_some_and(|end| end <= limit);
    if !in_bounds {
        return Err(TabletError::validation(format!(
            "{} region {}+{} extends past footer at {}",
            what, offset, length, limit
        )));
    }
    Ok(())
}

fn load_index<R: Read + Seek>(
    r: &mut R,
    offset: u64,
    length: u64,
    limit: u64,
    magic: u32,
) -> Result<Vec<IndexRecord>> {
    check_region("index", offset, length, limit)?;
    let bytes = read_region(r, offset, length)?;
    decode_index(&bytes, magic)
}

/// Lazy scan over a tablet, block by block.
///
/// Holds the position in the data index and the decoder for the current
/// block. The search key applies to the first block only; every later block
/// is yielded whole. Dropping the iterator stops the scan without touching
/// any further blocks.
pub struct TabletIter<'a, R> {
    reader: &'a TabletReader<R>,
    next_block: usize,
    current: Option<BlockIter>,
    search_key: Option<Vec<u8>>,
    done: bool,
}

impl<'a, R: Read + Seek> Iterator for TabletIter<'a, R> {
    type Item = Result<Pair>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if let Some(block) = self.current.as_mut() {
                if let Some(item) = block.next() {
                    if item.is_err() {
                        self.done = true;
                    }
                    return Some(item);
                }
                self.current = None;
            }

            let rec = match self.reader.data_index.get(self.next_block) {
                Some(rec) => rec,
                None => {
                    self.done = true;
                    break;
                }
            };
            self.next_block += 1;

            let search_key = self.search_key.take();
            let opened = self
                .reader
                .load_block(u64::from(rec.offset))
                .and_then(|b| b.iter_from(search_key.as_deref()));
            match opened {
                Ok(it) => self.current = Some(it),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}
