use std::collections::BTreeMap;
use std::fs::{rename, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::block::{write_block_frame, BlockBuilder};
use crate::compress::Compression;
use crate::error::{Result, TabletError};
use crate::format::{
    encode_index, Footer, IndexRecord, DATA_INDEX_MAGIC, FOOTER_BYTES, META_INDEX_MAGIC,
};
use crate::pair::Pair;

/// Default target size of a block's entry region (4 KiB).
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Default number of entries between restart points.
pub const DEFAULT_KEY_RESTART_INTERVAL: usize = 16;

/// Layout knobs for [`TabletWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// A block is closed as soon as its encoded entries reach this size.
    pub block_size: usize,
    pub compression: Compression,
    /// Every `key_restart_interval`-th entry in a block stores its full key.
    pub key_restart_interval: usize,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            compression: Compression::None,
            key_restart_interval: DEFAULT_KEY_RESTART_INTERVAL,
        }
    }
}

impl WriterOptions {
    #[must_use]
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub fn with_key_restart_interval(mut self, interval: usize) -> Self {
        self.key_restart_interval = interval;
        self
    }
}

/// What a completed write produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteSummary {
    pub pairs: usize,
    pub data_blocks: usize,
    pub bytes_written: u64,
}

/// Streams sorted pairs into the tablet format.
///
/// The writer appends only: block offsets come from a running byte count,
/// and the indexes and footer are written once every data block is out.
pub struct TabletWriter {
    options: WriterOptions,
    meta_blocks: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl TabletWriter {
    /// Zero `block_size` or `key_restart_interval` are raised to 1.
    pub fn new(options: WriterOptions) -> Self {
        let options = WriterOptions {
            block_size: options.block_size.max(1),
            key_restart_interval: options.key_restart_interval.max(1),
            ..options
        };
        Self {
            options,
            meta_blocks: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Registers an auxiliary region, written after the data blocks and
    /// listed in the meta index under `name`. A later block with the same
    /// name replaces the earlier one.
    pub fn add_meta_block(&mut self, name: impl Into<Vec<u8>>, data: Vec<u8>) -> &mut Self {
        self.meta_blocks.insert(name.into(), data);
        self
    }

    /// Writes a complete tablet to `sink`.
    ///
    /// `pairs` must yield strictly increasing keys. This is not checked:
    /// unsorted or duplicate keys produce a tablet that scans incorrectly.
    pub fn write_tablet<W, I>(&self, sink: &mut W, pairs: I) -> Result<WriteSummary>
    where
        W: Write,
        I: IntoIterator<Item = Pair>,
    {
        let mut pos: u64 = 0;
        let mut summary = WriteSummary::default();
        let mut builder = BlockBuilder::new(self.options.key_restart_interval);
        let mut data_index: Vec<IndexRecord> = Vec::new();

        for pair in pairs {
            builder.add(&pair.key, pair.value_bytes())?;
            summary.pairs += 1;
            if builder.size() >= self.options.block_size {
                pos += self.flush_block(sink, &mut builder, pos, &mut data_index)?;
            }
        }
        if !builder.is_empty() {
            pos += self.flush_block(sink, &mut builder, pos, &mut data_index)?;
        }
        summary.data_blocks = data_index.len();

        let mut meta_index = Vec::with_capacity(self.meta_blocks.len());
        for (name, data) in &self.meta_blocks {
            sink.write_all(data)?;
            meta_index.push(IndexRecord {
                offset: to_u32(pos, "meta block offset")?,
                length: to_u32(data.len() as u64, "meta block length")?,
                separator: name.clone(),
            });
            pos += data.len() as u64;
        }

        let mut region = Vec::new();
        encode_index(&mut region, META_INDEX_MAGIC, &meta_index)?;
        let meta_index_offset = pos;
        let meta_index_length = region.len() as u64;
        sink.write_all(&region)?;
        pos += meta_index_length;

        region.clear();
        encode_index(&mut region, DATA_INDEX_MAGIC, &data_index)?;
        let data_index_offset = pos;
        let data_index_length = region.len() as u64;
        sink.write_all(&region)?;
        pos += data_index_length;

        Footer {
            meta_index_offset,
            meta_index_length,
            data_index_offset,
            data_index_length,
        }
        .encode(sink)?;
        pos += FOOTER_BYTES;
        sink.flush()?;

        summary.bytes_written = pos;
        tracing::debug!(
            pairs = summary.pairs,
            data_blocks = summary.data_blocks,
            bytes = summary.bytes_written,
            "wrote tablet"
        );
        Ok(summary)
    }

    /// Writes a tablet to `path`.
    ///
    /// # Crash Safety
    ///
    /// Writes to `path.tab.tmp`, calls `sync_all()`, then atomically renames.
    /// If the process crashes mid-write the temp file is left behind and the
    /// destination is untouched.
    pub fn write_to_path<I>(&self, path: &Path, pairs: I) -> Result<WriteSummary>
    where
        I: IntoIterator<Item = Pair>,
    {
        let tmp_path = path.with_extension("tab.tmp");
        let raw_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut file = BufWriter::new(raw_file);

        let summary = match self.write_tablet(&mut file, pairs) {
            Ok(s) => s,
            Err(e) => {
                drop(file);
                let _ = std::fs::remove_file(&tmp_path);
                return Err(e);
            }
        };

        file.into_inner()
            .map_err(|e| TabletError::Io(e.into_error()))?
            .sync_all()?;
        rename(&tmp_path, path)?;

        // Fsync the parent directory so the rename itself is durable.
        if let Some(parent) = path.parent() {
            if let Ok(dir) = std::fs::File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        Ok(summary)
    }

    fn flush_block<W: Write>(
        &self,
        sink: &mut W,
        builder: &mut BlockBuilder,
        pos: u64,
        index: &mut Vec<IndexRecord>,
    ) -> Result<u64> {
        let separator = builder.last_key().to_vec();
        let entries = builder.len();
        let block = builder.finish();
        let written = write_block_frame(sink, self.options.compression, &block)?;
        tracing::trace!(
            offset = pos,
            entries,
            raw = block.len(),
            framed = written,
            "flushed block"
        );
        index.push(IndexRecord {
            offset: to_u32(pos, "block offset")?,
            length: to_u32(written, "block length")?,
            separator,
        });
        Ok(written)
    }
}

/// Writes `pairs` to `sink` with `options` and no auxiliary regions.
pub fn write_tablet<W, I>(sink: &mut W, pairs: I, options: WriterOptions) -> Result<WriteSummary>
where
    W: Write,
    I: IntoIterator<Item = Pair>,
{
    TabletWriter::new(options).write_tablet(sink, pairs)
}

fn to_u32(v: u64, what: &str) -> Result<u32> {
    u32::try_from(v).map_err(|_| {
        TabletError::validation(format!("{} {} does not fit the index's u32 field", what, v))
    })
}
