use std::io::Cursor;

use anyhow::Result;
use proptest::prelude::*;
use tempfile::tempdir;

use super::reader_tests::smallest_tablet;
use super::sample_pairs;
use crate::format::{decode_index, Footer};
use crate::*;

fn read_all(bytes: Vec<u8>) -> Vec<Pair> {
    let reader = TabletReader::from_source(Cursor::new(bytes)).unwrap();
    reader.iter().collect::<crate::Result<Vec<_>>>().unwrap()
}

#[test]
fn single_pair_matches_reference_bytes() -> Result<()> {
    let mut buf = Vec::new();
    let summary = write_tablet(
        &mut buf,
        vec![Pair::put(&[1u8, 2, 3], &[4u8, 5, 6])],
        WriterOptions::default(),
    )?;
    assert_eq!(buf, smallest_tablet());
    assert_eq!(
        summary,
        WriteSummary {
            pairs: 1,
            data_blocks: 1,
            bytes_written: buf.len() as u64
        }
    );
    Ok(())
}

#[test]
fn empty_input_writes_indexes_and_footer_only() -> Result<()> {
    let mut buf = Vec::new();
    let summary = write_tablet(&mut buf, Vec::new(), WriterOptions::default())?;
    assert_eq!(summary.data_blocks, 0);
    assert_eq!(buf.len() as u64, 4 + 4 + FOOTER_BYTES);

    let footer = Footer::decode(&buf[8..])?;
    assert_eq!(footer.meta_index_offset, 0);
    assert_eq!(footer.meta_index_length, 4);
    assert_eq!(footer.data_index_offset, 4);
    assert_eq!(footer.data_index_length, 4);
    assert!(read_all(buf).is_empty());
    Ok(())
}

#[test]
fn block_size_one_puts_each_pair_in_its_own_block() -> Result<()> {
    let pairs = sample_pairs(10, 3);
    let mut buf = Vec::new();
    let summary = write_tablet(
        &mut buf,
        pairs.clone(),
        WriterOptions::default().with_block_size(1),
    )?;
    assert_eq!(summary.data_blocks, 10);

    let reader = TabletReader::from_source(Cursor::new(buf))?;
    let separators: Vec<Vec<u8>> = reader
        .data_index()
        .iter()
        .map(|r| r.separator.clone())
        .collect();
    let keys: Vec<Vec<u8>> = pairs.iter().map(|p| p.key.to_vec()).collect();
    assert_eq!(separators, keys);
    Ok(())
}

#[test]
fn data_index_records_are_contiguous_frames() -> Result<()> {
    let pairs = sample_pairs(200, 0);
    let mut buf = Vec::new();
    write_tablet(
        &mut buf,
        pairs.clone(),
        WriterOptions::default()
            .with_block_size(256)
            .with_compression(Compression::Snappy),
    )?;
    let footer = Footer::decode(&buf[buf.len() - FOOTER_BYTES as usize..])?;
    let start = footer.data_index_offset as usize;
    let end = start + footer.data_index_length as usize;
    let index = decode_index(&buf[start..end], DATA_INDEX_MAGIC)?;

    assert!(index.len() > 1);
    assert_eq!(index[0].offset, 0);
    for w in index.windows(2) {
        assert_eq!(w[0].offset + w[0].length, w[1].offset);
        assert!(w[0].separator < w[1].separator);
    }
    let last = index.last().unwrap();
    assert_eq!(u64::from(last.offset + last.length), footer.meta_index_offset);
    assert_eq!(last.separator, pairs.last().unwrap().key.to_vec());
    Ok(())
}

#[test]
fn separator_is_last_key_of_block() -> Result<()> {
    let pairs = sample_pairs(100, 0);
    let mut buf = Vec::new();
    write_tablet(
        &mut buf,
        pairs,
        WriterOptions::default().with_block_size(128),
    )?;
    let reader = TabletReader::from_source(Cursor::new(buf))?;
    for rec in reader.data_index() {
        let block = reader.load_block(u64::from(rec.offset))?;
        let keys = block
            .iter()
            .map(|p| p.map(|p| p.key.to_vec()))
            .collect::<crate::Result<Vec<_>>>()?;
        assert_eq!(keys.last(), Some(&rec.separator));
    }
    Ok(())
}

#[test]
fn snappy_output_is_smaller_for_repetitive_values() -> Result<()> {
    let pairs: Vec<Pair> = (0..100)
        .map(|i| Pair::put(format!("k{:03}", i).as_str(), vec![b'x'; 200]))
        .collect();
    let mut raw = Vec::new();
    let mut snappy = Vec::new();
    write_tablet(&mut raw, pairs.clone(), WriterOptions::default())?;
    write_tablet(
        &mut snappy,
        pairs.clone(),
        WriterOptions::default().with_compression(Compression::Snappy),
    )?;
    assert!(snappy.len() < raw.len());
    assert_eq!(read_all(snappy), pairs);
    Ok(())
}

#[test]
fn zero_options_are_clamped() {
    let w = TabletWriter::new(
        WriterOptions::default()
            .with_block_size(0)
            .with_key_restart_interval(0),
    );
    assert_eq!(w.options().block_size, 1);
    assert_eq!(w.options().key_restart_interval, 1);

    let mut buf = Vec::new();
    w.write_tablet(&mut buf, sample_pairs(5, 2)).unwrap();
    assert_eq!(read_all(buf), sample_pairs(5, 2));
}

#[test]
fn write_to_path_is_atomic() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("out.tab");
    let pairs = sample_pairs(500, 9);

    let summary = TabletWriter::new(WriterOptions::default()).write_to_path(&path, pairs.clone())?;
    assert_eq!(summary.pairs, 500);
    assert_eq!(std::fs::metadata(&path)?.len(), summary.bytes_written);
    assert!(!dir.path().join("out.tab.tmp").exists());

    let reader = TabletReader::open(&path)?;
    let got = reader.iter().collect::<crate::Result<Vec<_>>>()?;
    assert_eq!(got, pairs);
    Ok(())
}

#[test]
fn write_to_path_in_missing_dir_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nope").join("out.tab");
    let err = TabletWriter::new(WriterOptions::default())
        .write_to_path(&path, sample_pairs(3, 0))
        .unwrap_err();
    assert!(matches!(err, TabletError::Io(_)));
    assert!(!path.exists());
}

#[test]
fn reconstructed_keys_are_byte_identical() {
    // long shared prefixes and keys that are prefixes of their successors
    let keys: Vec<Vec<u8>> = vec![
        b"a".to_vec(),
        b"aa".to_vec(),
        b"aaa".to_vec(),
        b"aab".to_vec(),
        vec![b'p'; 100],
        [vec![b'p'; 100], b"q".to_vec()].concat(),
        vec![0xff; 3],
    ];
    let pairs: Vec<Pair> = keys.iter().map(|k| Pair::put(k.as_slice(), "v")).collect();
    for interval in [1, 2, 16] {
        let mut buf = Vec::new();
        write_tablet(
            &mut buf,
            pairs.clone(),
            WriterOptions::default().with_key_restart_interval(interval),
        )
        .unwrap();
        let got: Vec<Vec<u8>> = read_all(buf).iter().map(|p| p.key.to_vec()).collect();
        assert_eq!(got, keys);
    }
}

fn arb_pairs() -> impl Strategy<Value = Vec<Pair>> {
    prop::collection::btree_map(
        prop::collection::vec(any::<u8>(), 1..24),
        prop::option::of(prop::collection::vec(any::<u8>(), 0..64)),
        0..150,
    )
    .prop_map(|m| {
        m.into_iter()
            .map(|(k, v)| match v {
                Some(v) => Pair::put(k, v),
                None => Pair::tombstone(k),
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn roundtrip_under_any_options(
        pairs in arb_pairs(),
        block_size in 1usize..512,
        snappy in any::<bool>(),
        interval in 1usize..20,
    ) {
        let compression = if snappy { Compression::Snappy } else { Compression::None };
        let opts = WriterOptions { block_size, compression, key_restart_interval: interval };
        let mut buf = Vec::new();
        write_tablet(&mut buf, pairs.clone(), opts).unwrap();
        prop_assert_eq!(read_all(buf), pairs);
    }

    #[test]
    fn find_yields_suffix_from_any_key(
        pairs in arb_pairs(),
        block_size in 1usize..256,
        start in prop::collection::vec(any::<u8>(), 0..24),
    ) {
        let options = WriterOptions::default()
            .with_block_size(block_size)
            .with_key_restart_interval(3);
        let mut buf = Vec::new();
        write_tablet(&mut buf, pairs.clone(), options).unwrap();
        let reader = TabletReader::from_source(Cursor::new(buf)).unwrap();
        let got = reader
            .find(Some(start.as_slice()))
            .collect::<crate::Result<Vec<_>>>()
            .unwrap();
        let expected: Vec<Pair> = pairs
            .into_iter()
            .filter(|p| p.key.as_bytes() >= start.as_slice())
            .collect();
        prop_assert_eq!(got, expected);
    }
}
