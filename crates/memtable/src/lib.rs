//! # Memtable - the mutable write buffer
//!
//! Sorted in-memory map that collects writes before they are flushed to an
//! immutable tablet. Deletes are kept as tombstones so that a flush carries
//! them into the tablet, where they shadow older values in lower layers.
//!
//! [`Memtable::find`] yields [`Pair`]s in key order, which is exactly the
//! input [`tablet::TabletWriter`] expects.

use std::collections::BTreeMap;
use std::ops::Bound;

use tablet::Pair;

#[derive(Debug, Default)]
pub struct Memtable {
    /// `None` marks a tombstone.
    map: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    approx_size: usize,
}

impl Memtable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key`.
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.insert(key, Some(value));
    }

    /// Replace `key` with a tombstone.
    pub fn delete(&mut self, key: Vec<u8>) {
        self.insert(key, None);
    }

    fn insert(&mut self, key: Vec<u8>, value: Option<Vec<u8>>) {
        let key_len = key.len();
        let new_len = value.as_ref().map_or(0, Vec::len);
        match self.map.insert(key, value) {
            // key bytes were counted when the old entry went in
            Some(old) => {
                let old_len = old.map_or(0, |v| v.len());
                self.approx_size = (self.approx_size + new_len).saturating_sub(old_len);
            }
            None => self.approx_size += key_len + new_len,
        }
    }

    /// The live value for `key`; tombstones read as absent.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.map.get(key).and_then(|v| v.as_deref())
    }

    /// The stored entry for `key`, distinguishing a tombstone (`Some(None)`)
    /// from a key that was never written (`None`).
    pub fn get_entry(&self, key: &[u8]) -> Option<Option<&[u8]>> {
        self.map.get(key).map(|v| v.as_deref())
    }

    /// Ordered pairs with `key >= start` (all pairs for `None` or an empty
    /// key), tombstones included.
    pub fn find<'a>(&'a self, start: Option<&[u8]>) -> impl Iterator<Item = Pair> + 'a {
        let lower = match start {
            Some(k) if !k.is_empty() => Bound::Included(k.to_vec()),
            _ => Bound::Unbounded,
        };
        self.map
            .range((lower, Bound::Unbounded))
            .map(|(k, v)| match v {
                Some(v) => Pair::put(k.as_slice(), v.as_slice()),
                None => Pair::tombstone(k.as_slice()),
            })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Approximate bytes held: keys plus live values.
    pub fn approx_size(&self) -> usize {
        self.approx_size
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.approx_size = 0;
    }
}
