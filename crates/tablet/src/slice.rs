//! Non-owning byte views over a shared backing buffer.
//!
//! A [`Slice`] is an `(buffer, offset, length)` triple. Sub-views share the
//! same reference-counted allocation, so decoding a block hands out keys and
//! values without copying them. The one place a copy is unavoidable is a
//! prefix-compressed key: the shared prefix and the stored suffix live in
//! different places, so [`Slice::materialize`] builds a fresh buffer.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::error::{Result, TabletError};

#[derive(Clone)]
pub struct Slice {
    buf: Arc<[u8]>,
    offset: usize,
    len: usize,
}

impl Slice {
    /// Returns the sub-view `[start, start + len)` of this view.
    pub fn subslice(&self, start: usize, len: usize) -> Result<Slice> {
        let end = start.checked_add(len).filter(|&end| end <= self.len);
        match end {
            Some(_) => Ok(Slice {
                buf: Arc::clone(&self.buf),
                offset: self.offset + start,
                len,
            }),
            None => Err(TabletError::OutOfRange {
                what: "slice end",
                index: start.saturating_add(len),
                len: self.len,
            }),
        }
    }

    /// Returns the sub-view from `start` to the end of this view.
    pub fn tail(&self, start: usize) -> Result<Slice> {
        if start > self.len {
            return Err(TabletError::OutOfRange {
                what: "slice start",
                index: start,
                len: self.len,
            });
        }
        self.subslice(start, self.len - start)
    }

    /// Builds an owned key from `prefix` followed by `suffix`.
    #[must_use]
    pub fn materialize(prefix: &[u8], suffix: &[u8]) -> Slice {
        let mut key = Vec::with_capacity(prefix.len() + suffix.len());
        key.extend_from_slice(prefix);
        key.extend_from_slice(suffix);
        Slice::from(key)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[self.offset..self.offset + self.len]
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl Deref for Slice {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for Slice {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl From<Vec<u8>> for Slice {
    fn from(v: Vec<u8>) -> Self {
        let len = v.len();
        Slice {
            buf: Arc::from(v),
            offset: 0,
            len,
        }
    }
}

impl From<&[u8]> for Slice {
    fn from(v: &[u8]) -> Self {
        Slice::from(v.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Slice {
    fn from(v: &[u8; N]) -> Self {
        Slice::from(v.as_slice())
    }
}

impl From<&str> for Slice {
    fn from(v: &str) -> Self {
        Slice::from(v.as_bytes())
    }
}

impl PartialEq for Slice {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Slice {}

impl PartialEq<[u8]> for Slice {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl PartialOrd for Slice {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Slice {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl fmt::Debug for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slice({:?})", String::from_utf8_lossy(self.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subslice_shares_backing_bytes() {
        let s = Slice::from(b"hello world".to_vec());
        let w = s.subslice(6, 5).unwrap();
        assert_eq!(&*w, b"world");
        let r = w.subslice(2, 3).unwrap();
        assert_eq!(&*r, b"rld");
        assert_eq!(&*w.tail(5).unwrap(), b"");
    }

    #[test]
    fn subslice_out_of_bounds_is_range_error() {
        let s = Slice::from(b"abc".to_vec());
        assert!(matches!(
            s.subslice(2, 2),
            Err(TabletError::OutOfRange { .. })
        ));
        assert!(matches!(s.tail(4), Err(TabletError::OutOfRange { .. })));
        assert!(s.subslice(usize::MAX, 2).is_err());
    }

    #[test]
    fn ordering_is_lexicographic_bytes() {
        let a = Slice::from("ab");
        let b = Slice::from("abc");
        let c = Slice::from("b");
        assert!(a < b);
        assert!(b < c);
        assert_eq!(Slice::from("xab").tail(1).unwrap(), a);
    }

    #[test]
    fn materialize_joins_prefix_and_suffix() {
        let k = Slice::materialize(b"app", b"le");
        assert_eq!(&*k, b"apple");
        assert_eq!(&*Slice::materialize(b"", b""), b"");
    }
}
