use crate::slice::Slice;

/// A key with either a value or a deletion marker.
///
/// `value == None` is a tombstone: the key was deleted and carries no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub key: Slice,
    pub value: Option<Slice>,
}

impl Pair {
    pub fn put(key: impl Into<Slice>, value: impl Into<Slice>) -> Self {
        Pair {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    pub fn tombstone(key: impl Into<Slice>) -> Self {
        Pair {
            key: key.into(),
            value: None,
        }
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.value.is_none()
    }

    #[must_use]
    pub fn value_bytes(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }
}
