//! Block compression framing.
//!
//! Each data block frame carries a one-byte compression type:
//!
//! - `0` ([`Compression::None`]): the payload is the block bytes verbatim.
//! - `1` ([`Compression::Snappy`]): the payload is the block run through the
//!   raw snappy block compressor. The decoded length is recorded in the
//!   snappy preamble, so the frame does not repeat it.

use crate::error::{Result, TabletError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Compression {
    #[default]
    None = 0,
    Snappy = 1,
}

impl Compression {
    /// Parses the compression type byte of a block frame.
    pub fn from_u8(b: u8) -> Result<Self> {
        match b {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Snappy),
            other => Err(TabletError::validation(format!(
                "unknown block compression type {}",
                other
            ))),
        }
    }

    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Snappy => snap::raw::Encoder::new()
                .compress_vec(data)
                .map_err(|e| TabletError::Compression(e.to_string())),
        }
    }

    /// Decodes `data`. When `expected_len` is given the decoded size must
    /// match it exactly.
    pub fn decompress(self, data: &[u8], expected_len: Option<usize>) -> Result<Vec<u8>> {
        let out = match self {
            Compression::None => data.to_vec(),
            Compression::Snappy => snap::raw::Decoder::new()
                .decompress_vec(data)
                .map_err(|e| TabletError::Compression(e.to_string()))?,
        };
        if let Some(expected) = expected_len {
            if out.len() != expected {
                return Err(TabletError::validation(format!(
                    "decoded block is {} bytes, expected {}",
                    out.len(),
                    expected
                )));
            }
        }
        Ok(out)
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::None => f.write_str("none"),
            Compression::Snappy => f.write_str("snappy"),
        }
    }
}

impl std::str::FromStr for Compression {
    type Err = TabletError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "raw" => Ok(Compression::None),
            "snappy" => Ok(Compression::Snappy),
            other => Err(TabletError::validation(format!(
                "unknown compression {:?} (expected none or snappy)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_byte_roundtrip() {
        assert_eq!(Compression::from_u8(0).unwrap(), Compression::None);
        assert_eq!(Compression::from_u8(1).unwrap(), Compression::Snappy);
        assert!(Compression::from_u8(2).unwrap_err().is_validation());
        assert_eq!(Compression::Snappy.as_u8(), 1);
    }

    #[test]
    fn display_parses_back() {
        for c in [Compression::None, Compression::Snappy] {
            assert_eq!(c.to_string().parse::<Compression>().unwrap(), c);
        }
    }

    #[test]
    fn snappy_shrinks_repetitive_blocks() {
        let data = vec![b'z'; 4096];
        let c = Compression::Snappy.compress(&data).unwrap();
        assert!(c.len() < data.len());
        assert_eq!(Compression::Snappy.decompress(&c, Some(4096)).unwrap(), data);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let c = Compression::Snappy.compress(b"abcdef").unwrap();
        assert!(Compression::Snappy
            .decompress(&c, Some(5))
            .unwrap_err()
            .is_validation());
        assert!(Compression::None.decompress(b"abc", Some(4)).is_err());
    }

    #[test]
    fn garbage_snappy_payload_fails() {
        let err = Compression::Snappy.decompress(&[0xff, 0xff, 0xff], None).unwrap_err();
        assert!(matches!(err, TabletError::Compression(_)));
    }

    #[test]
    fn parses_names() {
        assert_eq!("snappy".parse::<Compression>().unwrap(), Compression::Snappy);
        assert_eq!("NONE".parse::<Compression>().unwrap(), Compression::None);
        assert!("zstd".parse::<Compression>().is_err());
    }
}
