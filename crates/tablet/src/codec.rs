//! Compact self-describing encoding for integers and byte strings.
//!
//! This is the big-endian MessagePack subset every variable-width field in a
//! tablet uses:
//!
//! ```text
//! uint:  0x00..=0x7f            positive fixint (value is the byte)
//!        0xcc u8 | 0xcd u16 | 0xce u32 | 0xcf u64
//! raw:   0xa0..=0xbf            fixraw, length in the low 5 bits
//!        0xda u16 len | 0xdb u32 len, followed by the bytes
//! nil:   0xc0
//! ```
//!
//! Writers always emit the shortest form, except [`write_u64_fixed`] which is
//! used by the footer to keep it a constant 40 bytes.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::error::{Result, TabletError};

pub const NIL: u8 = 0xc0;
pub const UINT8: u8 = 0xcc;
pub const UINT16: u8 = 0xcd;
pub const UINT32: u8 = 0xce;
pub const UINT64: u8 = 0xcf;
pub const FIXRAW: u8 = 0xa0;
pub const FIXRAW_MASK: u8 = 0xe0;
pub const RAW16: u8 = 0xda;
pub const RAW32: u8 = 0xdb;

/// Encoded size of a [`write_u64_fixed`] field.
pub const FIXED_U64_BYTES: usize = 9;

/// Writes `v` using the shortest unsigned integer form.
pub fn write_uint<W: Write>(w: &mut W, v: u64) -> io::Result<()> {
    if v <= 0x7f {
        w.write_u8(v as u8)
    } else if v <= u64::from(u8::MAX) {
        w.write_u8(UINT8)?;
        w.write_u8(v as u8)
    } else if v <= u64::from(u16::MAX) {
        w.write_u8(UINT16)?;
        w.write_u16::<BigEndian>(v as u16)
    } else if v <= u64::from(u32::MAX) {
        w.write_u8(UINT32)?;
        w.write_u32::<BigEndian>(v as u32)
    } else {
        write_u64_fixed(w, v)
    }
}

/// Writes `v` as a full 9-byte `uint64` regardless of its magnitude.
pub fn write_u64_fixed<W: Write>(w: &mut W, v: u64) -> io::Result<()> {
    w.write_u8(UINT64)?;
    w.write_u64::<BigEndian>(v)
}

/// Writes a length-prefixed raw byte string.
pub fn write_raw<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    let len = bytes.len();
    if len < 32 {
        w.write_u8(FIXRAW | len as u8)?;
    } else if len <= usize::from(u16::MAX) {
        w.write_u8(RAW16)?;
        w.write_u16::<BigEndian>(len as u16)?;
    } else if let Ok(len) = u32::try_from(len) {
        w.write_u8(RAW32)?;
        w.write_u32::<BigEndian>(len)?;
    } else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("raw value of {} bytes is too large to encode", len),
        ));
    }
    w.write_all(bytes)
}

pub fn write_nil<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_u8(NIL)
}

/// Reads an unsigned integer in any of its encoded widths.
pub fn read_uint<R: Read>(r: &mut R) -> Result<u64> {
    let tag = r.read_u8()?;
    read_uint_with_tag(tag, r)
}

/// Finishes reading an unsigned integer whose tag byte was already consumed.
pub fn read_uint_with_tag<R: Read>(tag: u8, r: &mut R) -> Result<u64> {
    match tag {
        0x00..=0x7f => Ok(u64::from(tag)),
        UINT8 => Ok(u64::from(r.read_u8()?)),
        UINT16 => Ok(u64::from(r.read_u16::<BigEndian>()?)),
        UINT32 => Ok(u64::from(r.read_u32::<BigEndian>()?)),
        UINT64 => Ok(r.read_u64::<BigEndian>()?),
        _ => Err(TabletError::validation(format!(
            "expected unsigned integer, found tag {:#04x}",
            tag
        ))),
    }
}

/// Reads an unsigned integer that must fit in a `u32`.
pub fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    let v = read_uint(r)?;
    u32::try_from(v)
        .map_err(|_| TabletError::validation(format!("integer {} does not fit in u32", v)))
}

/// Finishes reading a raw length whose tag byte was already consumed.
pub fn read_raw_len_with_tag<R: Read>(tag: u8, r: &mut R) -> Result<usize> {
    match tag {
        t if t & FIXRAW_MASK == FIXRAW => Ok(usize::from(t & !FIXRAW_MASK)),
        RAW16 => Ok(usize::from(r.read_u16::<BigEndian>()?)),
        RAW32 => Ok(r.read_u32::<BigEndian>()? as usize),
        _ => Err(TabletError::validation(format!(
            "expected raw length, found tag {:#04x}",
            tag
        ))),
    }
}

pub fn read_raw_len<R: Read>(r: &mut R) -> Result<usize> {
    let tag = r.read_u8()?;
    read_raw_len_with_tag(tag, r)
}

/// Reads a complete raw byte string into an owned buffer.
pub fn read_raw<R: Read>(r: &mut R) -> Result<Vec<u8>> {
    let len = read_raw_len(r)?;
    // The length comes from the input; only keep what is actually there.
    let mut buf = Vec::new();
    r.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(TabletError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("raw string declares {} bytes, found {}", len, buf.len()),
        )));
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn uint_bytes(v: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        write_uint(&mut buf, v).unwrap();
        buf
    }

    #[test]
    fn uint_uses_shortest_form() {
        assert_eq!(uint_bytes(0), vec![0]);
        assert_eq!(uint_bytes(127), vec![0x7f]);
        assert_eq!(uint_bytes(128), vec![UINT8, 0x80]);
        assert_eq!(uint_bytes(256), vec![UINT16, 1, 0]);
        assert_eq!(uint_bytes(70_000), vec![UINT32, 0, 1, 0x11, 0x70]);
        assert_eq!(uint_bytes(1 << 40).len(), FIXED_U64_BYTES);
    }

    #[test]
    fn fixed_u64_is_nine_bytes() {
        let mut buf = Vec::new();
        write_u64_fixed(&mut buf, 20).unwrap();
        assert_eq!(buf, vec![0xcf, 0, 0, 0, 0, 0, 0, 0, 20]);
        assert_eq!(read_uint(&mut Cursor::new(&buf)).unwrap(), 20);
    }

    #[test]
    fn uint_boundaries_decode() {
        for v in [0, 1, 127, 128, 255, 256, 65_535, 65_536, u64::from(u32::MAX), u64::MAX] {
            let buf = uint_bytes(v);
            assert_eq!(read_uint(&mut Cursor::new(&buf)).unwrap(), v, "value {}", v);
        }
    }

    #[test]
    fn raw_length_forms() {
        let mut buf = Vec::new();
        write_raw(&mut buf, b"bar").unwrap();
        assert_eq!(buf, vec![0xa3, b'b', b'a', b'r']);

        let long = vec![7u8; 40];
        let mut buf = Vec::new();
        write_raw(&mut buf, &long).unwrap();
        assert_eq!(&buf[..3], &[RAW16, 0, 40]);
        assert_eq!(read_raw(&mut Cursor::new(&buf)).unwrap(), long);

        let huge = vec![1u8; 70_000];
        let mut buf = Vec::new();
        write_raw(&mut buf, &huge).unwrap();
        assert_eq!(buf[0], RAW32);
        assert_eq!(read_raw(&mut Cursor::new(&buf)).unwrap().len(), 70_000);
    }

    #[test]
    fn wrong_tags_are_validation_errors() {
        assert!(read_uint(&mut Cursor::new(&[NIL])).unwrap_err().is_validation());
        assert!(read_raw_len(&mut Cursor::new(&[0x05u8])).unwrap_err().is_validation());
        let too_big = uint_bytes(u64::from(u32::MAX) + 1);
        assert!(read_u32(&mut Cursor::new(&too_big)).unwrap_err().is_validation());
    }

    #[test]
    fn truncated_input_is_io_error() {
        let err = read_raw(&mut Cursor::new(&[0xa3u8, 1])).unwrap_err();
        assert!(matches!(err, TabletError::Io(_)));
    }
}
