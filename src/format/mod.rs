#![forbid(unsafe_code)]
//! On-buffer layout: header, value cells and type tags.
//!
//! ```text
//! +--------+---------+------+-------+--------------+-----------+-------+---------+
//! | magic  | version | BOM  | flags | n_containers | root cell | crc32 | length  |
//! | 4      | 2       | 2    | 4     | 4            | 8         | 4     | 4       |
//! +--------+---------+------+-------+--------------+-----------+-------+---------+
//! ```
//!
//! Records follow the header. Every reference is a `u32` offset from the
//! first byte of the buffer, so a buffer stays valid at any load address.

use crate::primitives::bytes::le;
use crate::types::{Offset, ValidationError};
use crate::value::PrimKind;

/// Leading bytes of every buffer.
pub const MAGIC: [u8; 4] = *b"FLVL";
/// Current format version.
pub const VERSION: u16 = 1;
/// Byte-order mark as written.
pub const BYTE_ORDER_MARK: u16 = 0xFEFF;
/// Header length in bytes.
pub const HEADER_LEN: usize = 32;
/// Value cell length in bytes.
pub const CELL_LEN: usize = 8;
/// Header flag: the payload checksum field is populated.
pub const FLAG_CHECKSUM: u32 = 1;

/// Type tags stored in the first word of a cell.
pub mod tag {
    #![allow(missing_docs)]

    pub const EMPTY: u32 = 0;
    pub const BOOL: u32 = 1;
    pub const I8: u32 = 2;
    pub const U8: u32 = 3;
    pub const I16: u32 = 4;
    pub const U16: u32 = 5;
    pub const I32: u32 = 6;
    pub const U32: u32 = 7;
    pub const I64: u32 = 8;
    pub const U64: u32 = 9;
    pub const F32: u32 = 10;

    pub const STRING: u32 = 16;
    pub const BITVECTOR: u32 = 17;
    pub const BITVECTOR_ZEROS: u32 = 18;
    pub const BITVECTOR_ONES: u32 = 19;
    pub const BITVECTOR_ZEROS_ONES: u32 = 20;
    pub const BITVECTOR_ONES_ZEROS: u32 = 21;

    pub const VECTOR_EMPTY: u32 = 32;
    /// First primitive vector tag; the kind code is added to it.
    pub const VECTOR_PRIM_BASE: u32 = 33;
    pub const VECTOR_VALUE: u32 = 42;
    pub const VECTOR_VALUE_HASHABLE: u32 = 43;

    pub const MAP_EMPTY: u32 = 48;
    pub const MAP: u32 = 49;
    pub const SET_EMPTY: u32 = 50;
    pub const SET: u32 = 51;

    /// Marks an unused hash table slot.
    pub const UNUSED_SLOT: u32 = u32::MAX;
}

/// Cell tag of a primitive vector of `kind`.
pub const fn prim_vector_tag(kind: PrimKind) -> u32 {
    tag::VECTOR_PRIM_BASE + kind.code()
}

/// Primitive kind of a vector tag, if it is one.
pub fn prim_kind_of_tag(t: u32) -> Option<PrimKind> {
    t.checked_sub(tag::VECTOR_PRIM_BASE)
        .and_then(PrimKind::from_code)
}

/// Raw eight-byte value cell.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Cell {
    /// Type tag.
    pub tag: u32,
    /// Inline payload or record offset.
    pub data: u32,
}

impl Cell {
    /// Builds a cell.
    pub const fn new(tag: u32, data: u32) -> Self {
        Self { tag, data }
    }

    /// Reads the cell at `off`, if it fits in `buf`.
    pub fn read(buf: &[u8], off: usize) -> Option<Cell> {
        Some(Cell {
            tag: le::get_u32(buf, off)?,
            data: le::get_u32(buf, off.checked_add(4)?)?,
        })
    }

    /// Appends the cell.
    pub fn put(self, dst: &mut Vec<u8>) {
        le::put_u32(dst, self.tag);
        le::put_u32(dst, self.data);
    }

    /// Overwrites the cell at `off`.
    pub fn write_at(self, dst: &mut [u8], off: usize) {
        le::set_u32(dst, off, self.tag);
        le::set_u32(dst, off + 4, self.data);
    }

    /// Record offset carried in `data`.
    pub fn offset(self) -> Offset {
        Offset(self.data)
    }
}

/// Decoded buffer header.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Header {
    /// Format version.
    pub version: u16,
    /// Flag bits.
    pub flags: u32,
    /// Number of container ids handed out.
    pub n_containers: u32,
    /// Root value.
    pub root: Cell,
    /// CRC32 of the payload, or zero.
    pub checksum: u32,
    /// Declared total buffer length.
    pub total_len: u32,
}

impl Header {
    /// Parses and sanity-checks the header of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Header, ValidationError> {
        if buf.len() < HEADER_LEN {
            return Err(ValidationError::BadHeader("buffer shorter than header"));
        }
        if buf[0..4] != MAGIC {
            return Err(ValidationError::BadHeader("bad magic"));
        }
        let field = |off| le::get_u32(buf, off).unwrap_or_default();
        let version = le::get_u16(buf, 4).unwrap_or_default();
        let bom = le::get_u16(buf, 6).unwrap_or_default();
        if bom == BYTE_ORDER_MARK.swap_bytes() {
            return Err(ValidationError::BadHeader("foreign byte order"));
        }
        if bom != BYTE_ORDER_MARK {
            return Err(ValidationError::BadHeader("bad byte-order mark"));
        }
        if version != VERSION {
            return Err(ValidationError::BadHeader("unsupported version"));
        }
        let header = Header {
            version,
            flags: field(8),
            n_containers: field(12),
            root: Cell::new(field(16), field(20)),
            checksum: field(24),
            total_len: field(28),
        };
        if header.flags & !FLAG_CHECKSUM != 0 {
            return Err(ValidationError::BadHeader("unknown flags"));
        }
        if header.total_len as usize != buf.len() {
            return Err(ValidationError::BadHeader("declared length differs from buffer length"));
        }
        Ok(header)
    }

    /// Writes the header into the first [`HEADER_LEN`] bytes of `dst`.
    pub fn encode(&self, dst: &mut [u8]) {
        dst[0..4].copy_from_slice(&MAGIC);
        dst[4..6].copy_from_slice(&self.version.to_le_bytes());
        dst[6..8].copy_from_slice(&BYTE_ORDER_MARK.to_le_bytes());
        le::set_u32(dst, 8, self.flags);
        le::set_u32(dst, 12, self.n_containers);
        self.root.write_at(dst, 16);
        le::set_u32(dst, 24, self.checksum);
        le::set_u32(dst, 28, self.total_len);
    }

    /// True when the header carries a payload checksum.
    pub fn has_checksum(&self) -> bool {
        self.flags & FLAG_CHECKSUM != 0
    }
}

/// Byte size of a hash table record with `capacity` slots.
pub fn table_record_len(capacity: u32, is_map: bool) -> Option<usize> {
    let cells = if is_map { 2 } else { 1 };
    (capacity as usize)
        .checked_mul(4 + cells * CELL_LEN)?
        .checked_add(12)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Header {
        Header {
            version: VERSION,
            flags: FLAG_CHECKSUM,
            n_containers: 3,
            root: Cell::new(tag::MAP, 32),
            checksum: 0xDEAD_BEEF,
            total_len: 40,
        }
    }

    #[test]
    fn header_round_trips() {
        let mut buf = vec![0u8; 40];
        sample().encode(&mut buf);
        assert_eq!(Header::decode(&buf).unwrap(), sample());
    }

    #[test]
    fn rejects_foreign_byte_order_and_bad_magic() {
        let mut buf = vec![0u8; 40];
        sample().encode(&mut buf);
        buf.swap(6, 7);
        assert_eq!(
            Header::decode(&buf),
            Err(ValidationError::BadHeader("foreign byte order"))
        );
        sample().encode(&mut buf);
        buf[0] = b'X';
        assert!(Header::decode(&buf).is_err());
        assert!(Header::decode(&buf[..10]).is_err());
    }

    #[test]
    fn rejects_length_mismatch() {
        let mut buf = vec![0u8; 41];
        sample().encode(&mut buf);
        assert!(matches!(
            Header::decode(&buf),
            Err(ValidationError::BadHeader(_))
        ));
    }

    #[test]
    fn prim_tags_map_both_ways() {
        for kind in PrimKind::ALL {
            assert_eq!(prim_kind_of_tag(prim_vector_tag(kind)), Some(kind));
        }
        assert_eq!(prim_kind_of_tag(tag::VECTOR_VALUE), None);
        assert_eq!(prim_kind_of_tag(tag::STRING), None);
    }
}
