#![forbid(unsafe_code)]
//! Little-endian field access and alignment helpers shared by the reader,
//! validator and writer.

pub mod le {
    //! Bounds-checked little-endian fixed-width reads and appending writes.

    use core::convert::TryInto;

    /// Returns `len` bytes at `off`, or `None` if any part lies outside `src`.
    #[inline]
    pub fn slice(src: &[u8], off: usize, len: usize) -> Option<&[u8]> {
        let end = off.checked_add(len)?;
        src.get(off..end)
    }

    /// Reads a u16 at `off`.
    #[inline]
    pub fn get_u16(src: &[u8], off: usize) -> Option<u16> {
        let bytes: [u8; 2] = slice(src, off, 2)?.try_into().ok()?;
        Some(u16::from_le_bytes(bytes))
    }

    /// Reads a u32 at `off`.
    #[inline]
    pub fn get_u32(src: &[u8], off: usize) -> Option<u32> {
        let bytes: [u8; 4] = slice(src, off, 4)?.try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }

    /// Reads a u64 at `off`.
    #[inline]
    pub fn get_u64(src: &[u8], off: usize) -> Option<u64> {
        let bytes: [u8; 8] = slice(src, off, 8)?.try_into().ok()?;
        Some(u64::from_le_bytes(bytes))
    }

    /// Appends a u32.
    #[inline]
    pub fn put_u32(dst: &mut Vec<u8>, v: u32) {
        dst.extend_from_slice(&v.to_le_bytes());
    }

    /// Appends a u64.
    #[inline]
    pub fn put_u64(dst: &mut Vec<u8>, v: u64) {
        dst.extend_from_slice(&v.to_le_bytes());
    }

    /// Overwrites a u32 at `off`; the caller guarantees the range exists.
    #[inline]
    pub fn set_u32(dst: &mut [u8], off: usize, v: u32) {
        dst[off..off + 4].copy_from_slice(&v.to_le_bytes());
    }
}

pub mod align {
    //! Padding helpers for record placement.

    /// Rounds `n` up to a multiple of `to` (a power of two).
    #[inline]
    pub fn up(n: usize, to: usize) -> usize {
        debug_assert!(to.is_power_of_two());
        (n + to - 1) & !(to - 1)
    }

    /// Zero-pads `dst` until its length is a multiple of `to`.
    pub fn pad(dst: &mut Vec<u8>, to: usize) {
        let target = up(dst.len(), to);
        dst.resize(target, 0);
    }
}
