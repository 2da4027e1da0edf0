//! Canonical 32-bit value hashes.
//!
//! Builder and reader both hash through these functions, so a key hashes
//! the same whether it is an owned value or a serialized one. Numbers hash
//! by mathematical value; vectors by their element hashes; sets and maps
//! independently of slot order. Map hashes cover keys only.

use xxhash_rust::xxh32::{xxh32, Xxh32};

use super::Number;

const SEED: u32 = 0x666c_766c;
const SPREAD: u32 = 0x9E37_79B1;

/// Hash of the empty value.
pub fn empty() -> u32 {
    xxh32(b"e", SEED)
}

/// Hash of a number (and of a bool as 0 or 1).
pub fn number(n: Number) -> u32 {
    let mut buf = [0u8; 17];
    match n.as_i128() {
        Some(v) => {
            buf[0] = b'i';
            buf[1..].copy_from_slice(&v.to_le_bytes());
            xxh32(&buf, SEED)
        }
        None => {
            let f = match n {
                Number::Float(f) if f.is_nan() => f32::NAN as f64,
                Number::Float(f) => f as f64,
                _ => unreachable!("integers always have an exact value"),
            };
            buf[0] = b'f';
            buf[1..9].copy_from_slice(&f.to_bits().to_le_bytes());
            xxh32(&buf[..9], SEED)
        }
    }
}

/// Hash of a boolean.
pub fn boolean(b: bool) -> u32 {
    number(Number::UInt(b as u64))
}

/// Hash of string bytes.
pub fn string(bytes: &[u8]) -> u32 {
    let mut h = Xxh32::new(SEED);
    h.update(b"s");
    h.update(bytes);
    h.digest()
}

/// Streaming hash of a vector's element hashes.
pub struct SeqHasher {
    inner: Xxh32,
    len: u32,
}

impl SeqHasher {
    /// Starts a vector hash.
    pub fn new() -> Self {
        let mut inner = Xxh32::new(SEED);
        inner.update(b"v");
        Self { inner, len: 0 }
    }

    /// Adds the next element hash.
    pub fn push(&mut self, item: u32) {
        self.inner.update(&item.to_le_bytes());
        self.len = self.len.wrapping_add(1);
    }

    /// Finishes the hash.
    pub fn finish(mut self) -> u32 {
        self.inner.update(&self.len.to_le_bytes());
        self.inner.digest()
    }
}

impl Default for SeqHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Order-independent hash of a set of element hashes (or map key hashes).
pub struct BagHasher {
    tag: u8,
    sum: u32,
    xor: u32,
    len: u32,
}

impl BagHasher {
    /// Starts a set hash.
    pub fn set() -> Self {
        Self::with_tag(b'S')
    }

    /// Starts a map hash.
    pub fn map() -> Self {
        Self::with_tag(b'M')
    }

    fn with_tag(tag: u8) -> Self {
        Self {
            tag,
            sum: 0,
            xor: 0,
            len: 0,
        }
    }

    /// Adds one member hash.
    pub fn push(&mut self, item: u32) {
        let spread = item.wrapping_mul(SPREAD).rotate_left(13);
        self.sum = self.sum.wrapping_add(spread);
        self.xor ^= item;
        self.len = self.len.wrapping_add(1);
    }

    /// Finishes the hash.
    pub fn finish(self) -> u32 {
        let mut buf = [0u8; 13];
        buf[0] = self.tag;
        buf[1..5].copy_from_slice(&self.len.to_le_bytes());
        buf[5..9].copy_from_slice(&self.sum.to_le_bytes());
        buf[9..13].copy_from_slice(&self.xor.to_le_bytes());
        xxh32(&buf, SEED)
    }
}
