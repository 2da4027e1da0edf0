#![forbid(unsafe_code)]
//! Packed boolean sequences.
//!
//! Bit `i` lives in byte `i / 8` at position `i % 8` (least significant
//! first). Hashes are a function of `(n_bits, packed bytes)` only, with
//! padding bits cleared, so an owned [`BitVector`] and a buffer-backed
//! [`BitView`] of the same bits hash identically. The packed bytes are fed
//! to the hasher as maximal runs of equal bytes, which lets the constant
//! encodings hash in constant time.

use std::cmp::Ordering;
use std::fmt;

use xxhash_rust::xxh32::Xxh32;
use xxhash_rust::xxh64::Xxh64;

use crate::primitives::dynarray::next_capacity;
use crate::primitives::export::{ExportGuard, Exports};
use crate::types::{FlatError, Result};

const HASH_SEED_32: u32 = 0x6276_6563;
const HASH_SEED_64: u64 = 0x6269_7476_6563_7472;

/// Number of bytes holding `n_bits` packed bits.
pub const fn bytes_for(n_bits: u32) -> usize {
    (n_bits as usize).div_ceil(8)
}

/// Read access shared by every bit vector representation.
pub trait BitSource {
    /// Number of bits.
    fn n_bits(&self) -> u32;

    /// Bit `i`; `i` must be below [`BitSource::n_bits`].
    fn bit(&self, i: u32) -> bool;

    /// Packed byte `k` with bits past the end cleared.
    fn packed_byte(&self, k: u32) -> u8 {
        let start = k * 8;
        let end = self.n_bits().min(start.saturating_add(8));
        (start..end).fold(0u8, |acc, i| acc | ((self.bit(i) as u8) << (i - start)))
    }

    /// Calls `f(byte, count)` for consecutive stretches of equal packed
    /// bytes, in order. Stretches need not be maximal.
    fn byte_runs(&self, f: &mut dyn FnMut(u8, u32)) {
        for k in 0..bytes_for(self.n_bits()) as u32 {
            f(self.packed_byte(k), 1);
        }
    }

    /// Number of set bits.
    fn count_ones(&self) -> u64 {
        (0..bytes_for(self.n_bits()) as u32)
            .map(|k| self.packed_byte(k).count_ones() as u64)
            .sum()
    }
}

fn feed<S: BitSource + ?Sized>(src: &S, mut sink: impl FnMut(&[u8])) {
    sink(&src.n_bits().to_le_bytes());
    let mut emit = |byte: u8, count: u32| {
        let mut run = [byte; 5];
        run[1..].copy_from_slice(&count.to_le_bytes());
        sink(&run);
    };
    let mut pending: Option<(u8, u32)> = None;
    src.byte_runs(&mut |byte, count| {
        if let Some((b, c)) = pending.as_mut() {
            if *b == byte {
                *c += count;
                return;
            }
        }
        if let Some((b, c)) = pending.replace((byte, count)) {
            emit(b, c);
        }
    });
    if let Some((b, c)) = pending {
        emit(b, c);
    }
}

/// Runs of a two-segment vector: `first` bits equal to `first_bit`, then
/// `second` bits of the opposite value.
fn segment_runs<S: BitSource + ?Sized>(
    src: &S,
    first_bit: bool,
    first: u32,
    second: u32,
    f: &mut dyn FnMut(u8, u32),
) {
    let fill = |bit: bool| if bit { 0xFF } else { 0x00 };
    let n_bits = first.saturating_add(second);
    let n_bytes = bytes_for(n_bits) as u32;
    let mut k = first / 8;
    if k > 0 {
        f(fill(first_bit), k);
    }
    if first % 8 != 0 && k < n_bytes {
        f(src.packed_byte(k), 1);
        k += 1;
    }
    let full = n_bits / 8;
    if full > k {
        f(fill(!first_bit), full - k);
        k = full;
    }
    if k < n_bytes {
        f(src.packed_byte(k), 1);
    }
}

/// Packed byte `k` of an `n_bits` vector whose bits `set_from..set_to` are
/// set and all others clear.
fn run_byte(k: u32, n_bits: u32, set_from: u32, set_to: u64) -> u8 {
    let start = k as u64 * 8;
    let end = (n_bits as u64).min(start + 8);
    let lo = (set_from as u64).max(start);
    let hi = set_to.min(end);
    if lo >= hi {
        return 0;
    }
    let mask = ((1u16 << (hi - lo)) - 1) as u8;
    mask << (lo - start)
}

/// 32-bit hash of the logical bits.
pub fn hash_32<S: BitSource + ?Sized>(src: &S) -> u32 {
    let mut h = Xxh32::new(HASH_SEED_32);
    feed(src, |b| h.update(b));
    h.digest()
}

/// 64-bit hash of the logical bits.
pub fn hash_64<S: BitSource + ?Sized>(src: &S) -> u64 {
    let mut h = Xxh64::new(HASH_SEED_64);
    feed(src, |b| h.update(b));
    h.digest()
}

/// Lexicographic over common bits, then by length.
pub fn compare<A, B>(a: &A, b: &B) -> Ordering
where
    A: BitSource + ?Sized,
    B: BitSource + ?Sized,
{
    let common = a.n_bits().min(b.n_bits());
    let full = common / 8;
    let tail = common % 8;
    let first_diff = |x: u8, y: u8| {
        let j = (x ^ y).trailing_zeros();
        if (x >> j) & 1 == 0 {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    };
    for k in 0..full {
        let (x, y) = (a.packed_byte(k), b.packed_byte(k));
        if x != y {
            return first_diff(x, y);
        }
    }
    if tail > 0 {
        let mask = (1u8 << tail) - 1;
        let (x, y) = (a.packed_byte(full) & mask, b.packed_byte(full) & mask);
        if x != y {
            return first_diff(x, y);
        }
    }
    a.n_bits().cmp(&b.n_bits())
}

/// Exact equality: same length and same bits.
pub fn bits_eq<A, B>(a: &A, b: &B) -> bool
where
    A: BitSource + ?Sized,
    B: BitSource + ?Sized,
{
    a.n_bits() == b.n_bits()
        && (0..bytes_for(a.n_bits()) as u32).all(|k| a.packed_byte(k) == b.packed_byte(k))
}

/// Iterator over the bits of any [`BitSource`].
pub struct Iter<'a, S: ?Sized> {
    src: &'a S,
    pos: u32,
    end: u32,
}

/// Iterates the bits of `src` in order.
pub fn iter<S: BitSource + ?Sized>(src: &S) -> Iter<'_, S> {
    Iter {
        src,
        pos: 0,
        end: src.n_bits(),
    }
}

impl<S: BitSource + ?Sized> Iterator for Iter<'_, S> {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        if self.pos >= self.end {
            return None;
        }
        let bit = self.src.bit(self.pos);
        self.pos += 1;
        Some(bit)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.end - self.pos) as usize;
        (n, Some(n))
    }
}

impl<S: BitSource + ?Sized> ExactSizeIterator for Iter<'_, S> {}

/// Growable, owned bit vector with a cached count of set bits.
#[derive(Clone, Default)]
pub struct BitVector {
    data: Vec<u8>,
    n_bits: u32,
    n_ones: u32,
    exports: Exports,
}

impl BitVector {
    /// Creates an empty vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `n` zero bits.
    pub fn zeros(n: u32) -> Result<Self> {
        let mut v = Self::new();
        v.extend_false(n)?;
        Ok(v)
    }

    /// Creates a vector from a bool sequence.
    pub fn from_bools<I: IntoIterator<Item = bool>>(bits: I) -> Result<Self> {
        let mut v = Self::new();
        for bit in bits {
            v.append(bit)?;
        }
        Ok(v)
    }

    /// Number of bits.
    pub fn len(&self) -> u32 {
        self.n_bits
    }

    /// True when there are no bits.
    pub fn is_empty(&self) -> bool {
        self.n_bits == 0
    }

    /// Number of set bits.
    pub fn n_ones(&self) -> u32 {
        self.n_ones
    }

    /// True if any bit is set.
    pub fn is_any_set(&self) -> bool {
        self.n_ones > 0
    }

    /// Bit `i`.
    pub fn is_set(&self, i: u32) -> Result<bool> {
        self.check_index(i)?;
        Ok(self.bit(i))
    }

    /// Sets bit `i`.
    pub fn set(&mut self, i: u32) -> Result<()> {
        self.assign(i, true)
    }

    /// Clears bit `i`.
    pub fn reset(&mut self, i: u32) -> Result<()> {
        self.assign(i, false)
    }

    /// Writes `value` into bit `i`.
    pub fn assign(&mut self, i: u32, value: bool) -> Result<()> {
        self.check_index(i)?;
        let was = self.bit(i);
        if was == value {
            return Ok(());
        }
        let byte = &mut self.data[(i / 8) as usize];
        if value {
            *byte |= 1 << (i % 8);
            self.n_ones += 1;
        } else {
            *byte &= !(1 << (i % 8));
            self.n_ones -= 1;
        }
        Ok(())
    }

    /// Appends one bit.
    pub fn append(&mut self, value: bool) -> Result<()> {
        self.extend(1, value)
    }

    /// Appends `n` copies of `value`. On failure the vector is unchanged.
    pub fn extend(&mut self, n: u32, value: bool) -> Result<()> {
        self.exports.check_resize()?;
        let new_len = self
            .n_bits
            .checked_add(n)
            .ok_or(FlatError::Capacity("bit vector would exceed 2**32-1 bits"))?;
        let needed = bytes_for(new_len);
        self.reserve_bytes(needed)?;
        self.data.resize(needed, 0);
        if value {
            for i in self.n_bits..new_len {
                self.data[(i / 8) as usize] |= 1 << (i % 8);
            }
            self.n_ones += n;
        }
        self.n_bits = new_len;
        Ok(())
    }

    /// Appends `n` set bits.
    pub fn extend_true(&mut self, n: u32) -> Result<()> {
        self.extend(n, true)
    }

    /// Appends `n` clear bits.
    pub fn extend_false(&mut self, n: u32) -> Result<()> {
        self.extend(n, false)
    }

    /// Removes and returns the last bit.
    pub fn pop(&mut self) -> Result<bool> {
        self.exports.check_resize()?;
        if self.n_bits == 0 {
            return Err(FlatError::bounds(0u32, 0u32));
        }
        let i = self.n_bits - 1;
        let bit = self.bit(i);
        if bit {
            self.data[(i / 8) as usize] &= !(1 << (i % 8));
            self.n_ones -= 1;
        }
        self.n_bits = i;
        self.data.truncate(bytes_for(i));
        Ok(bit)
    }

    /// Packed bytes; padding bits are zero.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Bytes reserved on the heap.
    pub fn heap_bytes(&self) -> usize {
        self.data.capacity()
    }

    /// Registers a zero-copy view of [`BitVector::as_bytes`].
    pub fn export(&self) -> ExportGuard {
        self.exports.acquire()
    }

    /// Iterates the bits.
    pub fn iter(&self) -> Iter<'_, Self> {
        iter(self)
    }

    /// 32-bit hash.
    pub fn hash_32(&self) -> u32 {
        hash_32(self)
    }

    /// 64-bit hash.
    pub fn hash_64(&self) -> u64 {
        hash_64(self)
    }

    fn check_index(&self, i: u32) -> Result<()> {
        if i >= self.n_bits {
            return Err(FlatError::bounds(i, self.n_bits));
        }
        Ok(())
    }

    fn reserve_bytes(&mut self, needed: usize) -> Result<()> {
        if needed <= self.data.capacity() {
            return Ok(());
        }
        let mut target = self.data.capacity();
        while target < needed {
            target = next_capacity(target).unwrap_or(needed).max(target + 1);
        }
        self.data
            .try_reserve_exact(target - self.data.len())
            .map_err(|_| FlatError::Allocation)
    }
}

impl BitSource for BitVector {
    fn n_bits(&self) -> u32 {
        self.n_bits
    }

    fn bit(&self, i: u32) -> bool {
        (self.data[(i / 8) as usize] >> (i % 8)) & 1 == 1
    }

    fn packed_byte(&self, k: u32) -> u8 {
        self.data[k as usize]
    }

    fn count_ones(&self) -> u64 {
        self.n_ones as u64
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BitVector(")?;
        for bit in self.iter() {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        f.write_str(")")
    }
}

impl PartialEq for BitVector {
    fn eq(&self, other: &Self) -> bool {
        bits_eq(self, other)
    }
}

impl Eq for BitVector {}

impl PartialOrd for BitVector {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BitVector {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self, other)
    }
}

/// Read-only bit vector backed by serialized bytes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BitView<'a> {
    /// Packed bits; `bytes` holds at least `bytes_for(n_bits)` bytes.
    Packed {
        /// Number of bits.
        n_bits: u32,
        /// Packed bytes.
        bytes: &'a [u8],
    },
    /// `n` clear bits.
    Zeros(u32),
    /// `n` set bits.
    Ones(u32),
    /// Clear bits followed by set bits.
    ZerosOnes(u32, u32),
    /// Set bits followed by clear bits.
    OnesZeros(u32, u32),
}

impl BitView<'_> {
    /// True if any bit is set.
    pub fn is_any_set(&self) -> bool {
        match *self {
            BitView::Packed { .. } => self.count_ones() > 0,
            BitView::Zeros(_) => false,
            BitView::Ones(n) => n > 0,
            BitView::ZerosOnes(_, ones) | BitView::OnesZeros(ones, _) => ones > 0,
        }
    }

    /// Bit `i`.
    pub fn is_set(&self, i: u32) -> Result<bool> {
        if i >= self.n_bits() {
            return Err(FlatError::bounds(i, self.n_bits()));
        }
        Ok(self.bit(i))
    }

    /// Copies the bits into an owned vector.
    pub fn to_owned(&self) -> Result<BitVector> {
        BitVector::from_bools(iter(self))
    }
}

impl BitSource for BitView<'_> {
    fn n_bits(&self) -> u32 {
        match *self {
            BitView::Packed { n_bits, .. } => n_bits,
            BitView::Zeros(n) | BitView::Ones(n) => n,
            BitView::ZerosOnes(a, b) | BitView::OnesZeros(a, b) => a.saturating_add(b),
        }
    }

    fn bit(&self, i: u32) -> bool {
        match *self {
            BitView::Packed { bytes, .. } => (bytes[(i / 8) as usize] >> (i % 8)) & 1 == 1,
            BitView::Zeros(_) => false,
            BitView::Ones(_) => true,
            BitView::ZerosOnes(zeros, _) => i >= zeros,
            BitView::OnesZeros(ones, _) => i < ones,
        }
    }

    fn packed_byte(&self, k: u32) -> u8 {
        match *self {
            BitView::Packed { n_bits, bytes } => {
                let byte = bytes[k as usize];
                let end = k as u64 * 8 + 8;
                if end > n_bits as u64 {
                    byte & ((1u16 << (n_bits % 8)) - 1) as u8
                } else {
                    byte
                }
            }
            BitView::Zeros(_) => 0,
            BitView::Ones(n) => run_byte(k, n, 0, n as u64),
            BitView::ZerosOnes(zeros, ones) => {
                run_byte(k, self.n_bits(), zeros, zeros as u64 + ones as u64)
            }
            BitView::OnesZeros(ones, _) => run_byte(k, self.n_bits(), 0, ones as u64),
        }
    }

    fn byte_runs(&self, f: &mut dyn FnMut(u8, u32)) {
        match *self {
            BitView::Packed { n_bits, .. } => {
                for k in 0..bytes_for(n_bits) as u32 {
                    f(self.packed_byte(k), 1);
                }
            }
            BitView::Zeros(n) => segment_runs(self, false, n, 0, f),
            BitView::Ones(n) => segment_runs(self, true, n, 0, f),
            BitView::ZerosOnes(zeros, ones) => segment_runs(self, false, zeros, ones, f),
            BitView::OnesZeros(ones, zeros) => segment_runs(self, true, ones, zeros, f),
        }
    }
}

/// An owned or buffer-backed bit vector behind one interface.
#[derive(Clone, Debug)]
pub enum Bits<'a> {
    /// Builder-side vector; mutable.
    Owned(BitVector),
    /// View into a validated buffer; read-only.
    Mapped(BitView<'a>),
}

impl Bits<'_> {
    /// Number of bits.
    pub fn len(&self) -> u32 {
        self.n_bits()
    }

    /// True when there are no bits.
    pub fn is_empty(&self) -> bool {
        self.n_bits() == 0
    }

    /// Bit `i`.
    pub fn is_set(&self, i: u32) -> Result<bool> {
        match self {
            Bits::Owned(v) => v.is_set(i),
            Bits::Mapped(v) => v.is_set(i),
        }
    }

    /// True if any bit is set.
    pub fn is_any_set(&self) -> bool {
        match self {
            Bits::Owned(v) => v.is_any_set(),
            Bits::Mapped(v) => v.is_any_set(),
        }
    }

    /// True when backed by a serialized buffer.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Bits::Mapped(_))
    }

    /// Sets bit `i`.
    pub fn set(&mut self, i: u32) -> Result<()> {
        self.owned_mut()?.set(i)
    }

    /// Clears bit `i`.
    pub fn reset(&mut self, i: u32) -> Result<()> {
        self.owned_mut()?.reset(i)
    }

    /// Appends one bit.
    pub fn append(&mut self, value: bool) -> Result<()> {
        self.owned_mut()?.append(value)
    }

    /// Appends `n` copies of `value`.
    pub fn extend(&mut self, n: u32, value: bool) -> Result<()> {
        self.owned_mut()?.extend(n, value)
    }

    /// Removes and returns the last bit.
    pub fn pop(&mut self) -> Result<bool> {
        self.owned_mut()?.pop()
    }

    /// 32-bit hash.
    pub fn hash_32(&self) -> u32 {
        hash_32(self)
    }

    /// 64-bit hash.
    pub fn hash_64(&self) -> u64 {
        hash_64(self)
    }

    /// Iterates the bits.
    pub fn iter(&self) -> Iter<'_, Self> {
        iter(self)
    }

    fn owned_mut(&mut self) -> Result<&mut BitVector> {
        match self {
            Bits::Owned(v) => Ok(v),
            Bits::Mapped(_) => Err(FlatError::ReadOnly),
        }
    }
}

impl BitSource for Bits<'_> {
    fn n_bits(&self) -> u32 {
        match self {
            Bits::Owned(v) => v.n_bits(),
            Bits::Mapped(v) => v.n_bits(),
        }
    }

    fn bit(&self, i: u32) -> bool {
        match self {
            Bits::Owned(v) => v.bit(i),
            Bits::Mapped(v) => v.bit(i),
        }
    }

    fn packed_byte(&self, k: u32) -> u8 {
        match self {
            Bits::Owned(v) => v.packed_byte(k),
            Bits::Mapped(v) => v.packed_byte(k),
        }
    }

    fn byte_runs(&self, f: &mut dyn FnMut(u8, u32)) {
        match self {
            Bits::Owned(v) => v.byte_runs(f),
            Bits::Mapped(v) => v.byte_runs(f),
        }
    }
}

impl PartialEq for Bits<'_> {
    fn eq(&self, other: &Self) -> bool {
        bits_eq(self, other)
    }
}

impl Eq for Bits<'_> {}

impl PartialOrd for Bits<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Bits<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self, other)
    }
}
