#![forbid(unsafe_code)]
//! Builder-side typed numeric vector.
//!
//! A [`PrimVector`] pairs a [`PrimKind`] with a [`DynArray`] of little-endian
//! elements. It serializes to the portable blob
//! `[u32 kind code][u32 item count][item count × item size]` and can hand out
//! zero-copy views; while a view is registered every resizing call fails
//! with [`FlatError::ResizeWhileBorrowed`].

use std::cmp::Ordering;
use std::fmt;

use tracing::trace;

use crate::primitives::bytes::le;
use crate::primitives::dynarray::{DynArray, MAX_ITEMS};
use crate::primitives::export::{ExportGuard, Exports};
use crate::primitives::sort;
use crate::types::{FlatError, Result};
use crate::value::{Number, PrimKind};

const BLOB_HEADER_LEN: usize = 8;

/// A column of numbers a projection sort can look values up in.
pub trait ProjectionColumn {
    /// Number of values.
    fn len(&self) -> usize;

    /// True when the column is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `i`; `i` is below [`ProjectionColumn::len`].
    fn number_at(&self, i: usize) -> Number;
}

/// Growable vector of one primitive numeric kind.
#[derive(Clone)]
pub struct PrimVector {
    kind: PrimKind,
    items: DynArray,
    exports: Exports,
}

impl PrimVector {
    /// Creates an empty vector of `kind`.
    pub fn new(kind: PrimKind) -> Self {
        Self {
            kind,
            items: DynArray::new(kind.item_size()),
            exports: Exports::default(),
        }
    }

    /// Collects `values` into a new vector, failing on the first value the
    /// kind cannot represent.
    pub fn from_numbers<I>(kind: PrimKind, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = Number>,
    {
        let mut v = Self::new(kind);
        v.extend(values)?;
        Ok(v)
    }

    /// Adopts raw bytes as a `u8` vector without copying.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() > MAX_ITEMS {
            return Err(FlatError::Capacity("array would exceed 2**32-1 items"));
        }
        Ok(Self {
            kind: PrimKind::U8,
            items: DynArray::give_data(bytes),
            exports: Exports::default(),
        })
    }

    /// Element kind.
    pub fn kind(&self) -> PrimKind {
        self.kind
    }

    /// Short type code of the element kind.
    pub fn typecode(&self) -> &'static str {
        self.kind.typecode()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.n_items()
    }

    /// True when empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Bytes reserved on the heap.
    pub fn heap_bytes(&self) -> usize {
        self.items.n_heap_bytes()
    }

    /// Raw little-endian element bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.items.as_bytes()
    }

    /// Registers a zero-copy view of [`PrimVector::as_bytes`].
    pub fn export(&self) -> ExportGuard {
        self.exports.acquire()
    }

    /// Element `i`.
    pub fn get(&self, i: usize) -> Result<Number> {
        self.check_index(i)?;
        Ok(self.kind.decode(self.items.item_at(i)))
    }

    /// Overwrites element `i`.
    pub fn set(&mut self, i: usize, value: Number) -> Result<()> {
        self.check_index(i)?;
        let raw = self.encode(value)?;
        let size = self.kind.item_size();
        self.items.item_at_mut(i).copy_from_slice(&raw[..size]);
        Ok(())
    }

    /// Appends one element.
    pub fn push(&mut self, value: Number) -> Result<()> {
        self.exports.check_resize()?;
        let raw = self.encode(value)?;
        self.items.push(&raw[..self.kind.item_size()])
    }

    /// Appends every value, or none: a failure part way through removes
    /// whatever this call had added.
    pub fn extend<I>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = Number>,
    {
        self.exports.check_resize()?;
        let before = self.len();
        for value in values {
            if let Err(err) = self.push(value) {
                self.items.truncate(before);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Removes and returns the last element.
    pub fn pop(&mut self) -> Result<Number> {
        self.exports.check_resize()?;
        let n = self.len();
        if n == 0 {
            return Err(FlatError::bounds(0u32, 0u32));
        }
        let value = self.kind.decode(self.items.item_at(n - 1));
        self.items.pop();
        Ok(value)
    }

    /// Removes the last `n` elements.
    pub fn pop_bulk(&mut self, n: usize) -> Result<()> {
        self.exports.check_resize()?;
        let len = self.len();
        if n > len {
            return Err(FlatError::bounds(n, len));
        }
        self.items.truncate(len - n);
        Ok(())
    }

    /// Position of the first element equal to `value`.
    pub fn index_of(&self, value: Number) -> Option<usize> {
        self.iter().position(|item| item.num_eq(value))
    }

    /// True if some element equals `value`.
    pub fn contains(&self, value: Number) -> bool {
        self.index_of(value).is_some()
    }

    /// Removes element `i`, shifting later elements down.
    pub fn remove(&mut self, i: usize) -> Result<Number> {
        self.exports.check_resize()?;
        let value = self.get(i)?;
        for j in i..self.len() - 1 {
            self.items.swap(j, j + 1);
        }
        self.items.pop();
        Ok(value)
    }

    /// Removes element `i` by moving the last element into its place.
    pub fn fast_remove(&mut self, i: usize) -> Result<Number> {
        self.exports.check_resize()?;
        let value = self.get(i)?;
        let last = self.len() - 1;
        self.items.swap(i, last);
        self.items.pop();
        Ok(value)
    }

    /// Drops all elements and releases storage.
    pub fn clear(&mut self) -> Result<()> {
        self.exports.check_resize()?;
        self.items.clear();
        Ok(())
    }

    /// Copies elements `lo..hi` into a new vector.
    pub fn slice(&self, lo: usize, hi: usize) -> Result<PrimVector> {
        if lo > hi || hi > self.len() {
            return Err(FlatError::bounds(hi, self.len()));
        }
        let size = self.kind.item_size();
        let mut out = PrimVector::new(self.kind);
        for i in lo..hi {
            out.items.push(&self.items.as_bytes()[i * size..(i + 1) * size])?;
        }
        Ok(out)
    }

    /// Iterates the elements.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = Number> + '_ {
        let kind = self.kind;
        self.items
            .as_bytes()
            .chunks_exact(kind.item_size())
            .map(move |raw| kind.decode(raw))
    }

    /// Sorts ascending in place. NaN sorts after every number.
    pub fn sort(&mut self) {
        let kind = self.kind;
        let n = self.len();
        sort::sort_with(
            n,
            &mut self.items,
            |items: &&mut DynArray, a, b| {
                kind.decode(items.item_at(a))
                    .sort_cmp(kind.decode(items.item_at(b)))
            },
            |items: &mut &mut DynArray, a, b| items.swap(a, b),
        );
    }

    /// Treats the elements as indices and sorts them by the values they
    /// select in `columns`, the first column deciding first. Ties are broken
    /// by the indices themselves, so no two distinct indices compare equal.
    pub fn sort_projection(&mut self, columns: &[&dyn ProjectionColumn]) -> Result<()> {
        if self.kind.is_float() {
            return Err(FlatError::mismatch("integer projection", "f"));
        }
        let first = columns
            .first()
            .ok_or(FlatError::Invalid("projection sort needs at least one column"))?;
        let n_values = first.len();
        if columns.iter().any(|c| c.len() != n_values) {
            return Err(FlatError::Invalid("projection columns differ in length"));
        }
        let mut indices = Vec::with_capacity(self.len());
        for value in self.iter() {
            let idx = value
                .as_i128()
                .filter(|&v| v >= 0 && v < n_values as i128)
                .ok_or_else(|| FlatError::bounds(value.as_i128().unwrap_or(-1), n_values))?;
            indices.push(idx as usize);
        }
        trace!(
            n = indices.len(),
            columns = columns.len(),
            "primvec.sort_projection"
        );
        let n = indices.len();
        sort::sort_with(
            n,
            (indices, &mut self.items),
            |state: &(Vec<usize>, &mut DynArray), a, b| {
                let (x, y) = (state.0[a], state.0[b]);
                columns
                    .iter()
                    .map(|c| c.number_at(x).sort_cmp(c.number_at(y)))
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or_else(|| x.cmp(&y))
            },
            |state: &mut (Vec<usize>, &mut DynArray), a, b| {
                state.0.swap(a, b);
                state.1.swap(a, b);
            },
        );
        Ok(())
    }

    /// Encodes the vector as a portable blob.
    pub fn serialize(&self) -> Vec<u8> {
        let raw = self.items.as_bytes();
        let mut out = Vec::with_capacity(BLOB_HEADER_LEN + raw.len());
        le::put_u32(&mut out, self.kind.code());
        le::put_u32(&mut out, self.len() as u32);
        out.extend_from_slice(raw);
        out
    }

    /// Decodes a blob produced by [`PrimVector::serialize`].
    pub fn deserialize(blob: &[u8]) -> Result<PrimVector> {
        let code = le::get_u32(blob, 0).ok_or(FlatError::InvalidBlob("shorter than 8 bytes"))?;
        let count = le::get_u32(blob, 4).ok_or(FlatError::InvalidBlob("shorter than 8 bytes"))?;
        let kind = PrimKind::from_code(code).ok_or(FlatError::InvalidBlob("unknown type tag"))?;
        let expected = (count as usize)
            .checked_mul(kind.item_size())
            .and_then(|n| n.checked_add(BLOB_HEADER_LEN));
        if expected != Some(blob.len()) {
            return Err(FlatError::InvalidBlob("length does not match item count"));
        }
        let mut out = PrimVector::new(kind);
        for raw in blob[BLOB_HEADER_LEN..].chunks_exact(kind.item_size()) {
            out.items.push(raw)?;
        }
        Ok(out)
    }

    fn check_index(&self, i: usize) -> Result<()> {
        if i >= self.len() {
            return Err(FlatError::bounds(i, self.len()));
        }
        Ok(())
    }

    fn encode(&self, value: Number) -> Result<[u8; 8]> {
        self.kind
            .encode(value)
            .ok_or(FlatError::Invalid("value not representable in the vector's kind"))
    }
}

impl ProjectionColumn for PrimVector {
    fn len(&self) -> usize {
        self.items.n_items()
    }

    fn number_at(&self, i: usize) -> Number {
        self.kind.decode(self.items.item_at(i))
    }
}

impl PartialEq for PrimVector {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a.num_eq(b))
    }
}

impl fmt::Debug for PrimVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrimVector<{}>", self.kind)?;
        f.debug_list().entries(self.iter()).finish()
    }
}
