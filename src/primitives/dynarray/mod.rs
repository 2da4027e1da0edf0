#![forbid(unsafe_code)]
//! Growable, homogeneously typed byte array.
//!
//! Items are opaque `item_size`-byte blocks. Indices passed to [`DynArray::item_at`],
//! [`DynArray::item_at_mut`] and [`DynArray::swap`] are not range checked beyond
//! the panicking slice access; callers own bounds checks.

use crate::types::{FlatError, Result};

/// Largest number of items any array may hold.
pub const MAX_ITEMS: usize = u32::MAX as usize;

const SMALL_ADD: [usize; 16] = [1, 1, 2, 2, 4, 4, 4, 8, 8, 10, 11, 12, 13, 14, 15, 16];

/// Capacity following `capacity` under the amortized growth policy.
///
/// Returns `None` once the sequence would exceed [`MAX_ITEMS`].
pub fn next_capacity(capacity: usize) -> Option<usize> {
    let small = SMALL_ADD.get(capacity).copied().unwrap_or(0);
    let next = capacity
        .checked_add(capacity / 16)?
        .checked_add(small)?;
    if next > MAX_ITEMS {
        if capacity < MAX_ITEMS {
            return Some(MAX_ITEMS);
        }
        return None;
    }
    Some(next)
}

/// Growable array of fixed-size items.
#[derive(Clone, Debug)]
pub struct DynArray {
    item_size: usize,
    capacity: usize,
    data: Vec<u8>,
}

impl DynArray {
    /// Creates an empty array whose items are `item_size` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `item_size` is zero.
    pub fn new(item_size: usize) -> Self {
        assert!(item_size > 0, "item size must be non-zero");
        Self {
            item_size,
            capacity: 0,
            data: Vec::new(),
        }
    }

    /// Adopts `bytes` without copying; the result holds one-byte items.
    pub fn give_data(bytes: Vec<u8>) -> Self {
        Self {
            item_size: 1,
            capacity: bytes.len(),
            data: bytes,
        }
    }

    /// Size of one item in bytes.
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Number of items stored.
    pub fn n_items(&self) -> usize {
        self.data.len() / self.item_size
    }

    /// Returns true if no items are stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of items that fit without reallocating.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes reserved on the heap for items.
    pub fn n_heap_bytes(&self) -> usize {
        self.capacity * self.item_size
    }

    /// Appends one item. Fails with [`FlatError::Invalid`] if `item` is not
    /// exactly one item long. On failure the array is unchanged.
    pub fn push(&mut self, item: &[u8]) -> Result<()> {
        if item.len() != self.item_size {
            return Err(FlatError::Invalid("item length differs from the array item size"));
        }
        if self.n_items() == self.capacity {
            self.grow()?;
        }
        self.data.extend_from_slice(item);
        Ok(())
    }

    /// Removes the last item; no-op on an empty array.
    pub fn pop(&mut self) {
        let n = self.data.len().saturating_sub(self.item_size);
        self.data.truncate(n);
    }

    /// Keeps the first `n_items` items.
    pub fn truncate(&mut self, n_items: usize) {
        self.data.truncate(n_items.saturating_mul(self.item_size));
    }

    /// Bytes of item `i`.
    pub fn item_at(&self, i: usize) -> &[u8] {
        let start = i * self.item_size;
        &self.data[start..start + self.item_size]
    }

    /// Mutable bytes of item `i`.
    pub fn item_at_mut(&mut self, i: usize) -> &mut [u8] {
        let start = i * self.item_size;
        &mut self.data[start..start + self.item_size]
    }

    /// Exchanges items `i` and `j`.
    pub fn swap(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }
        let (lo, hi) = if i < j { (i, j) } else { (j, i) };
        let s = self.item_size;
        let (head, tail) = self.data.split_at_mut(hi * s);
        head[lo * s..lo * s + s].swap_with_slice(&mut tail[..s]);
    }

    /// Drops all items and releases storage.
    pub fn clear(&mut self) {
        self.data = Vec::new();
        self.capacity = 0;
    }

    /// Raw bytes of all stored items.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the array, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    fn grow(&mut self) -> Result<()> {
        let next = next_capacity(self.capacity)
            .ok_or(FlatError::Capacity("array would exceed 2**32-1 items"))?;
        let additional = (next - self.n_items())
            .checked_mul(self.item_size)
            .ok_or(FlatError::Capacity("array byte size overflow"))?;
        self.data
            .try_reserve_exact(additional)
            .map_err(|_| FlatError::Allocation)?;
        self.capacity = next;
        Ok(())
    }
}
