#![forbid(unsafe_code)]
//! Serialized open-addressing hash tables.
//!
//! A table record is
//!
//! ```text
//! [u32 container id][u32 n_items][u32 capacity]
//! [capacity × u32 hash][capacity × key cell]( [capacity × value cell] for maps )
//! ```
//!
//! Capacity is a power of two. The probe sequence is linear,
//! `(hash + attempt) & (capacity - 1)`, and depends only on the hash and
//! the slot contents. Unused slots carry the tag [`tag::UNUSED_SLOT`].

use tracing::trace;

use crate::access::{Raw, VResult};
use crate::format::{tag, CELL_LEN};
use crate::types::{Offset, ValidationError};
use crate::value::Node;

/// Smallest capacity a non-empty table is built with.
pub const MIN_CAPACITY: u32 = 8;

/// Default maximum ratio of items to slots.
pub const DEFAULT_MAX_LOAD: f64 = 0.75;

/// Slot visited on `attempt` for `hash`.
#[inline]
pub fn probe(hash: u32, capacity: u32, attempt: u32) -> u32 {
    hash.wrapping_add(attempt) & (capacity - 1)
}

/// Capacity for `n_items` entries under `max_load`: the smallest power of
/// two, at least [`MIN_CAPACITY`], that keeps the load at or below
/// `max_load` and leaves at least one slot unused.
pub fn capacity_for(n_items: u32, max_load: f64) -> Option<u32> {
    let mut cap = MIN_CAPACITY;
    loop {
        if n_items < cap && (n_items as f64) <= cap as f64 * max_load {
            return Some(cap);
        }
        cap = cap.checked_mul(2)?;
    }
}

/// Fixed fields of a table record.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TableHead {
    /// Record start.
    pub offset: Offset,
    /// Container id of the map or set.
    pub container_id: u32,
    /// Occupied slots.
    pub n_items: u32,
    /// Total slots.
    pub capacity: u32,
    /// Carries a value column.
    pub is_map: bool,
}

impl TableHead {
    pub(crate) fn hashes_at(&self) -> u64 {
        self.offset.0 as u64 + 12
    }

    pub(crate) fn key_pos(&self, slot: u32) -> u64 {
        self.hashes_at() + self.capacity as u64 * 4 + slot as u64 * CELL_LEN as u64
    }

    pub(crate) fn value_pos(&self, slot: u32) -> u64 {
        self.key_pos(slot) + self.capacity as u64 * CELL_LEN as u64
    }
}

/// Finds the slot whose stored hash equals `hash` and whose key satisfies
/// `matches`. Stops at the first unused slot or after `capacity` probes.
pub(crate) fn lookup<F>(
    raw: &Raw<'_>,
    head: &TableHead,
    hash: u32,
    mut matches: F,
) -> VResult<Option<u32>>
where
    F: FnMut(Node) -> VResult<bool>,
{
    if head.capacity == 0 || !head.capacity.is_power_of_two() {
        return Err(ValidationError::MalformedHashTable {
            offset: head.offset.0,
            reason: "capacity is not a power of two",
        });
    }
    for attempt in 0..head.capacity {
        let slot = probe(hash, head.capacity, attempt);
        let cell = raw.slot_key(head, slot)?;
        if cell.tag == tag::UNUSED_SLOT {
            trace!(attempt, "table.lookup miss");
            return Ok(None);
        }
        if raw.slot_hash(head, slot)? != hash {
            continue;
        }
        let key = raw.decode(cell, head.key_pos(slot) as u32)?;
        if matches(key)? {
            trace!(attempt, slot, "table.lookup hit");
            return Ok(Some(slot));
        }
    }
    Ok(None)
}

/// Checks the structure of a table whose keys have already been validated:
/// occupancy count, a terminating unused slot, and that every key is
/// reachable from its home slot without crossing an unused slot.
///
/// Runs in one pass over the slots. Starting just after an unused slot,
/// each maximal run of occupied slots is walked while remembering where
/// the run began; a key in slot `s` is reachable exactly when its home slot
/// lies in the circular interval `[run_start, s]`.
pub(crate) fn check_structure(raw: &Raw<'_>, head: &TableHead) -> VResult<()> {
    let malformed = |reason| ValidationError::MalformedHashTable {
        offset: head.offset.0,
        reason,
    };
    let cap = head.capacity;
    if cap == 0 || !cap.is_power_of_two() {
        return Err(malformed("capacity is not a power of two"));
    }
    let mut first_unused = None;
    let mut occupied = 0u32;
    for slot in 0..cap {
        if raw.slot_key(head, slot)?.tag == tag::UNUSED_SLOT {
            first_unused.get_or_insert(slot);
        } else {
            occupied += 1;
        }
    }
    if occupied != head.n_items {
        return Err(malformed("item count does not match occupied slots"));
    }
    let Some(first_unused) = first_unused else {
        return Err(malformed("no unused slot"));
    };
    let mask = cap - 1;
    let mut run_start = 0u32;
    let mut in_run = false;
    for step in 1..=cap {
        let slot = (first_unused + step) & mask;
        if raw.slot_key(head, slot)?.tag == tag::UNUSED_SLOT {
            in_run = false;
            continue;
        }
        if !in_run {
            run_start = slot;
            in_run = true;
        }
        let home = raw.slot_hash(head, slot)? & mask;
        let dist_home = slot.wrapping_sub(home) & mask;
        let dist_run = slot.wrapping_sub(run_start) & mask;
        if dist_home > dist_run {
            return Err(malformed("key unreachable from its home slot"));
        }
    }
    Ok(())
}
