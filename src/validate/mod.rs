#![forbid(unsafe_code)]
//! Whole-buffer structural certification.
//!
//! [`validate`] walks every value reachable from the root exactly once and
//! aborts on the first fault. The walk is an explicit-stack depth-first
//! search: containers are marked in progress on entry and done on exit, so
//! shared sub-values are checked once and a container that reaches itself
//! is reported as a cycle. A buffer that passes may be read without any
//! further structural checks.
//!
//! Record hashes are computed bottom-up as containers finish, each from the
//! cached hashes of its children, so the cost stays linear in the number of
//! distinct records even when keys share sub-values.

use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::debug;

use crate::access::{index_key, HashIndex, Raw};
use crate::bitvec;
use crate::format::{self, tag, Header, CELL_LEN, HEADER_LEN};
use crate::table::{self, TableHead};
use crate::types::checksum::payload_crc32;
use crate::types::{Offset, ValidationError};
use crate::value::hash::{self, SeqHasher};
use crate::value::{Node, TableRef, VectorKind, VectorRef};

/// Default limit on container nesting.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Knobs for [`validate_with`].
#[derive(Clone, Debug)]
pub struct ValidateOptions {
    /// Deepest container nesting accepted.
    pub max_depth: usize,
    /// Recompute the payload checksum when the header carries one.
    pub verify_checksum: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            verify_checksum: true,
        }
    }
}

impl ValidateOptions {
    /// Sets the nesting limit.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Enables or disables checksum verification.
    pub fn verify_checksum(mut self, yes: bool) -> Self {
        self.verify_checksum = yes;
        self
    }
}

/// What a successful validation saw.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    /// Buffer length in bytes.
    pub buffer_len: u64,
    /// Container ids declared by the header.
    pub n_containers: u32,
    /// Whether a payload checksum was present and verified.
    pub checksum_verified: bool,
    /// Deepest container nesting reached.
    pub max_depth: usize,
    /// Value cells visited, including the root.
    pub n_values: u64,
    /// Distinct string records.
    pub n_strings: u64,
    /// Distinct bit vectors stored as records; inline runs are not counted.
    pub n_bitvectors: u64,
    /// Distinct non-empty primitive vectors.
    pub n_prim_vectors: u64,
    /// Distinct non-empty generic vectors.
    pub n_vectors: u64,
    /// Distinct non-empty maps.
    pub n_maps: u64,
    /// Distinct non-empty sets.
    pub n_sets: u64,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

enum Frame {
    Vector {
        v: VectorRef,
        hashable: bool,
        next: u32,
        depth: usize,
    },
    Table {
        head: TableHead,
        next: u32,
        depth: usize,
    },
}

/// Validates `buf` with default options.
pub fn validate(buf: &[u8]) -> Result<ValidationSummary, ValidationError> {
    validate_with(buf, &ValidateOptions::default())
}

/// Validates `buf`, returning the first structural fault.
pub fn validate_with(
    buf: &[u8],
    opts: &ValidateOptions,
) -> Result<ValidationSummary, ValidationError> {
    certify(buf, opts).map(|(summary, _)| summary)
}

/// Validates `buf` and keeps the hash of every hashable record it reached.
pub(crate) fn certify(
    buf: &[u8],
    opts: &ValidateOptions,
) -> Result<(ValidationSummary, HashIndex), ValidationError> {
    let header = Header::decode(buf)?;
    let mut summary = ValidationSummary {
        buffer_len: buf.len() as u64,
        n_containers: header.n_containers,
        ..ValidationSummary::default()
    };
    if header.has_checksum() && opts.verify_checksum {
        let computed = payload_crc32(&buf[HEADER_LEN..]);
        if computed != header.checksum {
            return Err(ValidationError::Checksum {
                stored: header.checksum,
                computed,
            });
        }
        summary.checksum_verified = true;
    }
    if header.n_containers as usize > buf.len() / CELL_LEN {
        return Err(ValidationError::BadHeader(
            "container count exceeds what the buffer can hold",
        ));
    }

    let mut walk = Walk {
        raw: Raw::new(buf),
        opts,
        ids: vec![0u64; (header.n_containers as usize).div_ceil(64)],
        n_ids: header.n_containers,
        state: FxHashMap::default(),
        hashes: HashIndex::default(),
        stack: Vec::new(),
        summary,
    };
    walk.run(header)?;
    debug!(
        len = walk.summary.buffer_len,
        values = walk.summary.n_values,
        depth = walk.summary.max_depth,
        records = walk.hashes.len(),
        "validate.ok"
    );
    Ok((walk.summary, walk.hashes))
}

struct Walk<'a, 'o> {
    raw: Raw<'a>,
    opts: &'o ValidateOptions,
    ids: Vec<u64>,
    n_ids: u32,
    /// Container records by offset, with the tag they were first reached as.
    state: FxHashMap<u32, (Visit, u32)>,
    /// Hashes of finished records; also marks strings and bit vector
    /// records as checked.
    hashes: HashIndex,
    stack: Vec<Frame>,
    summary: ValidationSummary,
}

impl Walk<'_, '_> {
    fn run(&mut self, header: Header) -> Result<(), ValidationError> {
        let root = self.raw.decode(header.root, 16)?;
        self.visit(root, 0)?;
        while let Some(frame) = self.stack.last_mut() {
            let child = match frame {
                Frame::Vector {
                    v,
                    hashable,
                    next,
                    depth,
                } => {
                    if *next == v.len {
                        None
                    } else {
                        let item = self.raw.vector_item(*v, *next)?;
                        *next += 1;
                        if *hashable && !is_hashable(&item) {
                            return Err(ValidationError::FalselyHashable { offset: v.offset.0 });
                        }
                        Some((item, *depth))
                    }
                }
                Frame::Table { head, next, depth } => {
                    let columns = if head.is_map { 2 } else { 1 };
                    let mut found = None;
                    while found.is_none() && *next < head.capacity * columns {
                        let slot = *next % head.capacity;
                        let is_value = *next >= head.capacity;
                        *next += 1;
                        let key = self.raw.slot_key(head, slot)?;
                        if key.tag == tag::UNUSED_SLOT {
                            continue;
                        }
                        let item = if is_value {
                            let cell = self.raw.slot_value(head, slot)?;
                            self.raw.decode(cell, head.value_pos(slot) as u32)?
                        } else {
                            let item = self.raw.decode(key, head.key_pos(slot) as u32)?;
                            if !is_hashable(&item) {
                                return Err(ValidationError::UnhashableKey {
                                    offset: head.offset.0,
                                });
                            }
                            item
                        };
                        found = Some((item, *depth));
                    }
                    found
                }
            };
            match child {
                Some((item, depth)) => self.visit(item, depth + 1)?,
                None => self.finish_top()?,
            }
        }
        Ok(())
    }

    fn visit(&mut self, v: Node, depth: usize) -> Result<(), ValidationError> {
        self.summary.n_values += 1;
        match v {
            Node::String(off) => {
                if let Entry::Vacant(slot) = self.hashes.entry((off.0, tag::STRING)) {
                    let bytes = self.raw.str_bytes(off)?;
                    std::str::from_utf8(bytes)
                        .map_err(|_| ValidationError::InvalidUtf8 { offset: off.0 })?;
                    slot.insert(hash::string(bytes));
                    self.summary.n_strings += 1;
                }
            }
            Node::BitVector(b) => {
                let view = self.raw.bits(b)?;
                if let Some(key) = index_key(v) {
                    if let Entry::Vacant(slot) = self.hashes.entry(key) {
                        slot.insert(bitvec::hash_32(&view));
                        self.summary.n_bitvectors += 1;
                    }
                }
            }
            Node::Vector(vr) if vr.kind != VectorKind::Empty => {
                let record_tag = match vr.kind {
                    VectorKind::Prim(kind) => format::prim_vector_tag(kind),
                    VectorKind::Value { hashable: true } => tag::VECTOR_VALUE_HASHABLE,
                    _ => tag::VECTOR_VALUE,
                };
                if !self.enter(vr.offset, record_tag, depth)? {
                    return Ok(());
                }
                self.raw.vector_items(vr)?;
                match vr.kind {
                    VectorKind::Prim(_) => {
                        self.summary.n_prim_vectors += 1;
                        self.state.insert(vr.offset.0, (Visit::Done, record_tag));
                        if let Some(h) = self.raw.hash(v)? {
                            self.hashes.insert((vr.offset.0, record_tag), h);
                        }
                    }
                    VectorKind::Value { hashable } => {
                        self.summary.n_vectors += 1;
                        self.stack.push(Frame::Vector {
                            v: vr,
                            hashable,
                            next: 0,
                            depth,
                        });
                    }
                    VectorKind::Empty => {}
                }
            }
            Node::Map(TableRef(Some(off))) | Node::Set(TableRef(Some(off))) => {
                let is_map = matches!(v, Node::Map(_));
                let record_tag = if is_map { tag::MAP } else { tag::SET };
                if !self.enter(off, record_tag, depth)? {
                    return Ok(());
                }
                let head = self.raw.table_head(off, is_map)?;
                if is_map {
                    self.summary.n_maps += 1;
                } else {
                    self.summary.n_sets += 1;
                }
                self.stack.push(Frame::Table {
                    head,
                    next: 0,
                    depth,
                });
            }
            _ => {}
        }
        Ok(())
    }

    /// Registers a container record. Returns false if it was already
    /// validated through another path under the same tag.
    fn enter(
        &mut self,
        off: Offset,
        record_tag: u32,
        depth: usize,
    ) -> Result<bool, ValidationError> {
        match self.state.get(&off.0) {
            Some(&(_, seen)) if seen != record_tag => {
                let id = self.raw.container_id(off)?;
                return Err(ValidationError::ContainerId { offset: off.0, id });
            }
            Some((Visit::Done, _)) => return Ok(false),
            Some((Visit::InProgress, _)) => {
                return Err(ValidationError::Cycle { offset: off.0 })
            }
            None => {}
        }
        if depth > self.opts.max_depth {
            return Err(ValidationError::TooDeep {
                offset: off.0,
                limit: self.opts.max_depth,
            });
        }
        self.summary.max_depth = self.summary.max_depth.max(depth);
        let id = self.raw.container_id(off)?;
        if id >= self.n_ids {
            return Err(ValidationError::ContainerId { offset: off.0, id });
        }
        let (word, bit) = ((id / 64) as usize, 1u64 << (id % 64));
        if self.ids[word] & bit != 0 {
            return Err(ValidationError::ContainerId { offset: off.0, id });
        }
        self.ids[word] |= bit;
        self.state.insert(off.0, (Visit::InProgress, record_tag));
        Ok(true)
    }

    fn finish_top(&mut self) -> Result<(), ValidationError> {
        let Some(frame) = self.stack.pop() else {
            return Ok(());
        };
        let off = match frame {
            Frame::Vector { v, hashable, .. } => {
                if hashable {
                    let mut h = SeqHasher::new();
                    for i in 0..v.len {
                        let item = self.raw.vector_item(v, i)?;
                        let item_hash = self
                            .cached_hash(item)?
                            .ok_or(ValidationError::FalselyHashable { offset: v.offset.0 })?;
                        h.push(item_hash);
                    }
                    self.hashes.insert((v.offset.0, tag::VECTOR_VALUE_HASHABLE), h.finish());
                }
                v.offset
            }
            Frame::Table { head, .. } => {
                table::check_structure(&self.raw, &head)?;
                for slot in 0..head.capacity {
                    let cell = self.raw.slot_key(&head, slot)?;
                    if cell.tag == tag::UNUSED_SLOT {
                        continue;
                    }
                    let key = self.raw.decode(cell, head.key_pos(slot) as u32)?;
                    let computed = self.cached_hash(key)?.ok_or(ValidationError::UnhashableKey {
                        offset: head.offset.0,
                    })?;
                    if computed != self.raw.slot_hash(&head, slot)? {
                        return Err(ValidationError::MalformedHashTable {
                            offset: head.offset.0,
                            reason: "stored hash differs from key hash",
                        });
                    }
                }
                let table = TableRef(Some(head.offset));
                let (node, record_tag) = if head.is_map {
                    (Node::Map(table), tag::MAP)
                } else {
                    (Node::Set(table), tag::SET)
                };
                if let Some(h) = self.raw.hash(node)? {
                    self.hashes.insert((head.offset.0, record_tag), h);
                }
                head.offset
            }
        };
        if let Some(entry) = self.state.get_mut(&off.0) {
            entry.0 = Visit::Done;
        }
        Ok(())
    }

    /// Hash of a value whose records have all finished.
    fn cached_hash(&self, v: Node) -> Result<Option<u32>, ValidationError> {
        if let Some(&h) = index_key(v).and_then(|key| self.hashes.get(&key)) {
            return Ok(Some(h));
        }
        self.raw.hash(v)
    }
}

fn is_hashable(v: &Node) -> bool {
    !matches!(
        v,
        Node::Vector(VectorRef {
            kind: VectorKind::Value { hashable: false },
            ..
        })
    )
}
