#![forbid(unsafe_code)]
//! Bounds-checked decoding of cells and records inside one buffer.
//!
//! [`Raw`] is the only code that turns offsets into bytes. Every access is
//! checked against the buffer extent with 64-bit arithmetic, so even an
//! unvalidated buffer can never cause an out-of-range read; the validator
//! walks buffers through the same accessors the reader uses afterwards.
//! Hashing, equality and ordering of serialized values live here too.
//!
//! Serialized values form a DAG: one record may be shared by many parents.
//! Recursive hashing, equality and ordering therefore never revisit a pair
//! of records. Hashes of validated records come from a [`HashIndex`]
//! filled during validation, and equality and ordering memoize the record
//! pairs they have already settled.

use std::cmp::Ordering;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::bitvec::{self, BitView};
use crate::builder::Value;
use crate::format::{self, tag, Cell, CELL_LEN};
use crate::primitives::bytes::le;
use crate::table::{self, TableHead};
use crate::types::{FlatError, Offset, ValidationError};
use crate::value::hash::{self, SeqHasher};
use crate::value::{BitsRef, Node, Number, PrimKind, TableRef, VectorKind, VectorRef};

pub(crate) type VResult<T> = std::result::Result<T, ValidationError>;

/// Hashes of validated records, keyed by record start and the tag the
/// record was reached through.
pub(crate) type HashIndex = FxHashMap<(u32, u32), u32>;

/// Index key of the whole record behind `v`; `None` for inline values,
/// numbers and vectors that are not hashable.
pub(crate) fn index_key(v: Node) -> Option<(u32, u32)> {
    let (off, t) = match v {
        Node::String(off) => (off, tag::STRING),
        Node::BitVector(BitsRef::Packed(off)) => (off, tag::BITVECTOR),
        Node::BitVector(BitsRef::ZerosOnes(off)) => (off, tag::BITVECTOR_ZEROS_ONES),
        Node::BitVector(BitsRef::OnesZeros(off)) => (off, tag::BITVECTOR_ONES_ZEROS),
        Node::Vector(vr) => match vr.kind {
            VectorKind::Prim(kind) => (vr.offset, format::prim_vector_tag(kind)),
            VectorKind::Value { hashable: true } => (vr.offset, tag::VECTOR_VALUE_HASHABLE),
            _ => return None,
        },
        Node::Map(TableRef(Some(off))) => (off, tag::MAP),
        Node::Set(TableRef(Some(off))) => (off, tag::SET),
        _ => return None,
    };
    Some((off.0, t))
}

/// Record pairs already known to be equal or unequal.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
enum Pair {
    Vectors(VectorRef, VectorRef),
    Tables(u32, u32, bool),
}

/// Length of the `[container id][len]` head of a vector record.
pub(crate) const VECTOR_HEAD_LEN: u64 = 8;

/// Checked view over a whole buffer.
#[derive(Copy, Clone)]
pub(crate) struct Raw<'a> {
    buf: &'a [u8],
    hashes: Option<&'a HashIndex>,
}

impl<'a> Raw<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, hashes: None }
    }

    /// A view of a validated buffer whose record hashes are in `hashes`.
    pub(crate) fn with_hashes(buf: &'a [u8], hashes: &'a HashIndex) -> Self {
        Self {
            buf,
            hashes: Some(hashes),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    /// `len` bytes at `off`.
    pub(crate) fn range(&self, off: u64, len: u64) -> VResult<&'a [u8]> {
        let out_of_range = || ValidationError::OutOfRange {
            offset: off,
            len,
            buffer_len: self.buf.len() as u64,
        };
        let end = off.checked_add(len).ok_or_else(out_of_range)?;
        if end > self.buf.len() as u64 {
            return Err(out_of_range());
        }
        Ok(&self.buf[off as usize..end as usize])
    }

    pub(crate) fn u32_at(&self, off: u64) -> VResult<u32> {
        let b = self.range(off, 4)?;
        Ok(le::get_u32(b, 0).unwrap_or_default())
    }

    pub(crate) fn u64_at(&self, off: u64) -> VResult<u64> {
        let b = self.range(off, 8)?;
        Ok(le::get_u64(b, 0).unwrap_or_default())
    }

    pub(crate) fn cell_at(&self, off: u64) -> VResult<Cell> {
        Ok(Cell::new(self.u32_at(off)?, self.u32_at(off + 4)?))
    }

    /// Decodes `cell`, which was read at position `at`.
    ///
    /// Inline payloads are range checked and the fixed-size head of any
    /// referenced record must lie inside the buffer.
    pub(crate) fn decode(&self, cell: Cell, at: u32) -> VResult<Node> {
        let Cell { tag: t, data } = cell;
        let invalid = || ValidationError::InvalidInline {
            offset: at,
            tag: t,
            data,
        };
        let off = cell.offset();
        let head = |len: u64| self.range(data as u64, len).map(|_| ());
        let v = match t {
            tag::EMPTY if data == 0 => Node::Empty,
            tag::BOOL if data <= 1 => Node::Bool(data == 1),
            tag::I8 => Node::I8(i8::try_from(data as i32).map_err(|_| invalid())?),
            tag::U8 => Node::U8(u8::try_from(data).map_err(|_| invalid())?),
            tag::I16 => Node::I16(i16::try_from(data as i32).map_err(|_| invalid())?),
            tag::U16 => Node::U16(u16::try_from(data).map_err(|_| invalid())?),
            tag::I32 => Node::I32(data as i32),
            tag::U32 => Node::U32(data),
            tag::F32 => Node::F32(f32::from_bits(data)),
            tag::I64 => {
                head(8)?;
                Node::I64(off)
            }
            tag::U64 => {
                head(8)?;
                Node::U64(off)
            }
            tag::STRING => {
                head(4)?;
                Node::String(off)
            }
            tag::BITVECTOR => {
                head(4)?;
                Node::BitVector(BitsRef::Packed(off))
            }
            tag::BITVECTOR_ZEROS => Node::BitVector(BitsRef::Zeros(data)),
            tag::BITVECTOR_ONES => Node::BitVector(BitsRef::Ones(data)),
            tag::BITVECTOR_ZEROS_ONES => {
                head(8)?;
                Node::BitVector(BitsRef::ZerosOnes(off))
            }
            tag::BITVECTOR_ONES_ZEROS => {
                head(8)?;
                Node::BitVector(BitsRef::OnesZeros(off))
            }
            tag::VECTOR_EMPTY if data == 0 => Node::Vector(VectorRef::EMPTY),
            tag::VECTOR_VALUE | tag::VECTOR_VALUE_HASHABLE => {
                let kind = VectorKind::Value {
                    hashable: t == tag::VECTOR_VALUE_HASHABLE,
                };
                Node::Vector(self.vector_head(kind, off)?)
            }
            tag::MAP_EMPTY if data == 0 => Node::Map(TableRef(None)),
            tag::SET_EMPTY if data == 0 => Node::Set(TableRef(None)),
            tag::MAP => {
                head(12)?;
                Node::Map(TableRef(Some(off)))
            }
            tag::SET => {
                head(12)?;
                Node::Set(TableRef(Some(off)))
            }
            tag::EMPTY
            | tag::BOOL
            | tag::VECTOR_EMPTY
            | tag::MAP_EMPTY
            | tag::SET_EMPTY => return Err(invalid()),
            other => match format::prim_kind_of_tag(other) {
                Some(kind) => Node::Vector(self.vector_head(VectorKind::Prim(kind), off)?),
                None => return Err(ValidationError::UnknownTag { offset: at, tag: t }),
            },
        };
        Ok(v)
    }

    fn vector_head(&self, kind: VectorKind, off: Offset) -> VResult<VectorRef> {
        let len = self.u32_at(off.0 as u64 + 4)?;
        Ok(VectorRef {
            kind,
            offset: off,
            start: 0,
            len,
        })
    }

    pub(crate) fn i64_at(&self, off: Offset) -> VResult<i64> {
        Ok(self.u64_at(off.0 as u64)? as i64)
    }

    pub(crate) fn u64_record(&self, off: Offset) -> VResult<u64> {
        self.u64_at(off.0 as u64)
    }

    pub(crate) fn str_bytes(&self, off: Offset) -> VResult<&'a [u8]> {
        let n = self.u32_at(off.0 as u64)?;
        self.range(off.0 as u64 + 4, n as u64)
    }

    pub(crate) fn bits(&self, b: BitsRef) -> VResult<BitView<'a>> {
        let pair = |off: Offset| -> VResult<(u32, u32)> {
            let first = self.u32_at(off.0 as u64)?;
            let second = self.u32_at(off.0 as u64 + 4)?;
            first
                .checked_add(second)
                .ok_or(ValidationError::LengthOverflow { offset: off.0 })?;
            Ok((first, second))
        };
        Ok(match b {
            BitsRef::Packed(off) => {
                let n_bits = self.u32_at(off.0 as u64)?;
                let bytes = self.range(off.0 as u64 + 4, bitvec::bytes_for(n_bits) as u64)?;
                BitView::Packed { n_bits, bytes }
            }
            BitsRef::Zeros(n) => BitView::Zeros(n),
            BitsRef::Ones(n) => BitView::Ones(n),
            BitsRef::ZerosOnes(off) => {
                let (z, o) = pair(off)?;
                BitView::ZerosOnes(z, o)
            }
            BitsRef::OnesZeros(off) => {
                let (o, z) = pair(off)?;
                BitView::OnesZeros(o, z)
            }
        })
    }

    pub(crate) fn container_id(&self, off: Offset) -> VResult<u32> {
        self.u32_at(off.0 as u64)
    }

    /// Bytes of the elements in the window `v`.
    pub(crate) fn vector_items(&self, v: VectorRef) -> VResult<&'a [u8]> {
        let size = match v.kind {
            VectorKind::Empty => return Ok(&[]),
            VectorKind::Prim(kind) => kind.item_size() as u64,
            VectorKind::Value { .. } => CELL_LEN as u64,
        };
        let start = v.offset.0 as u64 + VECTOR_HEAD_LEN + v.start as u64 * size;
        self.range(start, v.len as u64 * size)
    }

    fn item_pos(&self, v: VectorRef, i: u32, size: usize) -> u64 {
        v.offset.0 as u64 + VECTOR_HEAD_LEN + (v.start as u64 + i as u64) * size as u64
    }

    /// Element `i` of the window `v`; `i` must be below `v.len`.
    pub(crate) fn vector_item(&self, v: VectorRef, i: u32) -> VResult<Node> {
        match v.kind {
            VectorKind::Empty => Err(ValidationError::OutOfRange {
                offset: 0,
                len: 0,
                buffer_len: self.buf.len() as u64,
            }),
            VectorKind::Prim(kind) => {
                let pos = self.item_pos(v, i, kind.item_size());
                let bytes = self.range(pos, kind.item_size() as u64)?;
                Ok(match (kind, kind.decode(bytes)) {
                    (PrimKind::I64, _) => Node::I64(Offset(pos as u32)),
                    (PrimKind::U64, _) => Node::U64(Offset(pos as u32)),
                    (PrimKind::I8, Number::Int(x)) => Node::I8(x as i8),
                    (PrimKind::I16, Number::Int(x)) => Node::I16(x as i16),
                    (PrimKind::I32, Number::Int(x)) => Node::I32(x as i32),
                    (PrimKind::U8, Number::UInt(x)) => Node::U8(x as u8),
                    (PrimKind::U16, Number::UInt(x)) => Node::U16(x as u16),
                    (PrimKind::U32, Number::UInt(x)) => Node::U32(x as u32),
                    (_, Number::Float(f)) => Node::F32(f),
                    _ => unreachable!("decode yields the representation of its kind"),
                })
            }
            VectorKind::Value { .. } => {
                let pos = self.item_pos(v, i, CELL_LEN);
                let cell = self.cell_at(pos)?;
                self.decode(cell, pos as u32)
            }
        }
    }

    /// Numeric value of a bool or number reference.
    pub(crate) fn number(&self, v: Node) -> VResult<Option<Number>> {
        Ok(Some(match v {
            Node::Bool(b) => Number::UInt(b as u64),
            Node::I8(x) => Number::Int(x as i64),
            Node::I16(x) => Number::Int(x as i64),
            Node::I32(x) => Number::Int(x as i64),
            Node::I64(off) => Number::Int(self.i64_at(off)?),
            Node::U8(x) => Number::UInt(x as u64),
            Node::U16(x) => Number::UInt(x as u64),
            Node::U32(x) => Number::UInt(x as u64),
            Node::U64(off) => Number::UInt(self.u64_record(off)?),
            Node::F32(f) => Number::Float(f),
            _ => return Ok(None),
        }))
    }

    /// Canonical hash of `v`; `None` when `v` is not hashable.
    ///
    /// Sets and maps hash from their stored slot hashes. Whole records
    /// listed in the hash index are not rehashed.
    pub(crate) fn hash(&self, v: Node) -> VResult<Option<u32>> {
        if let Some(h) = self.indexed_hash(v)? {
            return Ok(Some(h));
        }
        if let Some(n) = self.number(v)? {
            return Ok(Some(hash::number(n)));
        }
        Ok(Some(match v {
            Node::Empty => hash::empty(),
            Node::String(off) => hash::string(self.str_bytes(off)?),
            Node::BitVector(b) => bitvec::hash_32(&self.bits(b)?),
            Node::Vector(vr) => {
                if let VectorKind::Value { hashable: false } = vr.kind {
                    return Ok(None);
                }
                let mut h = SeqHasher::new();
                for i in 0..vr.len {
                    match self.hash(self.vector_item(vr, i)?)? {
                        Some(item) => h.push(item),
                        None => return Ok(None),
                    }
                }
                h.finish()
            }
            Node::Set(t) => self.bag_hash(t, false)?,
            Node::Map(t) => self.bag_hash(t, true)?,
            _ => unreachable!("numbers handled above"),
        }))
    }

    /// Hash of `v` from the index, when `v` covers a whole indexed record.
    pub(crate) fn indexed_hash(&self, v: Node) -> VResult<Option<u32>> {
        let (Some(index), Some(key)) = (self.hashes, index_key(v)) else {
            return Ok(None);
        };
        if let Node::Vector(vr) = v {
            if vr.start != 0 || vr.len != self.u32_at(vr.offset.0 as u64 + 4)? {
                return Ok(None);
            }
        }
        Ok(index.get(&key).copied())
    }

    fn bag_hash(&self, t: TableRef, is_map: bool) -> VResult<u32> {
        let mut h = if is_map {
            hash::BagHasher::map()
        } else {
            hash::BagHasher::set()
        };
        if let TableRef(Some(off)) = t {
            let head = self.table_head(off, is_map)?;
            for slot in 0..head.capacity {
                let key = self.slot_key(&head, slot)?;
                if key.tag != tag::UNUSED_SLOT {
                    h.push(self.slot_hash(&head, slot)?);
                }
            }
        }
        Ok(h.finish())
    }

    pub(crate) fn table_head(&self, off: Offset, is_map: bool) -> VResult<TableHead> {
        let base = off.0 as u64;
        let head = TableHead {
            offset: off,
            container_id: self.u32_at(base)?,
            n_items: self.u32_at(base + 4)?,
            capacity: self.u32_at(base + 8)?,
            is_map,
        };
        let len = format::table_record_len(head.capacity, is_map)
            .ok_or(ValidationError::LengthOverflow { offset: off.0 })?;
        self.range(base, len as u64)?;
        Ok(head)
    }

    pub(crate) fn slot_hash(&self, head: &TableHead, slot: u32) -> VResult<u32> {
        self.u32_at(head.hashes_at() + slot as u64 * 4)
    }

    pub(crate) fn slot_key(&self, head: &TableHead, slot: u32) -> VResult<Cell> {
        self.cell_at(head.key_pos(slot))
    }

    pub(crate) fn slot_value(&self, head: &TableHead, slot: u32) -> VResult<Cell> {
        self.cell_at(head.value_pos(slot))
    }

    /// Equality between two references into this buffer.
    pub(crate) fn eq(&self, a: Node, b: Node) -> VResult<bool> {
        self.eq_in(a, b, &mut FxHashMap::default())
    }

    fn eq_in(&self, a: Node, b: Node, memo: &mut FxHashMap<Pair, bool>) -> VResult<bool> {
        if let (Some(x), Some(y)) = (self.number(a)?, self.number(b)?) {
            return Ok(x.num_eq(y));
        }
        if let (Some(x), Some(y)) = (self.indexed_hash(a)?, self.indexed_hash(b)?) {
            if x != y {
                return Ok(false);
            }
        }
        let pair = match (a, b) {
            (Node::Vector(x), Node::Vector(y)) => Pair::Vectors(x, y),
            (Node::Set(TableRef(Some(x))), Node::Set(TableRef(Some(y)))) => {
                Pair::Tables(x.0, y.0, false)
            }
            (Node::Map(TableRef(Some(x))), Node::Map(TableRef(Some(y)))) => {
                Pair::Tables(x.0, y.0, true)
            }
            _ => return self.eq_leaf(a, b),
        };
        if let Some(&known) = memo.get(&pair) {
            return Ok(known);
        }
        let equal = match (a, b) {
            (Node::Vector(x), Node::Vector(y)) => self.vector_eq(x, y, memo)?,
            (Node::Set(x), Node::Set(y)) => self.table_eq(x, y, false, memo)?,
            (Node::Map(x), Node::Map(y)) => self.table_eq(x, y, true, memo)?,
            _ => unreachable!("pair kinds matched above"),
        };
        memo.insert(pair, equal);
        Ok(equal)
    }

    fn eq_leaf(&self, a: Node, b: Node) -> VResult<bool> {
        Ok(match (a, b) {
            (Node::Empty, Node::Empty) => true,
            (Node::String(x), Node::String(y)) => {
                x == y || self.str_bytes(x)? == self.str_bytes(y)?
            }
            (Node::BitVector(x), Node::BitVector(y)) => {
                bitvec::bits_eq(&self.bits(x)?, &self.bits(y)?)
            }
            (Node::Set(TableRef(None)), Node::Set(TableRef(None)))
            | (Node::Map(TableRef(None)), Node::Map(TableRef(None))) => true,
            _ => false,
        })
    }

    fn vector_eq(
        &self,
        x: VectorRef,
        y: VectorRef,
        memo: &mut FxHashMap<Pair, bool>,
    ) -> VResult<bool> {
        if x == y {
            return Ok(true);
        }
        if x.len != y.len {
            return Ok(false);
        }
        for i in 0..x.len {
            if !self.eq_in(self.vector_item(x, i)?, self.vector_item(y, i)?, memo)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn table_eq(
        &self,
        x: TableRef,
        y: TableRef,
        is_map: bool,
        memo: &mut FxHashMap<Pair, bool>,
    ) -> VResult<bool> {
        let (x, y) = match (x.0, y.0) {
            (None, None) => return Ok(true),
            (Some(x), Some(y)) if x == y => return Ok(true),
            (Some(x), Some(y)) => (self.table_head(x, is_map)?, self.table_head(y, is_map)?),
            _ => return Ok(false),
        };
        if x.n_items != y.n_items {
            return Ok(false);
        }
        for slot in 0..x.capacity {
            let cell = self.slot_key(&x, slot)?;
            if cell.tag == tag::UNUSED_SLOT {
                continue;
            }
            let key = self.decode(cell, x.key_pos(slot) as u32)?;
            let h = self.slot_hash(&x, slot)?;
            let found =
                table::lookup(self, &y, h, |candidate| self.eq_in(key, candidate, memo))?;
            let Some(other) = found else {
                return Ok(false);
            };
            if is_map {
                let mine = self.slot_value(&x, slot)?;
                let theirs = self.slot_value(&y, other)?;
                let mine = self.decode(mine, x.value_pos(slot) as u32)?;
                let theirs = self.decode(theirs, y.value_pos(other) as u32)?;
                if !self.eq_in(mine, theirs, memo)? {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Ordering between two references into this buffer.
    pub(crate) fn compare(&self, a: Node, b: Node) -> Result<Ordering, FlatError> {
        self.compare_in(a, b, &mut FxHashSet::default())
    }

    /// `same` holds vector pairs already found to compare equal.
    fn compare_in(
        &self,
        a: Node,
        b: Node,
        same: &mut FxHashSet<(VectorRef, VectorRef)>,
    ) -> Result<Ordering, FlatError> {
        if let (Some(x), Some(y)) = (self.number(a)?, self.number(b)?) {
            return Ok(x.sort_cmp(y));
        }
        match (a, b) {
            (Node::String(x), Node::String(y)) => {
                Ok(self.str_bytes(x)?.cmp(self.str_bytes(y)?))
            }
            (Node::BitVector(x), Node::BitVector(y)) => {
                Ok(bitvec::compare(&self.bits(x)?, &self.bits(y)?))
            }
            (Node::Vector(x), Node::Vector(y)) => {
                if x == y || same.contains(&(x, y)) {
                    return Ok(Ordering::Equal);
                }
                for i in 0..x.len.min(y.len) {
                    let ord =
                        self.compare_in(self.vector_item(x, i)?, self.vector_item(y, i)?, same)?;
                    if ord != Ordering::Equal {
                        return Ok(ord);
                    }
                }
                let ord = x.len.cmp(&y.len);
                if ord == Ordering::Equal {
                    same.insert((x, y));
                }
                Ok(ord)
            }
            _ => Err(FlatError::mismatch(a.kind_name(), b.kind_name())),
        }
    }

    /// Equality between an owned value and a reference into this buffer.
    pub(crate) fn eq_owned(&self, owned: &Value, b: Node) -> VResult<bool> {
        if let (Some(x), Some(y)) = (owned.number(), self.number(b)?) {
            return Ok(x.num_eq(y));
        }
        Ok(match (owned, b) {
            (Value::Empty, Node::Empty) => true,
            (Value::String(s), Node::String(off)) => s.as_bytes() == self.str_bytes(off)?,
            (Value::BitVector(bits), Node::BitVector(r)) => {
                bitvec::bits_eq(bits, &self.bits(r)?)
            }
            (Value::PrimVector(pv), Node::Vector(r)) => {
                if pv.len() != r.len as usize {
                    return Ok(false);
                }
                for (i, n) in pv.iter().enumerate() {
                    match self.number(self.vector_item(r, i as u32)?)? {
                        Some(m) if m.num_eq(n) => {}
                        _ => return Ok(false),
                    }
                }
                true
            }
            (Value::Vector(items), Node::Vector(r)) => {
                if items.len() != r.len as usize {
                    return Ok(false);
                }
                for (i, item) in items.iter().enumerate() {
                    if !self.eq_owned(item, self.vector_item(r, i as u32)?)? {
                        return Ok(false);
                    }
                }
                true
            }
            (Value::Set(items), Node::Set(t)) => {
                let items = crate::builder::dedup_set(items);
                self.owned_table_eq(items.iter().map(|&(k, h)| (k, None, h)), t, false)?
            }
            (Value::Map(pairs), Node::Map(t)) => {
                let pairs = crate::builder::dedup_map(pairs);
                self.owned_table_eq(pairs.iter().map(|&(k, v, h)| (k, Some(v), h)), t, true)?
            }
            _ => false,
        })
    }

    fn owned_table_eq<'v, I>(&self, entries: I, t: TableRef, is_map: bool) -> VResult<bool>
    where
        I: ExactSizeIterator<Item = (&'v Value, Option<&'v Value>, u32)>,
    {
        let Some(off) = t.0 else {
            return Ok(entries.len() == 0);
        };
        let head = self.table_head(off, is_map)?;
        if entries.len() != head.n_items as usize {
            return Ok(false);
        }
        for (key, value, h) in entries {
            let found = table::lookup(self, &head, h, |candidate| self.eq_owned(key, candidate))?;
            let Some(slot) = found else {
                return Ok(false);
            };
            if let Some(value) = value {
                let cell = self.slot_value(&head, slot)?;
                let stored = self.decode(cell, head.value_pos(slot) as u32)?;
                if !self.eq_owned(value, stored)? {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}
