#![forbid(unsafe_code)]
//! Owned value trees and the serializer that lays them out as buffers.
//!
//! [`Writer::serialize`] writes children before parents, so every cell
//! points backwards at an already written record. Empty containers and
//! constant bit vectors are stored inline in their cells.

use std::cmp::Ordering;
use std::path::Path;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::bitvec::{self, BitSource, BitVector};
use crate::format::{self, tag, Cell, Header, FLAG_CHECKSUM, HEADER_LEN, VERSION};
use crate::primitives::bytes::{align, le};
use crate::primvec::PrimVector;
use crate::table;
use crate::types::checksum::payload_crc32;
use crate::types::{FlatError, Result};
use crate::value::hash::{self, BagHasher, SeqHasher};
use crate::value::Number;

/// An owned value, the input to [`Writer::serialize`].
#[derive(Clone, Debug)]
pub enum Value {
    /// The empty value.
    Empty,
    /// A boolean.
    Bool(bool),
    /// Signed 8-bit.
    I8(i8),
    /// Unsigned 8-bit.
    U8(u8),
    /// Signed 16-bit.
    I16(i16),
    /// Unsigned 16-bit.
    U16(u16),
    /// Signed 32-bit.
    I32(i32),
    /// Unsigned 32-bit.
    U32(u32),
    /// Signed 64-bit.
    I64(i64),
    /// Unsigned 64-bit.
    U64(u64),
    /// Float32.
    F32(f32),
    /// A string.
    String(String),
    /// A bit vector.
    BitVector(BitVector),
    /// A typed primitive vector.
    PrimVector(PrimVector),
    /// A generic vector.
    Vector(Vec<Value>),
    /// Key/value pairs; for duplicate keys the last value wins.
    Map(Vec<(Value, Value)>),
    /// Elements; duplicates collapse.
    Set(Vec<Value>),
}

impl Value {
    /// Numeric value of a bool or number.
    pub fn number(&self) -> Option<Number> {
        Some(match *self {
            Value::Bool(b) => Number::UInt(b as u64),
            Value::I8(x) => Number::Int(x as i64),
            Value::I16(x) => Number::Int(x as i64),
            Value::I32(x) => Number::Int(x as i64),
            Value::I64(x) => Number::Int(x),
            Value::U8(x) => Number::UInt(x as u64),
            Value::U16(x) => Number::UInt(x as u64),
            Value::U32(x) => Number::UInt(x as u64),
            Value::U64(x) => Number::UInt(x),
            Value::F32(f) => Number::Float(f),
            _ => return None,
        })
    }

    /// Lower-case kind name.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Empty => "empty",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::BitVector(_) => "bitvector",
            Value::PrimVector(_) => "primvector",
            Value::Vector(_) => "vector",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            _ => "number",
        }
    }

    /// Canonical hash; equal to the hash of the same value once serialized.
    pub fn hash(&self) -> u32 {
        if let Some(n) = self.number() {
            return hash::number(n);
        }
        match self {
            Value::Empty => hash::empty(),
            Value::String(s) => hash::string(s.as_bytes()),
            Value::BitVector(bits) => bitvec::hash_32(bits),
            Value::PrimVector(pv) => {
                let mut h = SeqHasher::new();
                pv.iter().for_each(|n| h.push(hash::number(n)));
                h.finish()
            }
            Value::Vector(items) => {
                let mut h = SeqHasher::new();
                items.iter().for_each(|v| h.push(v.hash()));
                h.finish()
            }
            Value::Set(items) => {
                let mut h = BagHasher::set();
                for (_, item_hash) in dedup_set(items) {
                    h.push(item_hash);
                }
                h.finish()
            }
            Value::Map(pairs) => {
                let mut h = BagHasher::map();
                for (_, _, key_hash) in dedup_map(pairs) {
                    h.push(key_hash);
                }
                h.finish()
            }
            _ => unreachable!("numbers handled above"),
        }
    }

    /// Ordering for numbers, strings, bit vectors and vectors.
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        if let (Some(x), Some(y)) = (self.number(), other.number()) {
            return Ok(x.sort_cmp(y));
        }
        match (self, other) {
            (Value::String(a), Value::String(b)) => Ok(a.as_bytes().cmp(b.as_bytes())),
            (Value::BitVector(a), Value::BitVector(b)) => Ok(a.cmp(b)),
            _ => match (self.seq(), other.seq()) {
                (Some(a), Some(b)) => {
                    for (x, y) in a.iter().zip(b.iter()) {
                        let ord = x.compare(y)?;
                        if ord != Ordering::Equal {
                            return Ok(ord);
                        }
                    }
                    Ok(a.len().cmp(&b.len()))
                }
                _ => Err(FlatError::mismatch(self.kind_name(), other.kind_name())),
            },
        }
    }

    /// Elements of a primitive or generic vector as values.
    fn seq(&self) -> Option<Vec<Value>> {
        match self {
            Value::Vector(items) => Some(items.clone()),
            Value::PrimVector(pv) => Some(pv.iter().map(Value::from).collect()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        if let (Some(x), Some(y)) = (self.number(), other.number()) {
            return x.num_eq(y);
        }
        match (self, other) {
            (Value::Empty, Value::Empty) => true,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::BitVector(a), Value::BitVector(b)) => a == b,
            (Value::PrimVector(a), Value::PrimVector(b)) => a == b,
            (Value::Vector(a), Value::Vector(b)) => a == b,
            (Value::PrimVector(p), Value::Vector(v)) | (Value::Vector(v), Value::PrimVector(p)) => {
                p.len() == v.len()
                    && p
                        .iter()
                        .zip(v)
                        .all(|(n, item)| item.number().is_some_and(|m| m.num_eq(n)))
            }
            (Value::Set(a), Value::Set(b)) => {
                let (a, b) = (dedup_set(a), dedup_set(b));
                a.len() == b.len()
                    && a.iter()
                        .all(|(x, hx)| b.iter().any(|(y, hy)| hx == hy && x == y))
            }
            (Value::Map(a), Value::Map(b)) => {
                let (a, b) = (dedup_map(a), dedup_map(b));
                a.len() == b.len()
                    && a.iter().all(|(ka, va, ha)| {
                        b.iter()
                            .any(|(kb, vb, hb)| ha == hb && ka == kb && va == vb)
                    })
            }
            _ => false,
        }
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::$variant(v)
            }
        })*
    };
}

value_from!(
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    String => String,
    BitVector => BitVector,
    PrimVector => PrimVector,
    Vec<Value> => Vector,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(v) => Value::I64(v),
            Number::UInt(v) => Value::U64(v),
            Number::Float(f) => Value::F32(f),
        }
    }
}

/// Distinct set elements with their hashes, in first-seen order.
pub(crate) fn dedup_set(items: &[Value]) -> Vec<(&Value, u32)> {
    let mut seen: FxHashMap<u32, Vec<usize>> = FxHashMap::default();
    let mut out: Vec<(&Value, u32)> = Vec::with_capacity(items.len());
    for item in items {
        let h = item.hash();
        let bucket = seen.entry(h).or_default();
        if bucket.iter().any(|&i| out[i].0 == item) {
            continue;
        }
        bucket.push(out.len());
        out.push((item, h));
    }
    out
}

/// Distinct map keys with their last value and key hash, in first-seen
/// key order.
pub(crate) fn dedup_map(pairs: &[(Value, Value)]) -> Vec<(&Value, &Value, u32)> {
    let mut seen: FxHashMap<u32, Vec<usize>> = FxHashMap::default();
    let mut out: Vec<(&Value, &Value, u32)> = Vec::with_capacity(pairs.len());
    for (key, value) in pairs {
        let h = key.hash();
        let bucket = seen.entry(h).or_default();
        if let Some(&i) = bucket.iter().find(|&&i| out[i].0 == key) {
            out[i].1 = value;
            continue;
        }
        bucket.push(out.len());
        out.push((key, value, h));
    }
    out
}

/// Knobs for [`Writer`].
#[derive(Clone, Debug)]
pub struct WriterOptions {
    /// Highest ratio of items to slots in a hash table.
    pub max_load_factor: f64,
    /// Store a CRC32 of the payload in the header.
    pub checksum: bool,
    /// Mark generic vectors hashable when all their elements are.
    pub hashable_vectors: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            max_load_factor: table::DEFAULT_MAX_LOAD,
            checksum: true,
            hashable_vectors: true,
        }
    }
}

impl WriterOptions {
    /// Sets the maximum load factor; [`Writer::serialize`] rejects values outside `(0, 1]`.
    pub fn max_load_factor(mut self, load: f64) -> Self {
        self.max_load_factor = load;
        self
    }

    /// Enables or disables the payload checksum.
    pub fn checksum(mut self, yes: bool) -> Self {
        self.checksum = yes;
        self
    }

    /// Enables or disables hashable marking of generic vectors. With it
    /// off, every generic vector is written unhashable and cannot be used
    /// as a map key or set element.
    pub fn hashable_vectors(mut self, yes: bool) -> Self {
        self.hashable_vectors = yes;
        self
    }
}

/// Serializes owned values into self-contained buffers.
#[derive(Clone, Debug, Default)]
pub struct Writer {
    opts: WriterOptions,
}

impl Writer {
    /// Writer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer with `opts`.
    pub fn with_options(opts: WriterOptions) -> Self {
        Self { opts }
    }

    /// Lays out `root` as a buffer.
    pub fn serialize(&self, root: &Value) -> Result<Vec<u8>> {
        let load = if self.opts.max_load_factor > 0.0 && self.opts.max_load_factor <= 1.0 {
            self.opts.max_load_factor
        } else {
            return Err(FlatError::Invalid("max load factor must be in (0, 1]"));
        };
        let mut out = Out {
            buf: vec![0u8; HEADER_LEN],
            next_id: 0,
            load,
            hashable_vectors: self.opts.hashable_vectors,
        };
        let root_cell = out.write(root)?;
        let total_len = u32::try_from(out.buf.len())
            .map_err(|_| FlatError::Capacity("buffer would exceed 2**32-1 bytes"))?;
        let mut header = Header {
            version: VERSION,
            flags: 0,
            n_containers: out.next_id,
            root: root_cell,
            checksum: 0,
            total_len,
        };
        if self.opts.checksum {
            header.flags |= FLAG_CHECKSUM;
            header.checksum = payload_crc32(&out.buf[HEADER_LEN..]);
        }
        header.encode(&mut out.buf);
        debug!(
            len = total_len,
            containers = header.n_containers,
            "writer.serialize"
        );
        Ok(out.buf)
    }

    /// Serializes `root` into the file at `path`.
    pub fn write_file(&self, root: &Value, path: impl AsRef<Path>) -> Result<()> {
        let buf = self.serialize(root)?;
        std::fs::write(path, buf)?;
        Ok(())
    }
}

struct Out {
    buf: Vec<u8>,
    next_id: u32,
    load: f64,
    hashable_vectors: bool,
}

impl Out {
    fn here(&mut self, alignment: usize) -> Result<u32> {
        align::pad(&mut self.buf, alignment);
        u32::try_from(self.buf.len())
            .map_err(|_| FlatError::Capacity("buffer would exceed 2**32-1 bytes"))
    }

    fn container_id(&mut self) -> Result<u32> {
        let id = self.next_id;
        self.next_id = id
            .checked_add(1)
            .ok_or(FlatError::Capacity("too many containers"))?;
        Ok(id)
    }

    fn len32(n: usize) -> Result<u32> {
        u32::try_from(n).map_err(|_| FlatError::Capacity("length would exceed 2**32-1"))
    }

    fn write(&mut self, v: &Value) -> Result<Cell> {
        Ok(match v {
            Value::Empty => Cell::new(tag::EMPTY, 0),
            Value::Bool(b) => Cell::new(tag::BOOL, *b as u32),
            Value::I8(x) => Cell::new(tag::I8, *x as i32 as u32),
            Value::U8(x) => Cell::new(tag::U8, *x as u32),
            Value::I16(x) => Cell::new(tag::I16, *x as i32 as u32),
            Value::U16(x) => Cell::new(tag::U16, *x as u32),
            Value::I32(x) => Cell::new(tag::I32, *x as u32),
            Value::U32(x) => Cell::new(tag::U32, *x),
            Value::F32(f) => Cell::new(tag::F32, f.to_bits()),
            Value::I64(x) => {
                let off = self.here(8)?;
                le::put_u64(&mut self.buf, *x as u64);
                Cell::new(tag::I64, off)
            }
            Value::U64(x) => {
                let off = self.here(8)?;
                le::put_u64(&mut self.buf, *x);
                Cell::new(tag::U64, off)
            }
            Value::String(s) => {
                let n = Self::len32(s.len())?;
                let off = self.here(4)?;
                le::put_u32(&mut self.buf, n);
                self.buf.extend_from_slice(s.as_bytes());
                Cell::new(tag::STRING, off)
            }
            Value::BitVector(bits) => self.write_bits(bits)?,
            Value::PrimVector(pv) => {
                if pv.is_empty() {
                    return Ok(Cell::new(tag::VECTOR_EMPTY, 0));
                }
                let n = Self::len32(pv.len())?;
                let off = self.here(8)?;
                let id = self.container_id()?;
                le::put_u32(&mut self.buf, id);
                le::put_u32(&mut self.buf, n);
                self.buf.extend_from_slice(pv.as_bytes());
                Cell::new(format::prim_vector_tag(pv.kind()), off)
            }
            Value::Vector(items) => {
                if items.is_empty() {
                    return Ok(Cell::new(tag::VECTOR_EMPTY, 0));
                }
                let n = Self::len32(items.len())?;
                let cells = items
                    .iter()
                    .map(|item| self.write(item))
                    .collect::<Result<Vec<_>>>()?;
                let hashable =
                    self.hashable_vectors && cells.iter().all(|c| c.tag != tag::VECTOR_VALUE);
                let off = self.here(8)?;
                let id = self.container_id()?;
                le::put_u32(&mut self.buf, id);
                le::put_u32(&mut self.buf, n);
                cells.into_iter().for_each(|c| c.put(&mut self.buf));
                let t = if hashable {
                    tag::VECTOR_VALUE_HASHABLE
                } else {
                    tag::VECTOR_VALUE
                };
                Cell::new(t, off)
            }
            Value::Set(items) => {
                let entries = dedup_set(items);
                if entries.is_empty() {
                    return Ok(Cell::new(tag::SET_EMPTY, 0));
                }
                let mut slots = Vec::with_capacity(entries.len());
                for (item, h) in entries {
                    slots.push((h, self.write_key(item)?, None));
                }
                self.write_table(slots, false)?
            }
            Value::Map(pairs) => {
                let entries = dedup_map(pairs);
                if entries.is_empty() {
                    return Ok(Cell::new(tag::MAP_EMPTY, 0));
                }
                let mut slots = Vec::with_capacity(entries.len());
                for (key, value, h) in entries {
                    let key_cell = self.write_key(key)?;
                    slots.push((h, key_cell, Some(self.write(value)?)));
                }
                self.write_table(slots, true)?
            }
        })
    }

    fn write_key(&mut self, key: &Value) -> Result<Cell> {
        let cell = self.write(key)?;
        if cell.tag == tag::VECTOR_VALUE {
            return Err(FlatError::Unhashable(key.kind_name()));
        }
        Ok(cell)
    }

    fn write_bits(&mut self, bits: &BitVector) -> Result<Cell> {
        let n = bits.len();
        let ones = bits.n_ones();
        if ones == 0 {
            return Ok(Cell::new(tag::BITVECTOR_ZEROS, n));
        }
        if ones == n {
            return Ok(Cell::new(tag::BITVECTOR_ONES, n));
        }
        let leading = bits.iter().take_while(|&b| b == bits.bit(0)).count() as u32;
        let (first, second) = (leading, n - leading);
        let run_tag = if bits.bit(0) && ones == first {
            Some(tag::BITVECTOR_ONES_ZEROS)
        } else if !bits.bit(0) && ones == second {
            Some(tag::BITVECTOR_ZEROS_ONES)
        } else {
            None
        };
        let off = self.here(4)?;
        match run_tag {
            Some(t) => {
                le::put_u32(&mut self.buf, first);
                le::put_u32(&mut self.buf, second);
                Ok(Cell::new(t, off))
            }
            None => {
                le::put_u32(&mut self.buf, n);
                self.buf.extend_from_slice(bits.as_bytes());
                Ok(Cell::new(tag::BITVECTOR, off))
            }
        }
    }

    fn write_table(
        &mut self,
        entries: Vec<(u32, Cell, Option<Cell>)>,
        is_map: bool,
    ) -> Result<Cell> {
        let n = Self::len32(entries.len())?;
        let cap = table::capacity_for(n, self.load)
            .ok_or(FlatError::Capacity("hash table too large"))?;
        let mut hashes = vec![0u32; cap as usize];
        let mut keys = vec![Cell::new(tag::UNUSED_SLOT, 0); cap as usize];
        let mut values = vec![Cell::new(tag::EMPTY, 0); if is_map { cap as usize } else { 0 }];
        for (h, key, value) in entries {
            let slot = (0..cap)
                .map(|attempt| table::probe(h, cap, attempt))
                .find(|&s| keys[s as usize].tag == tag::UNUSED_SLOT)
                .ok_or(FlatError::Capacity("hash table full"))?;
            hashes[slot as usize] = h;
            keys[slot as usize] = key;
            if let Some(value) = value {
                values[slot as usize] = value;
            }
        }
        let off = self.here(4)?;
        let id = self.container_id()?;
        le::put_u32(&mut self.buf, id);
        le::put_u32(&mut self.buf, n);
        le::put_u32(&mut self.buf, cap);
        hashes.into_iter().for_each(|h| le::put_u32(&mut self.buf, h));
        keys.into_iter().for_each(|c| c.put(&mut self.buf));
        values.into_iter().for_each(|c| c.put(&mut self.buf));
        Ok(Cell::new(if is_map { tag::MAP } else { tag::SET }, off))
    }
}
