#![deny(unsafe_code)]
//! Read-only access to validated buffers.
//!
//! A [`Reader`] owns one buffer, either read into memory or mapped from a
//! file, and refuses every read until the validator has certified it. Reads
//! hand out [`ValueRef`]s: `Copy` offsets tagged with the identity of the
//! reader that produced them. A reference handed to another reader fails
//! with [`FlatError::ForeignReference`], and one used after
//! [`Reader::close`] fails with [`FlatError::Closed`] instead of touching
//! released memory. Borrowed views such as [`Reader::str`] tie their
//! lifetime to the reader, so the compiler keeps them from outliving the
//! buffer.
//!
//! A validated reader is `Send + Sync`; any number of threads may read
//! through a shared reference.

use std::cmp::Ordering;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::mem;
use std::path::Path;
use std::sync::atomic::{self, AtomicU64};

use memmap2::Mmap;
use tracing::debug;

use crate::access::{HashIndex, Raw};
use crate::bitvec::Bits;
use crate::builder::Value;
use crate::format::{tag, Header};
use crate::primvec::{PrimVector, ProjectionColumn};
use crate::table::{self, TableHead};
use crate::types::{ContainerId, FlatError, Result, ValidationError};
use crate::validate::{self, ValidateOptions, ValidationSummary, DEFAULT_MAX_DEPTH};
use crate::value::{Node, Number, PrimKind, Scalar, TableRef, ValueRef, VectorKind, VectorRef};

/// Source of reader identities; never reused within a process.
static NEXT_READER_ID: AtomicU64 = AtomicU64::new(1);

fn next_reader_id() -> u64 {
    NEXT_READER_ID.fetch_add(1, atomic::Ordering::Relaxed)
}

/// How a buffer is loaded and certified.
#[derive(Clone, Debug)]
pub struct OpenOptions {
    /// Map files instead of reading them into memory.
    pub use_mmap: bool,
    /// Verify the payload checksum when the header carries one.
    pub verify_checksum: bool,
    /// Deepest container nesting accepted by the validator.
    pub max_depth: usize,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            use_mmap: true,
            verify_checksum: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl OpenOptions {
    /// Enables or disables memory mapping.
    pub fn use_mmap(mut self, yes: bool) -> Self {
        self.use_mmap = yes;
        self
    }

    /// Enables or disables checksum verification.
    pub fn verify_checksum(mut self, yes: bool) -> Self {
        self.verify_checksum = yes;
        self
    }

    /// Sets the nesting limit.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    fn validate_options(&self) -> ValidateOptions {
        ValidateOptions::default()
            .max_depth(self.max_depth)
            .verify_checksum(self.verify_checksum)
    }

    /// Loads the file at `path` and validates it.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<Reader> {
        let mut reader = self.load(path)?;
        reader.validate()?;
        Ok(reader)
    }

    /// Takes ownership of `buf` and validates it.
    pub fn open_bytes(&self, buf: Vec<u8>) -> Result<Reader> {
        let mut reader = self.load_bytes(buf);
        reader.validate()?;
        Ok(reader)
    }

    /// Loads the file at `path` without validating it. Every read fails
    /// with [`FlatError::NotValidated`] until [`Reader::validate`] succeeds.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Reader> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let backing = if self.use_mmap && file_len > 0 {
            Backing::Mapped(map_file(&file)?)
        } else {
            let mut buf = Vec::with_capacity(file_len as usize);
            file.read_to_end(&mut buf)?;
            Backing::Owned(buf)
        };
        let reader = self.pending(backing);
        debug!(
            path = %path.display(),
            id = reader.id,
            mapped = matches!(reader.state, State::Pending(Backing::Mapped(_))),
            "reader.load"
        );
        Ok(reader)
    }

    /// Takes ownership of `buf` without validating it.
    pub fn load_bytes(&self, buf: Vec<u8>) -> Reader {
        self.pending(Backing::Owned(buf))
    }

    fn pending(&self, backing: Backing) -> Reader {
        Reader {
            id: next_reader_id(),
            opts: self.validate_options(),
            state: State::Pending(backing),
        }
    }
}

#[allow(unsafe_code)]
fn map_file(file: &File) -> Result<Mmap> {
    // SAFETY: the map is read-only and every access goes through the
    // bounds-checked accessors in `access`. The file must not be truncated
    // while the reader is open.
    let map = unsafe { Mmap::map(file)? };
    Ok(map)
}

enum Backing {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl Backing {
    fn bytes(&self) -> &[u8] {
        match self {
            Backing::Owned(buf) => buf,
            Backing::Mapped(map) => map,
        }
    }
}

/// A certified buffer and what validation learned about it.
struct Ready {
    backing: Backing,
    root: Node,
    summary: ValidationSummary,
    hashes: HashIndex,
}

enum State {
    Pending(Backing),
    Ready(Ready),
    Failed(ValidationError),
    Closed,
}

/// A key for map and set lookups: an owned value or a reference into the
/// same buffer.
#[derive(Copy, Clone, Debug)]
pub enum Key<'k> {
    /// An owned value.
    Owned(&'k Value),
    /// A value stored in the buffer being searched.
    Ref(ValueRef),
}

impl<'k> From<&'k Value> for Key<'k> {
    fn from(v: &'k Value) -> Self {
        Key::Owned(v)
    }
}

impl From<ValueRef> for Key<'static> {
    fn from(v: ValueRef) -> Self {
        Key::Ref(v)
    }
}

/// A key after its reference, if any, was checked against the reader.
#[derive(Copy, Clone)]
enum Needle<'k> {
    Owned(&'k Value),
    Stored(Node),
}

/// A validated, read-only buffer.
pub struct Reader {
    id: u64,
    opts: ValidateOptions,
    state: State,
}

impl fmt::Debug for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Pending(_) => "pending",
            State::Ready(_) => "ready",
            State::Failed(_) => "failed",
            State::Closed => "closed",
        };
        f.debug_struct("Reader")
            .field("id", &self.id)
            .field("state", &state)
            .finish()
    }
}

fn certify(
    buf: &[u8],
    opts: &ValidateOptions,
) -> std::result::Result<(Node, ValidationSummary, HashIndex), ValidationError> {
    let (summary, hashes) = validate::certify(buf, opts)?;
    let header = Header::decode(buf)?;
    let root = Raw::new(buf).decode(header.root, 16)?;
    Ok((root, summary, hashes))
}

impl Reader {
    /// Opens and validates the file at `path` with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Reader> {
        OpenOptions::default().open(path)
    }

    /// Validates `buf` with default options.
    pub fn from_bytes(buf: Vec<u8>) -> Result<Reader> {
        OpenOptions::default().open_bytes(buf)
    }

    /// Runs the validator if it has not run yet. A failure is sticky: the
    /// buffer is dropped and every later call reports the same error.
    pub fn validate(&mut self) -> Result<&ValidationSummary> {
        let state = mem::replace(&mut self.state, State::Closed);
        self.state = match state {
            State::Pending(backing) => match certify(backing.bytes(), &self.opts) {
                Ok((root, summary, hashes)) => {
                    debug!(id = self.id, len = summary.buffer_len, "reader.validated");
                    State::Ready(Ready {
                        backing,
                        root,
                        summary,
                        hashes,
                    })
                }
                Err(err) => {
                    debug!(id = self.id, error = %err, "reader.rejected");
                    State::Failed(err)
                }
            },
            other => other,
        };
        Ok(&self.ready()?.summary)
    }

    /// True once validation has succeeded and the reader is not closed.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    /// True after [`Reader::close`].
    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Releases the buffer. Every later call fails with
    /// [`FlatError::Closed`]; closing twice is harmless.
    pub fn close(&mut self) {
        if !self.is_closed() {
            debug!(id = self.id, "reader.close");
        }
        self.state = State::Closed;
    }

    fn ready(&self) -> Result<&Ready> {
        match &self.state {
            State::Ready(ready) => Ok(ready),
            State::Pending(_) => Err(FlatError::NotValidated),
            State::Failed(err) => Err(FlatError::Validation(err.clone())),
            State::Closed => Err(FlatError::Closed),
        }
    }

    fn raw(&self) -> Result<Raw<'_>> {
        let ready = self.ready()?;
        Ok(Raw::with_hashes(ready.backing.bytes(), &ready.hashes))
    }

    /// The node behind `v`, provided this reader produced it and is ready.
    fn node(&self, v: ValueRef) -> Result<Node> {
        self.ready()?;
        if v.origin() != self.id {
            return Err(FlatError::ForeignReference);
        }
        Ok(v.node())
    }

    fn resolve(&self, v: ValueRef) -> Result<(Raw<'_>, Node)> {
        let node = self.node(v)?;
        Ok((self.raw()?, node))
    }

    fn wrap(&self, node: Node) -> ValueRef {
        ValueRef::new(self.id, node)
    }

    /// What validation saw.
    pub fn summary(&self) -> Result<&ValidationSummary> {
        Ok(&self.ready()?.summary)
    }

    /// The validated bytes.
    pub fn as_bytes(&self) -> Result<&[u8]> {
        Ok(self.ready()?.backing.bytes())
    }

    /// The root value.
    pub fn root(&self) -> Result<ValueRef> {
        Ok(self.wrap(self.ready()?.root))
    }

    /// Empty, bool or number value of `v`.
    pub fn scalar(&self, v: ValueRef) -> Result<Scalar> {
        let (raw, node) = self.resolve(v)?;
        match node {
            Node::Empty => Ok(Scalar::Empty),
            Node::Bool(b) => Ok(Scalar::Bool(b)),
            _ => raw
                .number(node)?
                .map(Scalar::Number)
                .ok_or_else(|| FlatError::mismatch("scalar", node.kind_name())),
        }
    }

    /// Numeric value of a number or bool.
    pub fn number(&self, v: ValueRef) -> Result<Number> {
        let (raw, node) = self.resolve(v)?;
        raw.number(node)?
            .ok_or_else(|| FlatError::mismatch("number", node.kind_name()))
    }

    /// String contents, borrowed from the buffer.
    pub fn str(&self, v: ValueRef) -> Result<&str> {
        let (raw, node) = self.resolve(v)?;
        let Node::String(off) = node else {
            return Err(FlatError::mismatch("string", node.kind_name()));
        };
        std::str::from_utf8(raw.str_bytes(off)?)
            .map_err(|_| ValidationError::InvalidUtf8 { offset: off.0 }.into())
    }

    /// Read-only bit vector view; its mutators fail with
    /// [`FlatError::ReadOnly`].
    pub fn bitvector(&self, v: ValueRef) -> Result<Bits<'_>> {
        let (raw, node) = self.resolve(v)?;
        let Node::BitVector(b) = node else {
            return Err(FlatError::mismatch("bitvector", node.kind_name()));
        };
        Ok(Bits::Mapped(raw.bits(b)?))
    }

    /// Bit `i` of a bit vector.
    pub fn is_set(&self, v: ValueRef, i: u32) -> Result<bool> {
        self.bitvector(v)?.is_set(i)
    }

    fn vector_ref(&self, v: ValueRef) -> Result<(Raw<'_>, VectorRef)> {
        match self.resolve(v)? {
            (raw, Node::Vector(vr)) => Ok((raw, vr)),
            (_, other) => Err(FlatError::mismatch("vector", other.kind_name())),
        }
    }

    /// Element count of a vector.
    pub fn vector_len(&self, v: ValueRef) -> Result<u32> {
        Ok(self.vector_ref(v)?.1.len)
    }

    /// Element `i` of a vector.
    pub fn vector_item(&self, v: ValueRef, i: u32) -> Result<ValueRef> {
        let (raw, vr) = self.vector_ref(v)?;
        if i >= vr.len {
            return Err(FlatError::bounds(i, vr.len));
        }
        Ok(self.wrap(raw.vector_item(vr, i)?))
    }

    /// Elements `lo..hi` of a vector as a new reference onto the same
    /// bytes. A slice keeps the container id of its source.
    pub fn slice(&self, v: ValueRef, lo: u32, hi: u32) -> Result<ValueRef> {
        let (_, vr) = self.vector_ref(v)?;
        if hi > vr.len {
            return Err(FlatError::bounds(hi, vr.len));
        }
        if lo > hi {
            return Err(FlatError::bounds(lo, hi));
        }
        if vr.kind == VectorKind::Empty {
            return Ok(v);
        }
        let start = vr
            .start
            .checked_add(lo)
            .ok_or(FlatError::Capacity("slice start exceeds u32"))?;
        Ok(self.wrap(Node::Vector(VectorRef {
            start,
            len: hi - lo,
            ..vr
        })))
    }

    /// Iterates the elements of a vector.
    pub fn iter(&self, v: ValueRef) -> Result<VectorIter<'_>> {
        let (raw, vr) = self.vector_ref(v)?;
        Ok(VectorIter {
            raw,
            origin: self.id,
            v: vr,
            next: 0,
        })
    }

    /// Membership: element of a vector (linear scan), element of a set or
    /// key of a map.
    pub fn contains(&self, v: ValueRef, item: &Value) -> Result<bool> {
        let (raw, node) = self.resolve(v)?;
        match node {
            Node::Vector(vr) => {
                for i in 0..vr.len {
                    if raw.eq_owned(item, raw.vector_item(vr, i)?)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Node::Set(t) => Ok(self.find(t, false, Needle::Owned(item))?.is_some()),
            Node::Map(t) => Ok(self.find(t, true, Needle::Owned(item))?.is_some()),
            other => Err(FlatError::mismatch("container", other.kind_name())),
        }
    }

    fn needle<'k>(&self, key: Key<'k>) -> Result<Needle<'k>> {
        Ok(match key {
            Key::Owned(value) => Needle::Owned(value),
            Key::Ref(r) => Needle::Stored(self.node(r)?),
        })
    }

    fn find(
        &self,
        t: TableRef,
        is_map: bool,
        key: Needle<'_>,
    ) -> Result<Option<(TableHead, u32)>> {
        let raw = self.raw()?;
        let hash = match key {
            Needle::Owned(value) => value.hash(),
            Needle::Stored(node) => raw
                .hash(node)?
                .ok_or(FlatError::Unhashable(node.kind_name()))?,
        };
        let Some(off) = t.0 else {
            return Ok(None);
        };
        let head = raw.table_head(off, is_map)?;
        let slot = table::lookup(&raw, &head, hash, |candidate| match key {
            Needle::Owned(value) => raw.eq_owned(value, candidate),
            Needle::Stored(node) => raw.eq(node, candidate),
        })?;
        Ok(slot.map(|s| (head, s)))
    }

    /// Value stored under `key` in a map.
    pub fn map_get<'k>(&self, v: ValueRef, key: impl Into<Key<'k>>) -> Result<Option<ValueRef>> {
        let (raw, node) = self.resolve(v)?;
        let Node::Map(t) = node else {
            return Err(FlatError::mismatch("map", node.kind_name()));
        };
        let Some((head, slot)) = self.find(t, true, self.needle(key.into())?)? else {
            return Ok(None);
        };
        let cell = raw.slot_value(&head, slot)?;
        Ok(Some(self.wrap(raw.decode(cell, head.value_pos(slot) as u32)?)))
    }

    /// Whether a set holds `key`.
    pub fn set_contains<'k>(&self, v: ValueRef, key: impl Into<Key<'k>>) -> Result<bool> {
        let node = self.node(v)?;
        let Node::Set(t) = node else {
            return Err(FlatError::mismatch("set", node.kind_name()));
        };
        Ok(self.find(t, false, self.needle(key.into())?)?.is_some())
    }

    fn table(&self, v: ValueRef) -> Result<(Raw<'_>, TableRef, bool)> {
        match self.resolve(v)? {
            (raw, Node::Map(t)) => Ok((raw, t, true)),
            (raw, Node::Set(t)) => Ok((raw, t, false)),
            (_, other) => Err(FlatError::mismatch("map or set", other.kind_name())),
        }
    }

    /// Number of entries in a map or set.
    pub fn table_len(&self, v: ValueRef) -> Result<u32> {
        match self.table(v)? {
            (raw, TableRef(Some(off)), is_map) => Ok(raw.table_head(off, is_map)?.n_items),
            (_, TableRef(None), _) => Ok(0),
        }
    }

    /// Iterates the entries of a map or set in slot order. Set entries
    /// carry no value.
    pub fn entries(&self, v: ValueRef) -> Result<Entries<'_>> {
        let (raw, t, is_map) = self.table(v)?;
        let head = match t {
            TableRef(Some(off)) => Some(raw.table_head(off, is_map)?),
            TableRef(None) => None,
        };
        Ok(Entries {
            raw,
            origin: self.id,
            head,
            next: 0,
        })
    }

    /// Identity of a non-empty vector, map or set.
    pub fn container_id(&self, v: ValueRef) -> Result<Option<ContainerId>> {
        let (raw, node) = self.resolve(v)?;
        let off = match node {
            Node::Vector(vr) if vr.kind != VectorKind::Empty => vr.offset,
            Node::Map(TableRef(Some(off))) | Node::Set(TableRef(Some(off))) => off,
            _ => return Ok(None),
        };
        Ok(Some(ContainerId(raw.container_id(off)?)))
    }

    /// Whether `v` may be used as a map key or set element.
    pub fn is_hashable(&self, v: ValueRef) -> Result<bool> {
        Ok(!matches!(
            self.node(v)?,
            Node::Vector(VectorRef {
                kind: VectorKind::Value { hashable: false },
                ..
            })
        ))
    }

    /// Type code of a primitive vector, e.g. `"i16"`.
    pub fn typecode(&self, v: ValueRef) -> Result<&'static str> {
        match self.node(v)? {
            Node::Vector(VectorRef {
                kind: VectorKind::Prim(kind),
                ..
            }) => Ok(kind.typecode()),
            other => Err(FlatError::mismatch("primvector", other.kind_name())),
        }
    }

    /// Canonical hash of `v`.
    pub fn hash(&self, v: ValueRef) -> Result<u32> {
        let (raw, node) = self.resolve(v)?;
        raw.hash(node)?.ok_or(FlatError::Unhashable(node.kind_name()))
    }

    /// Value equality between two references into this buffer.
    pub fn eq(&self, a: ValueRef, b: ValueRef) -> Result<bool> {
        let (raw, a) = self.resolve(a)?;
        Ok(raw.eq(a, self.node(b)?)?)
    }

    /// Value equality between a reference and an owned value.
    pub fn eq_value(&self, a: ValueRef, b: &Value) -> Result<bool> {
        let (raw, a) = self.resolve(a)?;
        Ok(raw.eq_owned(b, a)?)
    }

    /// Ordering of numbers, strings, bit vectors and vectors.
    pub fn compare(&self, a: ValueRef, b: ValueRef) -> Result<Ordering> {
        let (raw, a) = self.resolve(a)?;
        raw.compare(a, self.node(b)?)
    }

    /// Copies `v` and everything below it into an owned value.
    pub fn to_value(&self, v: ValueRef) -> Result<Value> {
        let (raw, node) = self.resolve(v)?;
        Ok(match node {
            Node::Empty => Value::Empty,
            Node::Bool(b) => Value::Bool(b),
            Node::I8(x) => Value::I8(x),
            Node::U8(x) => Value::U8(x),
            Node::I16(x) => Value::I16(x),
            Node::U16(x) => Value::U16(x),
            Node::I32(x) => Value::I32(x),
            Node::U32(x) => Value::U32(x),
            Node::I64(off) => Value::I64(raw.i64_at(off)?),
            Node::U64(off) => Value::U64(raw.u64_record(off)?),
            Node::F32(f) => Value::F32(f),
            Node::String(_) => Value::String(self.str(v)?.to_owned()),
            Node::BitVector(b) => Value::BitVector(raw.bits(b)?.to_owned()?),
            Node::Vector(vr) => match vr.kind {
                VectorKind::Empty => Value::Vector(Vec::new()),
                VectorKind::Prim(kind) => {
                    let column = self.prim_column(v)?;
                    let numbers = (0..column.len()).map(|i| column.number_at(i));
                    Value::PrimVector(PrimVector::from_numbers(kind, numbers)?)
                }
                VectorKind::Value { .. } => Value::Vector(
                    self.iter(v)?
                        .map(|item| self.to_value(item?))
                        .collect::<Result<_>>()?,
                ),
            },
            Node::Map(_) => Value::Map(
                self.entries(v)?
                    .map(|entry| {
                        let (k, val) = entry?;
                        let val = val.unwrap_or_else(|| self.wrap(Node::Empty));
                        Ok((self.to_value(k)?, self.to_value(val)?))
                    })
                    .collect::<Result<_>>()?,
            ),
            Node::Set(_) => Value::Set(
                self.entries(v)?
                    .map(|entry| self.to_value(entry?.0))
                    .collect::<Result<_>>()?,
            ),
        })
    }

    /// A primitive vector as a projection-sort column, read in place.
    pub fn prim_column(&self, v: ValueRef) -> Result<PrimColumn<'_>> {
        let (raw, vr) = self.vector_ref(v)?;
        let kind = match vr.kind {
            VectorKind::Prim(kind) => kind,
            VectorKind::Empty => PrimKind::U8,
            VectorKind::Value { .. } => return Err(FlatError::mismatch("primvector", "vector")),
        };
        Ok(PrimColumn {
            kind,
            bytes: raw.vector_items(vr)?,
        })
    }
}

/// Iterator over the elements of a serialized vector.
pub struct VectorIter<'a> {
    raw: Raw<'a>,
    origin: u64,
    v: VectorRef,
    next: u32,
}

impl Iterator for VectorIter<'_> {
    type Item = Result<ValueRef>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.v.len {
            return None;
        }
        let i = self.next;
        self.next += 1;
        let item = self.raw.vector_item(self.v, i);
        Some(item.map(|node| ValueRef::new(self.origin, node)).map_err(FlatError::from))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.v.len - self.next) as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for VectorIter<'_> {}

/// Iterator over the occupied slots of a serialized map or set.
pub struct Entries<'a> {
    raw: Raw<'a>,
    origin: u64,
    head: Option<TableHead>,
    next: u32,
}

impl Entries<'_> {
    fn entry(&self, head: &TableHead, slot: u32) -> Result<(ValueRef, Option<ValueRef>)> {
        let key = self.raw.slot_key(head, slot)?;
        let key = self.raw.decode(key, head.key_pos(slot) as u32)?;
        let value = if head.is_map {
            let cell = self.raw.slot_value(head, slot)?;
            Some(self.raw.decode(cell, head.value_pos(slot) as u32)?)
        } else {
            None
        };
        let wrap = |node| ValueRef::new(self.origin, node);
        Ok((wrap(key), value.map(wrap)))
    }
}

impl Iterator for Entries<'_> {
    type Item = Result<(ValueRef, Option<ValueRef>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let head = self.head?;
        while self.next < head.capacity {
            let slot = self.next;
            self.next += 1;
            match self.raw.slot_key(&head, slot) {
                Ok(cell) if cell.tag == tag::UNUSED_SLOT => continue,
                Ok(_) => return Some(self.entry(&head, slot)),
                Err(err) => return Some(Err(err.into())),
            }
        }
        None
    }
}

/// A serialized primitive vector viewed as a projection-sort column.
#[derive(Copy, Clone, Debug)]
pub struct PrimColumn<'a> {
    kind: PrimKind,
    bytes: &'a [u8],
}

impl PrimColumn<'_> {
    /// Element kind.
    pub fn kind(&self) -> PrimKind {
        self.kind
    }
}

impl ProjectionColumn for PrimColumn<'_> {
    fn len(&self) -> usize {
        self.bytes.len() / self.kind.item_size()
    }

    fn number_at(&self, i: usize) -> Number {
        let size = self.kind.item_size();
        self.kind.decode(&self.bytes[i * size..(i + 1) * size])
    }
}
