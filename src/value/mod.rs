#![forbid(unsafe_code)]
//! Value kinds and the tagged references the reader hands out.
//!
//! Internally a decoded cell is a closed enum carrying an inline scalar or
//! the offset of a record. The public [`ValueRef`] wraps it together with
//! the identity of the reader that decoded it.

use std::fmt;

use crate::types::Offset;

/// Canonical value hashing shared by the builder and the reader.
pub mod hash;
mod number;

pub use number::Number;

/// The nine primitive element kinds of typed vectors.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum PrimKind {
    /// Signed 8-bit.
    I8,
    /// Unsigned 8-bit.
    U8,
    /// Signed 16-bit.
    I16,
    /// Unsigned 16-bit.
    U16,
    /// Signed 32-bit.
    I32,
    /// Unsigned 32-bit.
    U32,
    /// Signed 64-bit.
    I64,
    /// Unsigned 64-bit.
    U64,
    /// IEEE-754 binary32.
    F32,
}

impl PrimKind {
    /// Every kind, ordered by code.
    pub const ALL: [PrimKind; 9] = [
        PrimKind::I8,
        PrimKind::U8,
        PrimKind::I16,
        PrimKind::U16,
        PrimKind::I32,
        PrimKind::U32,
        PrimKind::I64,
        PrimKind::U64,
        PrimKind::F32,
    ];

    /// Stable numeric code used in serialized blobs.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Inverse of [`PrimKind::code`].
    pub fn from_code(code: u32) -> Option<PrimKind> {
        PrimKind::ALL.get(code as usize).copied()
    }

    /// Bytes per element.
    pub const fn item_size(self) -> usize {
        match self {
            PrimKind::I8 | PrimKind::U8 => 1,
            PrimKind::I16 | PrimKind::U16 => 2,
            PrimKind::I32 | PrimKind::U32 | PrimKind::F32 => 4,
            PrimKind::I64 | PrimKind::U64 => 8,
        }
    }

    /// Short type code, e.g. `"i8"` or `"f"`.
    pub const fn typecode(self) -> &'static str {
        match self {
            PrimKind::I8 => "i8",
            PrimKind::U8 => "u8",
            PrimKind::I16 => "i16",
            PrimKind::U16 => "u16",
            PrimKind::I32 => "i32",
            PrimKind::U32 => "u32",
            PrimKind::I64 => "i64",
            PrimKind::U64 => "u64",
            PrimKind::F32 => "f",
        }
    }

    /// Parses a type code produced by [`PrimKind::typecode`].
    pub fn from_typecode(code: &str) -> Option<PrimKind> {
        PrimKind::ALL.into_iter().find(|k| k.typecode() == code)
    }

    /// True for the unsigned integer kinds.
    pub const fn is_unsigned(self) -> bool {
        matches!(
            self,
            PrimKind::U8 | PrimKind::U16 | PrimKind::U32 | PrimKind::U64
        )
    }

    /// True for `F32`.
    pub const fn is_float(self) -> bool {
        matches!(self, PrimKind::F32)
    }

    /// Decodes one little-endian element. `bytes` must be `item_size()` long.
    pub fn decode(self, bytes: &[u8]) -> Number {
        let mut raw = [0u8; 8];
        raw[..bytes.len()].copy_from_slice(bytes);
        let word = u64::from_le_bytes(raw);
        match self {
            PrimKind::I8 => Number::Int(word as u8 as i8 as i64),
            PrimKind::I16 => Number::Int(word as u16 as i16 as i64),
            PrimKind::I32 => Number::Int(word as u32 as i32 as i64),
            PrimKind::I64 => Number::Int(word as i64),
            PrimKind::U8 | PrimKind::U16 | PrimKind::U32 | PrimKind::U64 => Number::UInt(word),
            PrimKind::F32 => Number::Float(f32::from_bits(word as u32)),
        }
    }

    /// Encodes `value` if it is representable in this kind without loss
    /// of integrality or range. Floats accept any number.
    pub fn encode(self, value: Number) -> Option<[u8; 8]> {
        let mut out = [0u8; 8];
        if let PrimKind::F32 = self {
            let f = match value {
                Number::Float(f) => f,
                Number::Int(v) => v as f32,
                Number::UInt(v) => v as f32,
            };
            out[..4].copy_from_slice(&f.to_bits().to_le_bytes());
            return Some(out);
        }
        let v = value.as_i128()?;
        let (lo, hi): (i128, i128) = match self {
            PrimKind::I8 => (i8::MIN as i128, i8::MAX as i128),
            PrimKind::U8 => (0, u8::MAX as i128),
            PrimKind::I16 => (i16::MIN as i128, i16::MAX as i128),
            PrimKind::U16 => (0, u16::MAX as i128),
            PrimKind::I32 => (i32::MIN as i128, i32::MAX as i128),
            PrimKind::U32 => (0, u32::MAX as i128),
            PrimKind::I64 => (i64::MIN as i128, i64::MAX as i128),
            PrimKind::U64 => (0, u64::MAX as i128),
            PrimKind::F32 => unreachable!("handled above"),
        };
        if v < lo || v > hi {
            return None;
        }
        let bytes = (v as u64).to_le_bytes();
        out[..self.item_size()].copy_from_slice(&bytes[..self.item_size()]);
        Some(out)
    }
}

impl fmt::Display for PrimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.typecode())
    }
}

/// Coarse classification of a value, used in errors and statistics.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ValueKind {
    /// The empty value.
    Empty,
    /// A boolean.
    Bool,
    /// Any integer or float scalar.
    Number,
    /// A string.
    String,
    /// A bit vector in any encoding.
    BitVector,
    /// A typed primitive vector.
    PrimVector,
    /// A generic vector of values.
    Vector,
    /// A map.
    Map,
    /// A set.
    Set,
}

impl ValueKind {
    /// Lower-case name.
    pub const fn name(self) -> &'static str {
        match self {
            ValueKind::Empty => "empty",
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::BitVector => "bitvector",
            ValueKind::PrimVector => "primvector",
            ValueKind::Vector => "vector",
            ValueKind::Map => "map",
            ValueKind::Set => "set",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Storage shape of a serialized bit vector.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) enum BitsRef {
    /// Packed record at the offset.
    Packed(Offset),
    /// All zero; inline bit count.
    Zeros(u32),
    /// All one; inline bit count.
    Ones(u32),
    /// Zeros then ones; record of two counts.
    ZerosOnes(Offset),
    /// Ones then zeros; record of two counts.
    OnesZeros(Offset),
}

/// Element representation of a vector.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) enum VectorKind {
    /// The typeless empty vector.
    Empty,
    /// Packed primitive elements.
    Prim(PrimKind),
    /// Value cells.
    Value {
        /// Every element is hashable.
        hashable: bool,
    },
}

/// A vector reference, possibly a window onto a larger record.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct VectorRef {
    /// Element representation.
    pub(crate) kind: VectorKind,
    /// Record start; unused for [`VectorKind::Empty`].
    pub(crate) offset: Offset,
    /// First element of the window.
    pub(crate) start: u32,
    /// Number of elements in the window.
    pub(crate) len: u32,
}

impl VectorRef {
    pub(crate) const EMPTY: VectorRef = VectorRef {
        kind: VectorKind::Empty,
        offset: Offset(0),
        start: 0,
        len: 0,
    };
}

/// A map or set reference; `None` marks the inline empty form.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct TableRef(pub(crate) Option<Offset>);

/// A decoded cell: an inline scalar or the position of a record.
///
/// Meaningless without the buffer it was decoded from; only ever resolved
/// through bounds-checked accessors.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum Node {
    Empty,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    /// Signed 64-bit record.
    I64(Offset),
    /// Unsigned 64-bit record.
    U64(Offset),
    F32(f32),
    /// String record.
    String(Offset),
    BitVector(BitsRef),
    /// Primitive or generic vector.
    Vector(VectorRef),
    Map(TableRef),
    Set(TableRef),
}

impl Node {
    pub(crate) fn kind(&self) -> ValueKind {
        match self {
            Node::Empty => ValueKind::Empty,
            Node::Bool(_) => ValueKind::Bool,
            Node::I8(_)
            | Node::U8(_)
            | Node::I16(_)
            | Node::U16(_)
            | Node::I32(_)
            | Node::U32(_)
            | Node::I64(_)
            | Node::U64(_)
            | Node::F32(_) => ValueKind::Number,
            Node::String(_) => ValueKind::String,
            Node::BitVector(_) => ValueKind::BitVector,
            Node::Vector(v) => match v.kind {
                VectorKind::Prim(_) => ValueKind::PrimVector,
                _ => ValueKind::Vector,
            },
            Node::Map(_) => ValueKind::Map,
            Node::Set(_) => ValueKind::Set,
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        self.kind().name()
    }
}

/// A typed reference into the buffer of one [`Reader`](crate::Reader).
///
/// References are `Copy` and cheap. Each one remembers which reader
/// produced it: handing it to a different reader fails with
/// [`FlatError::ForeignReference`](crate::FlatError::ForeignReference), and
/// the producing reader refuses it with
/// [`FlatError::Closed`](crate::FlatError::Closed) once closed.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ValueRef {
    origin: u64,
    node: Node,
}

impl ValueRef {
    pub(crate) fn new(origin: u64, node: Node) -> Self {
        Self { origin, node }
    }

    pub(crate) fn origin(&self) -> u64 {
        self.origin
    }

    pub(crate) fn node(&self) -> Node {
        self.node
    }

    /// Coarse kind of the referenced value.
    pub fn kind(&self) -> ValueKind {
        self.node.kind()
    }

    /// Kind name for error messages.
    pub fn kind_name(&self) -> &'static str {
        self.node.kind_name()
    }
}

/// A decoded scalar.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Scalar {
    /// The empty value.
    Empty,
    /// A boolean.
    Bool(bool),
    /// An integer or float.
    Number(Number),
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.num_eq(*other)
    }
}
