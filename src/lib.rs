//! Relocatable, memory-mappable buffers of immutable structured values.
//!
//! A buffer holds one value tree (scalars, strings, bit vectors, typed and
//! generic vectors, maps and sets) laid out so that every reference is an
//! offset into the same bytes. [`Writer`] produces buffers from owned
//! [`Value`]s; [`Reader`] certifies a buffer with the validator and then
//! reads it in place, without deserializing.
//!
//! Builder-side [`PrimVector`] and [`BitVector`] are mutable, single-owner
//! structures with zero-copy exports guarded against resizing.

#![warn(missing_docs)]

mod access;
pub mod admin;
pub mod bitvec;
pub mod builder;
pub mod format;
pub mod primitives;
pub mod primvec;
pub mod reader;
pub mod table;
pub mod types;
pub mod validate;
pub mod value;

pub use bitvec::{BitVector, Bits};
pub use builder::{Value, Writer, WriterOptions};
pub use primvec::{PrimVector, ProjectionColumn};
pub use reader::{Key, OpenOptions, Reader};
pub use types::{ContainerId, FlatError, Offset, Result, ValidationError};
pub use validate::{validate, validate_with, ValidateOptions, ValidationSummary};
pub use value::{Number, PrimKind, Scalar, ValueKind, ValueRef};
