//! Low-level building blocks shared by the builder and the reader.
//!
//! Includes byte utilities, the growable typed array and the generic
//! callback-driven sort engine.

/// Byte-level utilities and little-endian field access.
pub mod bytes;

/// Growable homogeneously typed array with amortized geometric growth.
pub mod dynarray;

/// Comparator/swap driven in-place quicksort.
pub mod sort;

/// Outstanding zero-copy view tracking.
pub mod export;
