#![forbid(unsafe_code)]

//! Buffer file administration utilities.
//!
//! Offline checks and reports over serialized buffer files, used by the
//! `flatval` binary.

mod error;
mod stats;
mod verify;

/// Error types for administrative operations.
pub use error::{AdminError, Result};

/// Header and content statistics of a buffer file.
pub use stats::{stats, FileSection, HeaderSection, StatsReport};

/// Buffer file integrity verification.
///
/// Validates the buffer and, at the full level, re-probes every stored key
/// through the reader's lookup path.
pub use verify::{verify, VerifyCounts, VerifyFinding, VerifyLevel, VerifyReport, VerifySeverity};
