use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::admin::error::ensure_exists;
use crate::admin::Result;
use crate::format::Header;
use crate::reader::OpenOptions;
use crate::validate::ValidationSummary;

/// Everything `flatval stats` prints.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    /// File facts.
    pub file: FileSection,
    /// Decoded header fields.
    pub header: HeaderSection,
    /// Value counts gathered by the validator.
    pub values: ValidationSummary,
}

/// File facts.
#[derive(Debug, Clone, Serialize)]
pub struct FileSection {
    /// Path as given.
    pub path: String,
    /// Size on disk.
    pub size_bytes: u64,
    /// Whether the file was memory mapped.
    pub mapped: bool,
}

/// Decoded header fields.
#[derive(Debug, Clone, Serialize)]
pub struct HeaderSection {
    /// Format version.
    pub version: u16,
    /// Raw flag bits.
    pub flags: u32,
    /// Whether a payload checksum is stored.
    pub checksum_present: bool,
    /// Container ids in use.
    pub n_containers: u32,
    /// Kind of the root value.
    pub root_kind: String,
}

/// Opens and validates the buffer at `path` and reports what it holds.
pub fn stats(path: impl AsRef<Path>, opts: &OpenOptions) -> Result<StatsReport> {
    let path = path.as_ref();
    ensure_exists(path)?;
    let reader = opts.open(path)?;
    let bytes = reader.as_bytes()?;
    let header = Header::decode(bytes).map_err(crate::types::FlatError::from)?;
    let root = reader.root()?;
    Ok(StatsReport {
        file: FileSection {
            path: path.display().to_string(),
            size_bytes: fs::metadata(path)?.len(),
            mapped: opts.use_mmap && !bytes.is_empty(),
        },
        header: HeaderSection {
            version: header.version,
            flags: header.flags,
            checksum_present: header.has_checksum(),
            n_containers: header.n_containers,
            root_kind: root.kind_name().to_string(),
        },
        values: reader.summary()?.clone(),
    })
}
