use std::path::Path;

use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::admin::error::ensure_exists;
use crate::admin::Result;
use crate::format::{Header, HEADER_LEN};
use crate::reader::{OpenOptions, Reader};
use crate::types::checksum::payload_crc32;
use crate::types::FlatError;
use crate::validate::ValidationSummary;
use crate::value::ValueKind;

const MAX_FINDINGS: usize = 32;

/// Specifies the depth of verification checks to perform.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyLevel {
    /// Header and payload checksum only.
    Fast,
    /// Full structural validation plus a lookup of every stored key.
    Full,
}

/// Indicates the severity level of a verification finding.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifySeverity {
    /// Informational message about the verification process.
    Info,
    /// Non-critical issue that may indicate a problem.
    Warning,
    /// The buffer must not be read.
    Error,
}

/// Represents a single issue discovered during verification.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyFinding {
    /// The severity level of this finding.
    pub severity: VerifySeverity,
    /// Human-readable description of the issue.
    pub message: String,
}

impl VerifyFinding {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: VerifySeverity::Error,
            message: message.into(),
        }
    }

    fn info(message: impl Into<String>) -> Self {
        Self {
            severity: VerifySeverity::Info,
            message: message.into(),
        }
    }
}

/// Statistics collected during the verification process.
#[derive(Clone, Debug, Default, Serialize)]
pub struct VerifyCounts {
    /// Size of the buffer file.
    pub buffer_len: u64,
    /// Values visited by the lookup pass.
    pub values_checked: u64,
    /// Maps and sets whose keys were looked up.
    pub tables_probed: u64,
    /// Keys and elements looked up.
    pub keys_probed: u64,
}

/// Complete report of a verification operation.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyReport {
    /// The verification level that was performed.
    pub level: VerifyLevel,
    /// Whether verification passed without finding any errors.
    pub success: bool,
    /// List of issues discovered during verification.
    pub findings: Vec<VerifyFinding>,
    /// Statistics about what was examined.
    pub counts: VerifyCounts,
    /// Validator summary, present when full validation passed.
    pub validation: Option<ValidationSummary>,
}

/// Verifies a buffer file.
///
/// Structural faults are reported as findings; only a missing file or an
/// I/O failure is an error.
pub fn verify(
    path: impl AsRef<Path>,
    opts: &OpenOptions,
    level: VerifyLevel,
) -> Result<VerifyReport> {
    let path = path.as_ref();
    ensure_exists(path)?;
    let mut findings = Vec::new();
    let mut counts = VerifyCounts {
        buffer_len: std::fs::metadata(path)?.len(),
        ..VerifyCounts::default()
    };
    let mut validation = None;

    match level {
        VerifyLevel::Fast => {
            let buf = std::fs::read(path)?;
            check_header(&buf, opts, &mut findings);
        }
        VerifyLevel::Full => {
            let mut reader = opts.load(path)?;
            match reader.validate() {
                Ok(summary) => {
                    validation = Some(summary.clone());
                    probe_tables(&reader, &mut findings, &mut counts)?;
                }
                Err(FlatError::Validation(err)) => {
                    push(&mut findings, VerifyFinding::error(err.to_string()))
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    Ok(VerifyReport {
        level,
        success: !findings
            .iter()
            .any(|f| matches!(f.severity, VerifySeverity::Error)),
        findings,
        counts,
        validation,
    })
}

fn push(findings: &mut Vec<VerifyFinding>, finding: VerifyFinding) {
    if findings.len() < MAX_FINDINGS {
        findings.push(finding);
    }
}

fn check_header(buf: &[u8], opts: &OpenOptions, findings: &mut Vec<VerifyFinding>) {
    let header = match Header::decode(buf) {
        Ok(header) => header,
        Err(err) => {
            push(findings, VerifyFinding::error(err.to_string()));
            return;
        }
    };
    if !header.has_checksum() {
        push(findings, VerifyFinding::info("buffer carries no payload checksum"));
    } else if opts.verify_checksum {
        let computed = payload_crc32(&buf[HEADER_LEN..]);
        if computed != header.checksum {
            push(
                findings,
                VerifyFinding::error(format!(
                    "checksum mismatch: stored {:#010x}, computed {computed:#010x}",
                    header.checksum
                )),
            );
        }
    }
}

/// Looks every stored key up again through the reader. A miss or a map
/// value that differs from the stored one means two entries share a key.
fn probe_tables(
    reader: &Reader,
    findings: &mut Vec<VerifyFinding>,
    counts: &mut VerifyCounts,
) -> Result<()> {
    let mut seen = FxHashSet::default();
    let mut stack = vec![reader.root()?];
    while let Some(v) = stack.pop() {
        counts.values_checked += 1;
        let id = reader.container_id(v)?;
        if let Some(id) = id {
            if !seen.insert(id) {
                continue;
            }
        }
        match v.kind() {
            ValueKind::Vector => {
                for item in reader.iter(v)? {
                    stack.push(item?);
                }
            }
            ValueKind::Map | ValueKind::Set => {
                counts.tables_probed += 1;
                for entry in reader.entries(v)? {
                    let (key, value) = entry?;
                    counts.keys_probed += 1;
                    let found = match value {
                        Some(value) => match reader.map_get(v, key)? {
                            Some(hit) => reader.eq(hit, value)?,
                            None => false,
                        },
                        None => reader.set_contains(v, key)?,
                    };
                    if !found {
                        let id = id.map(|id| id.0).unwrap_or_default();
                        push(
                            findings,
                            VerifyFinding::error(format!(
                                "{} in container {id} is shadowed or unreachable by lookup",
                                key.kind_name()
                            )),
                        );
                    }
                    stack.push(key);
                    stack.extend(value);
                }
            }
            _ => {}
        }
    }
    Ok(())
}
