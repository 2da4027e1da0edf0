use std::path::{Path, PathBuf};

use crate::types::FlatError;
use thiserror::Error;

/// Error type for administrative operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Buffer file not found at the specified path.
    #[error("file not found: {0}")]
    MissingFile(PathBuf),
    /// Core library error.
    #[error(transparent)]
    Core(#[from] FlatError),
    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for administrative operations.
pub type Result<T> = std::result::Result<T, AdminError>;

impl AdminError {
    pub(crate) fn missing_file(path: impl AsRef<Path>) -> Self {
        AdminError::MissingFile(path.as_ref().to_path_buf())
    }
}

pub(crate) fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(AdminError::missing_file(path))
    }
}
