#![forbid(unsafe_code)]
//! Bookkeeping for zero-copy views handed out by builder-side vectors.
//!
//! A binding layer that exposes a vector's storage to foreign code takes an
//! [`ExportGuard`] for as long as the view lives. Resizing operations check
//! [`Exports::check_resize`] first and fail while any guard is alive.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::types::{FlatError, Result};

/// Counter of outstanding views.
#[derive(Debug, Default)]
pub struct Exports {
    count: Arc<AtomicUsize>,
}

impl Exports {
    /// Registers a new view.
    pub fn acquire(&self) -> ExportGuard {
        self.count.fetch_add(1, Ordering::AcqRel);
        ExportGuard {
            count: Arc::clone(&self.count),
        }
    }

    /// Number of views currently alive.
    pub fn outstanding(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Fails with [`FlatError::ResizeWhileBorrowed`] while views exist.
    pub fn check_resize(&self) -> Result<()> {
        if self.outstanding() > 0 {
            return Err(FlatError::ResizeWhileBorrowed);
        }
        Ok(())
    }
}

impl Clone for Exports {
    /// A clone owns fresh storage, so it starts with no views.
    fn clone(&self) -> Self {
        Exports::default()
    }
}

/// Keeps a view registered until dropped.
#[derive(Debug)]
pub struct ExportGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for ExportGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }
}
