//! Error types for tablet operations.

use std::io;
use thiserror::Error;

/// Errors that can occur while encoding, decoding, reading or writing a tablet.
#[derive(Debug, Error)]
pub enum TabletError {
    /// I/O error from the underlying byte source or sink.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The bytes are not a valid tablet (bad magic, unknown tag, bad frame).
    #[error("tablet validation failed: {0}")]
    Validation(String),

    /// A position was requested outside the bounds of a block, view or index.
    #[error("{what} {index} out of range (len {len})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// The block compressor reported a failure.
    #[error("compression failed: {0}")]
    Compression(String),
}

impl TabletError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        TabletError::Validation(msg.into())
    }

    /// Returns `true` for corruption / not-a-tablet errors.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, TabletError::Validation(_))
    }
}

/// Result type alias for tablet operations.
pub type Result<T> = std::result::Result<T, TabletError>;
