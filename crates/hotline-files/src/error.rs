//! Error types for the file subsystem.

use std::path::PathBuf;
use thiserror::Error;

/// File store and fork codec errors
#[derive(Debug, Error)]
pub enum FileError {
    /// A client-supplied path resolved outside the sandbox root
    #[error("path escapes file root: {0:?}")]
    PathEscape(PathBuf),

    /// A path component contained a separator or was otherwise unusable
    #[error("invalid path component")]
    InvalidComponent,

    /// Target does not exist
    #[error("not found: {0:?}")]
    NotFound(PathBuf),

    /// Create would clobber an existing entry
    #[error("already exists: {0:?}")]
    AlreadyExists(PathBuf),

    /// Record codec failure (bad magic, truncation)
    #[error(transparent)]
    Protocol(#[from] hotline_protocol::ProtocolError),

    /// Underlying filesystem failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
