//! # Hotline Files
//!
//! The on-disk file model behind the Hotline file subsystem.
//!
//! A served file is a triad: the data file itself, an optional resource
//! fork stored as the sibling `.rsrc_NAME`, and an optional information
//! fork stored as the sibling `.info_NAME`. Uploads in flight live under
//! `NAME.incomplete` until the final rename. On the wire a triad travels
//! as a "flattened file object": a `FILP` container holding the
//! information fork, the data fork and (when present) the resource fork.
//!
//! This crate provides:
//! - **Sandboxed path resolution**: every client-supplied path resolves
//!   under the configured root or fails
//! - **Fork triad bookkeeping**: sidecar naming, synthesis of missing info
//!   forks from filesystem metadata, triad-wide delete/move/copy
//! - **Flattened file object codec**: container and fork headers
//! - **Resume records**: the `RFLT` blob carrying per-fork restart offsets
//!
//! Actual socket streaming belongs to the server's transfer drivers; this
//! crate stops at files, records and offsets.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod flattened;
pub mod info_fork;
pub mod resume;
pub mod store;

pub use error::FileError;
pub use flattened::{FlatFileHeader, ForkHeader, FORK_TYPE_DATA, FORK_TYPE_INFO, FORK_TYPE_RSRC};
pub use info_fork::InformationFork;
pub use resume::ResumeData;
pub use store::{EntryKind, FileEntry, FileStore};

/// Sidecar prefix for information forks
pub const INFO_SIDECAR_PREFIX: &str = ".info_";

/// Sidecar prefix for resource forks
pub const RSRC_SIDECAR_PREFIX: &str = ".rsrc_";

/// Suffix carried by uploads until completion
pub const INCOMPLETE_SUFFIX: &str = ".incomplete";
