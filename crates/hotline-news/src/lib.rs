//! # Hotline News
//!
//! The threaded bulletin-board store.
//!
//! News is a rooted tree of named nodes: bundles contain other nodes,
//! categories contain articles. Articles inside a category form threads
//! through parent / first-child / prev / next id links. The whole tree is
//! one YAML document on disk, rewritten via write-then-rename after every
//! mutation; reads never touch the filesystem.
//!
//! Paths into the tree reuse the wire path layout from
//! [`hotline_protocol::FilePath`], applied to node names.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod model;
pub mod store;

pub use error::NewsError;
pub use model::{Article, NewsNode, NodeKind};
pub use store::{NewsStore, NodeSummary};
