//! Error types for the news store.

use thiserror::Error;

/// News tree and persistence errors
#[derive(Debug, Error)]
pub enum NewsError {
    /// Path names a node that does not exist
    #[error("news path not found: {0}")]
    PathNotFound(String),

    /// Operation requires a category but the path names a bundle
    #[error("not a category: {0}")]
    NotCategory(String),

    /// Operation requires a bundle but the path names a category
    #[error("not a bundle: {0}")]
    NotBundle(String),

    /// Create would clobber an existing sibling
    #[error("news item already exists: {0}")]
    AlreadyExists(String),

    /// Article id not present in the category
    #[error("article {0} not found")]
    ArticleNotFound(u32),

    /// Snapshot serialization failure
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Snapshot write failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
