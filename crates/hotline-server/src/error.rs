//! Server error taxonomy.
//!
//! Two layers: [`ServerError`] for failures that end a connection or the
//! process, [`HandlerError`] for failures inside a handler that become an
//! error reply while the session lives on (login being the exception:
//! the session closes after the reply goes out).

use thiserror::Error;

/// Connection- and process-level failures
#[derive(Debug, Error)]
pub enum ServerError {
    /// Framing or handshake violation; the connection closes
    #[error(transparent)]
    Protocol(#[from] hotline_protocol::ProtocolError),

    /// A session's outbound queue overflowed; the session closes
    #[error("outbound queue overflow for session {0}")]
    Backpressure(u16),

    /// Session registry has no such user
    #[error("no session with user id {0}")]
    UnknownSession(u16),

    /// Transfer reference unknown, expired or already consumed
    #[error("unknown transfer reference {0:08x}")]
    UnknownReference(u32),

    /// Configuration rejected at load time
    #[error("config error: {0}")]
    Config(String),

    /// Socket or file failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures inside a handler, each carrying the client-facing message
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Login rejected; the reply goes out, then the session closes
    #[error("login rejected: {0}")]
    Auth(String),

    /// A required access bit is missing
    #[error("access denied: {0}")]
    Denied(String),

    /// File, account, news node or transfer reference missing
    #[error("{0}")]
    NotFound(String),

    /// Conflicting create
    #[error("{0}")]
    AlreadyExists(String),

    /// The request is missing a field or carries a malformed one
    #[error("{0}")]
    BadRequest(String),

    /// Sandbox violation
    #[error("restricted file path")]
    PathEscape,

    /// Anything unexpected; logged in full, reported generically
    #[error("an error occurred")]
    Internal(String),
}

impl HandlerError {
    /// The message placed in the reply's Error field
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Auth(msg)
            | Self::Denied(msg)
            | Self::NotFound(msg)
            | Self::AlreadyExists(msg)
            | Self::BadRequest(msg) => msg.clone(),
            Self::PathEscape => "Cannot access that file path.".to_string(),
            Self::Internal(_) => "An error occurred.".to_string(),
        }
    }
}

impl From<hotline_files::FileError> for HandlerError {
    fn from(e: hotline_files::FileError) -> Self {
        use hotline_files::FileError;
        match e {
            FileError::PathEscape(_) | FileError::InvalidComponent => Self::PathEscape,
            FileError::NotFound(p) => Self::NotFound(format!(
                "Cannot find the file \"{}\".",
                p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
            )),
            FileError::AlreadyExists(p) => Self::AlreadyExists(format!(
                "There is already a file named \"{}\".",
                p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
            )),
            FileError::Protocol(e) => Self::BadRequest(e.to_string()),
            FileError::Io(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<hotline_news::NewsError> for HandlerError {
    fn from(e: hotline_news::NewsError) -> Self {
        use hotline_news::NewsError;
        match e {
            NewsError::PathNotFound(p) => Self::NotFound(format!("News path not found: {p}")),
            NewsError::ArticleNotFound(id) => Self::NotFound(format!("Article {id} not found.")),
            NewsError::NotCategory(_) | NewsError::NotBundle(_) => {
                Self::BadRequest("Wrong kind of news item for that operation.".to_string())
            }
            NewsError::AlreadyExists(name) => {
                Self::AlreadyExists(format!("A news item named \"{name}\" already exists."))
            }
            NewsError::Yaml(e) => Self::Internal(e.to_string()),
            NewsError::Io(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<hotline_protocol::ProtocolError> for HandlerError {
    fn from(e: hotline_protocol::ProtocolError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_detail_is_not_client_visible() {
        let err = HandlerError::Internal("lock poisoned at server.rs:42".to_string());
        assert_eq!(err.client_message(), "An error occurred.");
    }

    #[test]
    fn test_denied_message_passes_through() {
        let err = HandlerError::Denied("You are not allowed to send chat.".to_string());
        assert_eq!(err.client_message(), "You are not allowed to send chat.");
    }
}
