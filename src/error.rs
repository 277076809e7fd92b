use std::error::Error as StdError;

use thiserror::Error;

/// Boxed underlying cause carried by remote I/O variants.
///
/// Boxed so any [`RemoteSession`](crate::traits::RemoteSession) implementation
/// can report its own error type.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum CrawlError {
    // Configuration
    #[error("no search terms given")]
    EmptyTerms,

    #[error("empty search term at position {0}")]
    EmptyTerm(usize),

    #[error("invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("invalid file filter: {0}")]
    InvalidFilter(String),

    #[error("missing {0}")]
    MissingField(&'static str),

    // Connectivity
    #[error("cannot connect to {addr}")]
    Connect {
        addr: String,
        #[source]
        source: BoxError,
    },

    #[error("login failed for user {user}")]
    Login {
        user: String,
        #[source]
        source: BoxError,
    },

    // Traversal
    #[error("cannot list {path}")]
    List {
        path: String,
        #[source]
        source: BoxError,
    },

    #[error("cannot retrieve {path}")]
    Retrieve {
        path: String,
        #[source]
        source: BoxError,
    },

    // Resource
    #[error("closing the remote session failed")]
    Close(#[source] BoxError),

    #[error("crawl cancelled")]
    Cancelled,
}

/// Coarse classification of a [`CrawlError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad terms or filters. Raised before any network I/O.
    Configuration,
    /// Cannot dial or authenticate. Nothing was scanned.
    Connectivity,
    /// Listing or retrieval failed mid-scan. Partial results are kept.
    Traversal,
    /// Session cleanup failed.
    Resource,
    /// The crawl was stopped by its cancellation token.
    Cancelled,
}

impl CrawlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyTerms
            | Self::EmptyTerm(_)
            | Self::InvalidPattern(_)
            | Self::InvalidFilter(_)
            | Self::MissingField(_) => ErrorKind::Configuration,
            Self::Connect { .. } | Self::Login { .. } => ErrorKind::Connectivity,
            Self::List { .. } | Self::Retrieve { .. } => ErrorKind::Traversal,
            Self::Close(_) => ErrorKind::Resource,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// The remote path this error occurred at, if applicable.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::List { path, .. } | Self::Retrieve { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Message including the chain of underlying causes.
    ///
    /// This is the form stored on a finished job; the raw error value never
    /// crosses the job boundary.
    pub fn report(&self) -> String {
        let mut msg = self.to_string();
        let mut cause = self.source();
        while let Some(err) = cause {
            msg.push_str(": ");
            msg.push_str(&err.to_string());
            cause = err.source();
        }
        msg
    }

    pub(crate) fn connect(addr: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Connect { addr: addr.into(), source: source.into() }
    }

    pub(crate) fn login(user: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Login { user: user.into(), source: source.into() }
    }

    pub(crate) fn list(path: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::List { path: path.into(), source: source.into() }
    }

    pub(crate) fn retrieve(path: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Retrieve { path: path.into(), source: source.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(CrawlError::EmptyTerms.kind(), ErrorKind::Configuration);
        assert_eq!(
            CrawlError::connect("host:21", "refused").kind(),
            ErrorKind::Connectivity
        );
        assert_eq!(CrawlError::list("/www", "550").kind(), ErrorKind::Traversal);
        assert_eq!(CrawlError::Close("broken pipe".into()).kind(), ErrorKind::Resource);
        assert_eq!(CrawlError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn report_includes_cause() {
        let err = CrawlError::retrieve("/www/a.php", "550 No such file");
        assert_eq!(err.path(), Some("/www/a.php"));
        assert_eq!(err.report(), "cannot retrieve /www/a.php: 550 No such file");
    }
}
