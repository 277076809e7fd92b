use crate::engine::CrawlProgress;
use crate::entry::RemoteEntry;
use crate::error::CrawlError;
use crate::request::CrawlTarget;

/// Opens authenticated sessions against a remote server.
///
/// Implement this to crawl anything that lists directories and returns
/// file bytes: FTP ([`FtpConnector`](crate::ftp::FtpConnector)), SFTP, an
/// in-memory tree in tests.
///
/// # Thread Safety
///
/// `Send + Sync` are required: one connector is shared by every job a
/// [`JobStore`](crate::JobStore) starts, and each job connects from its own
/// worker thread.
///
/// # Error Handling
///
/// Dial failures map to [`CrawlError::Connect`], rejected credentials to
/// [`CrawlError::Login`]. A connector that fails after dialling must close
/// what it opened before returning.
///
/// # Example
///
/// ```rust
/// use ftpgrep::{Connector, CrawlError, CrawlTarget, EntryKind, RemoteEntry, RemoteSession};
///
/// struct Empty;
///
/// impl RemoteSession for Empty {
///     fn list(&mut self, _path: &str) -> Result<Vec<RemoteEntry>, CrawlError> {
///         Ok(vec![RemoteEntry::listed("index.php", EntryKind::File, Some(5))])
///     }
///     fn retrieve(&mut self, _path: &str) -> Result<Vec<u8>, CrawlError> {
///         Ok(b"<?php".to_vec())
///     }
///     fn close(&mut self) -> Result<(), CrawlError> {
///         Ok(())
///     }
/// }
///
/// struct EmptyConnector;
///
/// impl Connector for EmptyConnector {
///     fn connect(&self, _target: &CrawlTarget) -> Result<Box<dyn RemoteSession>, CrawlError> {
///         Ok(Box::new(Empty))
///     }
/// }
/// ```
pub trait Connector: Send + Sync {
    /// Dial and log in. The returned session is owned by exactly one crawl.
    fn connect(&self, target: &CrawlTarget) -> Result<Box<dyn RemoteSession>, CrawlError>;
}

/// One authenticated connection to a remote server.
///
/// `RemoteSession` is object-safe. Sessions are used from a single thread at
/// a time (`Send`, not `Sync`).
pub trait RemoteSession: Send {
    /// List the immediate children of `path`.
    ///
    /// Returned entries only need `name`, `kind` and `size`; see
    /// [`RemoteEntry::listed`].
    fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, CrawlError>;

    /// Fetch the full content of the file at `path`.
    fn retrieve(&mut self, path: &str) -> Result<Vec<u8>, CrawlError>;

    /// Close the session. Called exactly once by the walker.
    fn close(&mut self) -> Result<(), CrawlError>;
}

/// Decides whether a listed file is a crawl candidate.
///
/// Called for file entries only; directories are always descended (up to
/// the depth limit).
///
/// # Example
///
/// ```rust
/// use ftpgrep::{Matcher, RemoteEntry};
///
/// struct SmallFiles(u64);
///
/// impl Matcher for SmallFiles {
///     fn is_match(&self, entry: &RemoteEntry) -> bool {
///         entry.size.map(|s| s <= self.0).unwrap_or(true)
///     }
/// }
/// ```
pub trait Matcher: Send + Sync {
    /// Returns `true` if this file should be retrieved and searched.
    fn is_match(&self, entry: &RemoteEntry) -> bool;
}

/// Receives progress from a running crawl.
///
/// `emit` is called on the crawl's own thread after every file, so it must
/// never block: implementations drop what they cannot take immediately.
/// The crawl result does not depend on what a sink keeps.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, progress: CrawlProgress);
}

/// Discards all progress.
impl ProgressSink for () {
    fn emit(&self, _progress: CrawlProgress) {}
}

impl<S: ProgressSink + ?Sized> ProgressSink for std::sync::Arc<S> {
    fn emit(&self, progress: CrawlProgress) {
        (**self).emit(progress);
    }
}
