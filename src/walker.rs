use std::collections::VecDeque;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::entry::{join_path, EntryKind, RemoteEntry};
use crate::error::CrawlError;
use crate::request::CrawlTarget;
use crate::traits::{Connector, Matcher, RemoteSession};

// ---------------------------------------------------------------------------
// SessionGuard
// ---------------------------------------------------------------------------

/// Owns a session and closes it exactly once: explicitly via `close()`, or
/// on drop if the walk ended some other way.
struct SessionGuard {
    session: Option<Box<dyn RemoteSession>>,
}

impl SessionGuard {
    fn get(&mut self) -> Result<&mut Box<dyn RemoteSession>, CrawlError> {
        self.session
            .as_mut()
            .ok_or_else(|| CrawlError::Close("session already closed".into()))
    }

    fn close(&mut self) -> Result<(), CrawlError> {
        match self.session.take() {
            Some(mut session) => session.close(),
            None => Ok(()),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("remote session close failed: {}", e.report());
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteWalker
// ---------------------------------------------------------------------------

/// Depth-limited walk over a remote directory tree.
///
/// Yields candidate files and links (those accepted by the [`Matcher`]) in discovery
/// order: a directory's files first, in listing order, then its
/// subdirectories depth-first. Listings are lazy, so a failure surfaces at
/// the point it happens and everything yielded before it stays valid.
///
/// After the first error the walk is over and `next()` returns `None`.
pub struct RemoteWalker {
    session: SessionGuard,
    matcher: Arc<dyn Matcher>,
    max_depth: Option<usize>,
    cancel: CancellationToken,
    pending_dirs: Vec<(String, usize)>,
    queued: VecDeque<RemoteEntry>,
    dirs_listed: usize,
    finished: bool,
}

impl RemoteWalker {
    /// Connect and position the walk at `target.root`.
    ///
    /// `max_depth` counts directory levels below the root: `0` visits the
    /// root's own files only. Unlimited when `None`.
    pub fn open(
        connector: &dyn Connector,
        target: &CrawlTarget,
        matcher: Arc<dyn Matcher>,
        max_depth: Option<usize>,
        cancel: CancellationToken,
    ) -> Result<Self, CrawlError> {
        let session = connector.connect(target)?;
        debug!("connected to {} as {}", target.host, target.user);
        Ok(Self::new(session, &target.root, matcher, max_depth, cancel))
    }

    /// Walk over an already established session.
    pub fn new(
        session: Box<dyn RemoteSession>,
        root: &str,
        matcher: Arc<dyn Matcher>,
        max_depth: Option<usize>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session: SessionGuard { session: Some(session) },
            matcher,
            max_depth,
            cancel,
            pending_dirs: vec![(root.to_string(), 0)],
            queued: VecDeque::new(),
            dirs_listed: 0,
            finished: false,
        }
    }

    /// Retrieve a file yielded by this walker over the same session.
    ///
    /// Cancellation is checked by `next()`, so every entry handed out is
    /// retrieved in full.
    pub fn fetch(&mut self, entry: &RemoteEntry) -> Result<Vec<u8>, CrawlError> {
        self.session.get()?.retrieve(&entry.path)
    }

    /// Number of directories listed so far.
    pub fn dirs_listed(&self) -> usize {
        self.dirs_listed
    }

    /// Close the session, reporting a failed close.
    ///
    /// Dropping the walker also closes the session, logging failures instead.
    pub fn close(mut self) -> Result<(), CrawlError> {
        self.session.close()
    }

    fn fail(&mut self, err: CrawlError) -> Option<Result<RemoteEntry, CrawlError>> {
        self.finished = true;
        self.pending_dirs.clear();
        self.queued.clear();
        Some(Err(err))
    }

    fn list_dir(&mut self, dir: &str, depth: usize) -> Result<(), CrawlError> {
        let listing = self.session.get()?.list(dir)?;
        self.dirs_listed += 1;
        debug!("listed {} ({} entries)", dir, listing.len());

        let mut subdirs = Vec::new();
        for mut entry in listing.into_iter().filter(|e| !e.is_dot()) {
            entry.path = join_path(dir, &entry.name);
            entry.depth = depth + 1;
            match entry.kind {
                EntryKind::Dir => {
                    if self.max_depth.map_or(true, |max| depth < max) {
                        subdirs.push((entry.path, depth + 1));
                    }
                }
                // A link is retrieved like a file when its name passes the matcher.
                EntryKind::File | EntryKind::Symlink => {
                    if self.matcher.is_match(&entry) {
                        self.queued.push_back(entry);
                    }
                }
                EntryKind::Other => {}
            }
        }

        // Stack: push in reverse so the first listed subdirectory is walked first.
        self.pending_dirs.extend(subdirs.into_iter().rev());
        Ok(())
    }
}

impl Iterator for RemoteWalker {
    type Item = Result<RemoteEntry, CrawlError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            if self.cancel.is_cancelled() {
                return self.fail(CrawlError::Cancelled);
            }
            if let Some(entry) = self.queued.pop_front() {
                return Some(Ok(entry));
            }
            let (dir, depth) = match self.pending_dirs.pop() {
                Some(next) => next,
                None => {
                    self.finished = true;
                    return None;
                }
            };
            if let Err(e) = self.list_dir(&dir, depth) {
                return self.fail(e);
            }
        }
    }
}
