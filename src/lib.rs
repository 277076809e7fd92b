//! # ftpgrep
//!
//! Crawl a remote FTP tree, search every file of interest for a set of
//! terms, and follow progress live while the crawl runs.
//!
//! ftpgrep owns the crawl engine, the job registry that runs crawls in the
//! background, and the progress protocol between them. It does **not** own
//! a transport for observers: a [`JobWatcher`] yields typed [`JobUpdate`]s
//! that any push mechanism (SSE, websockets, a terminal) can forward.
//!
//! # Quick Start
//!
//! ```rust
//! use ftpgrep::{Connector, CrawlError, CrawlTarget, EntryKind, RemoteEntry, RemoteSession};
//!
//! // A one-directory in-memory server for demonstration
//! struct Fixed;
//!
//! impl RemoteSession for Fixed {
//!     fn list(&mut self, _path: &str) -> Result<Vec<RemoteEntry>, CrawlError> {
//!         Ok(vec![
//!             RemoteEntry::listed("index.php", EntryKind::File, None),
//!             RemoteEntry::listed("style.css", EntryKind::File, None),
//!         ])
//!     }
//!     fn retrieve(&mut self, _path: &str) -> Result<Vec<u8>, CrawlError> {
//!         Ok(b"<?php eval($_GET['x']); EVAL(1);".to_vec())
//!     }
//!     fn close(&mut self) -> Result<(), CrawlError> {
//!         Ok(())
//!     }
//! }
//!
//! struct FixedConnector;
//!
//! impl Connector for FixedConnector {
//!     fn connect(&self, _t: &CrawlTarget) -> Result<Box<dyn RemoteSession>, CrawlError> {
//!         Ok(Box::new(Fixed))
//!     }
//! }
//!
//! let results = ftpgrep::crawl()
//!     .connector(FixedConnector)
//!     .target(CrawlTarget::new("ftp.example.com", "user", "secret", "/www"))
//!     .terms("eval")
//!     .extensions([".php"])
//!     .run()
//!     .unwrap();
//!
//! assert_eq!(results.stats.files_scanned, 1);
//! assert_eq!(results.matches[0].path, "/www/index.php");
//! assert_eq!(results.total_terms(), 2);
//! ```
//!
//! # Background Jobs
//!
//! ```rust,ignore
//! let store = Arc::new(JobStore::new(config.jobs.clone()));
//! store.spawn_sweeper();
//!
//! let id = store.start(Arc::new(config.crawl.connector()), request, config.crawl.options()?)?;
//! let mut watcher = JobWatcher::new(store.lookup(&id).unwrap(), config.jobs.heartbeat());
//! while let Some(update) = watcher.next().await {
//!     println!("{}: {}", update.event_name(), update.to_json()?);
//! }
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod ftp;
pub mod logging;

mod builder;
mod entry;
mod error;
mod filter;
mod job;
mod relay;
mod request;
mod results;
mod store;
mod terms;
mod traits;
mod walker;
mod watch;

// ── Public re-exports ─────────────────────────────────────────────────────────

pub use builder::CrawlBuilder;
pub use config::{Config, ConfigError, JobConfig};
pub use engine::{CrawlOptions, CrawlProgress};
pub use entry::{EntryKind, RemoteEntry};
pub use error::{BoxError, CrawlError, ErrorKind};
pub use filter::{ExtensionFilter, DEFAULT_EXTENSIONS};
pub use ftp::FtpConnector;
pub use job::{Job, JobId, JobResults, JobSnapshot, MatchedFile, ProgressEvent};
pub use relay::ProgressRelay;
pub use request::{CrawlRequest, CrawlTarget};
pub use results::{CrawlResults, CrawlStats, MatchRecord};
pub use store::{JobError, JobStore};
pub use terms::{aggregate_terms, TermCount, TermMatcher};
pub use traits::{Connector, Matcher, ProgressSink, RemoteSession};
pub use walker::RemoteWalker;
pub use watch::{JobUpdate, JobWatcher};

// ── Entry point ───────────────────────────────────────────────────────────────

/// Create a new [`CrawlBuilder`] to configure and run one crawl.
pub fn crawl() -> CrawlBuilder {
    CrawlBuilder::default()
}
