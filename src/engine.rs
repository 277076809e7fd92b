use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CrawlError;
use crate::filter::AllFiles;
use crate::request::CrawlRequest;
use crate::results::{CrawlResults, CrawlStats, MatchRecord};
use crate::terms::TermMatcher;
use crate::traits::{Connector, Matcher, ProgressSink};
use crate::walker::RemoteWalker;

// ---------------------------------------------------------------------------
// CrawlProgress
// ---------------------------------------------------------------------------

/// Snapshot emitted after every scanned file.
///
/// Counters are cumulative and never decrease within one crawl, so a
/// consumer that only keeps the latest snapshot still sees a correct view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlProgress {
    pub files_scanned: usize,
    pub files_matched: usize,
    /// Set when the file just scanned had matches.
    pub matched: Option<MatchRecord>,
}

// ---------------------------------------------------------------------------
// CrawlOptions
// ---------------------------------------------------------------------------

/// Walk parameters that are not part of the request itself.
#[derive(Clone)]
pub struct CrawlOptions {
    /// Which files are retrieved and searched.
    pub filter: Arc<dyn Matcher>,
    /// Directory levels below the root to descend. Unlimited when `None`.
    pub max_depth: Option<usize>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            filter: Arc::new(AllFiles),
            max_depth: None,
        }
    }
}

// ---------------------------------------------------------------------------
// run()
// ---------------------------------------------------------------------------

/// Crawl `request.target` and search every candidate file for the terms.
///
/// Runs on the calling thread and blocks on network I/O. Terms are compiled
/// once, before connecting. Progress goes to `sink` after each file and is
/// never waited on. The first connection, listing or retrieval failure stops
/// the crawl; matches found up to that point are returned with the error.
/// `cancel` is checked before every listing and before each file is taken.
pub fn run(
    connector: &dyn Connector,
    request: &CrawlRequest,
    options: &CrawlOptions,
    sink: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> CrawlResults {
    let start = Instant::now();
    let target = &request.target;

    let terms = match TermMatcher::compile(&request.terms) {
        Ok(terms) => terms,
        Err(e) => return CrawlResults::failed(e, start.elapsed()),
    };

    let mut walker = match RemoteWalker::open(
        connector,
        target,
        Arc::clone(&options.filter),
        options.max_depth,
        cancel.clone(),
    ) {
        Ok(walker) => walker,
        Err(e) => return CrawlResults::failed(e, start.elapsed()),
    };

    info!("crawling {}{} for /{}/", target.host, target.root, terms.as_str());

    let mut files_scanned = 0usize;
    let mut bytes_read = 0u64;
    let mut matches: Vec<MatchRecord> = Vec::new();
    let mut error: Option<CrawlError> = None;

    while let Some(item) = walker.next() {
        let entry = match item {
            Ok(entry) => entry,
            Err(e) => {
                error = Some(e);
                break;
            }
        };

        files_scanned += 1;
        let content = match walker.fetch(&entry) {
            Ok(content) => content,
            Err(e) => {
                error = Some(e);
                break;
            }
        };
        bytes_read += content.len() as u64;

        let found = terms.find_all(&content);
        let matched = if found.is_empty() {
            None
        } else {
            debug!("{}: {} occurrences", entry.path, found.len());
            let record = MatchRecord { path: entry.path, terms: found };
            matches.push(record.clone());
            Some(record)
        };

        sink.emit(CrawlProgress {
            files_scanned,
            files_matched: matches.len(),
            matched,
        });
    }

    let dirs_listed = walker.dirs_listed();
    let mut warnings = Vec::new();
    if let Err(e) = walker.close() {
        warn!("closing session to {} failed: {}", target.host, e.report());
        warnings.push(e);
    }

    let stats = CrawlStats::compute(
        files_scanned,
        matches.len(),
        dirs_listed,
        bytes_read,
        start.elapsed(),
    );
    match &error {
        Some(e) => info!(
            "crawl of {} stopped after {} files: {}",
            target.host,
            files_scanned,
            e.report()
        ),
        None => info!(
            "crawl of {} done: {} scanned, {} matched in {:.2}s",
            target.host,
            files_scanned,
            stats.files_matched,
            stats.duration.as_secs_f64()
        ),
    }

    CrawlResults {
        matches,
        stats,
        error,
        warnings,
    }
}
