use std::time::Duration;

use crate::error::CrawlError;
use crate::terms::{aggregate_terms, TermCount};

/// One matched remote file and every term occurrence found in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    /// Full remote path.
    pub path: String,

    /// Matched substrings in file order, duplicates kept.
    pub terms: Vec<String>,
}

impl MatchRecord {
    /// Occurrences grouped by exact text.
    pub fn term_counts(&self) -> Vec<TermCount> {
        aggregate_terms(&self.terms)
    }

    /// Total occurrences in this file.
    pub fn total_terms(&self) -> usize {
        self.terms.len()
    }
}

/// The output of one crawl, complete or not.
///
/// A crawl that fails mid-walk still returns what it matched before the
/// failure; `error` says why it stopped.
#[derive(Debug)]
pub struct CrawlResults {
    /// One record per matched file, in discovery order.
    pub matches: Vec<MatchRecord>,

    /// Scan statistics.
    pub stats: CrawlStats,

    /// Why the crawl stopped early, if it did.
    pub error: Option<CrawlError>,

    /// Problems that did not affect the outcome, such as a failed session
    /// close after a successful walk.
    pub warnings: Vec<CrawlError>,
}

impl CrawlResults {
    /// A crawl that failed before scanning anything.
    pub(crate) fn failed(error: CrawlError, duration: Duration) -> Self {
        Self {
            matches: Vec::new(),
            stats: CrawlStats::compute(0, 0, 0, 0, duration),
            error: Some(error),
            warnings: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    pub fn files_matched(&self) -> usize {
        self.matches.len()
    }

    /// Sum of all term occurrences across matched files.
    pub fn total_terms(&self) -> usize {
        self.matches.iter().map(MatchRecord::total_terms).sum()
    }
}

/// Statistics for a crawl.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlStats {
    /// Candidate files taken from the walk (retrieval attempted).
    pub files_scanned: usize,

    /// Files with at least one term occurrence.
    pub files_matched: usize,

    /// Directories listed.
    pub dirs_listed: usize,

    /// Bytes retrieved.
    pub bytes_read: u64,

    /// Wall-clock time from start to completion.
    pub duration: Duration,

    /// Files scanned per second, 0 on zero-duration runs.
    pub files_per_sec: f64,
}

impl CrawlStats {
    pub(crate) fn compute(
        files_scanned: usize,
        files_matched: usize,
        dirs_listed: usize,
        bytes_read: u64,
        duration: Duration,
    ) -> Self {
        let secs = duration.as_secs_f64();
        let files_per_sec = if secs > 0.0 { files_scanned as f64 / secs } else { 0.0 };
        Self {
            files_scanned,
            files_matched,
            dirs_listed,
            bytes_read,
            duration,
            files_per_sec,
        }
    }
}
