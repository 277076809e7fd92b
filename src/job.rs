//! Job records: one crawl's identity, terminal state and progress channel.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::engine::CrawlProgress;
use crate::results::{CrawlResults, MatchRecord};
use crate::terms::TermCount;

// ---------------------------------------------------------------------------
// JobId
// ---------------------------------------------------------------------------

/// Opaque, never reused job identity (a random UUID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ---------------------------------------------------------------------------
// Public event and result shapes
// ---------------------------------------------------------------------------

/// A matched file with its occurrences counted per distinct text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedFile {
    pub path: String,
    pub terms: Vec<TermCount>,
    pub total_terms: usize,
}

impl From<&MatchRecord> for MatchedFile {
    fn from(record: &MatchRecord) -> Self {
        Self {
            path: record.path.clone(),
            terms: record.term_counts(),
            total_terms: record.total_terms(),
        }
    }
}

/// Progress as published on a job's channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub scanned_files: usize,
    pub matched_files: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_file: Option<MatchedFile>,
}

impl From<CrawlProgress> for ProgressEvent {
    fn from(progress: CrawlProgress) -> Self {
        Self {
            scanned_files: progress.files_scanned,
            matched_files: progress.files_matched,
            matched_file: progress.matched.as_ref().map(MatchedFile::from),
        }
    }
}

/// Terminal outcome of a job.
///
/// Matches found before a failure are kept; `error` carries the failure
/// message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResults {
    pub job_id: JobId,
    pub files: Vec<MatchedFile>,
    pub total_files: usize,
    pub total_terms: usize,
    pub files_scanned: usize,
    pub duration_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobResults {
    pub(crate) fn from_crawl(job_id: JobId, crawl: &CrawlResults, duration: Duration) -> Self {
        let files: Vec<MatchedFile> = crawl.matches.iter().map(MatchedFile::from).collect();
        Self {
            job_id,
            total_files: files.len(),
            total_terms: files.iter().map(|f| f.total_terms).sum(),
            files,
            files_scanned: crawl.stats.files_scanned,
            duration_secs: duration.as_secs_f64(),
            error: crawl.error.as_ref().map(|e| e.report()),
        }
    }

    pub(crate) fn crashed(job_id: JobId, message: String, duration: Duration) -> Self {
        Self {
            job_id,
            files: Vec::new(),
            total_files: 0,
            total_terms: 0,
            files_scanned: 0,
            duration_secs: duration.as_secs_f64(),
            error: Some(message),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs)
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

#[derive(Default)]
struct JobState {
    done: bool,
    error: Option<String>,
    results: Option<Arc<JobResults>>,
    completed_at: Option<Instant>,
}

/// Point-in-time copy of a job's mutable state.
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub done: bool,
    pub error: Option<String>,
    pub results: Option<Arc<JobResults>>,
    /// Time since the job was created, frozen at completion.
    pub elapsed: Duration,
}

/// One crawl's record.
///
/// The terminal fields (`done`, `error`, `results`) sit behind a lock owned
/// by this record alone. The progress channel needs no lock for sending;
/// its only sender belongs to the job's [`ProgressRelay`](crate::ProgressRelay),
/// so the channel closes exactly when the relay finishes.
pub struct Job {
    id: JobId,
    started_at: Instant,
    cancel: CancellationToken,
    state: Mutex<JobState>,
    sender: Mutex<Option<mpsc::Sender<ProgressEvent>>>,
    events: tokio::sync::Mutex<mpsc::Receiver<ProgressEvent>>,
}

impl Job {
    pub(crate) fn new(id: JobId, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            id,
            started_at: Instant::now(),
            cancel: CancellationToken::new(),
            state: Mutex::new(JobState::default()),
            sender: Mutex::new(Some(tx)),
            events: tokio::sync::Mutex::new(rx),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn is_done(&self) -> bool {
        self.state.lock().done
    }

    pub fn completed_at(&self) -> Option<Instant> {
        self.state.lock().completed_at
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let state = self.state.lock();
        let elapsed = match state.completed_at {
            Some(at) => at.duration_since(self.started_at),
            None => self.started_at.elapsed(),
        };
        JobSnapshot {
            done: state.done,
            error: state.error.clone(),
            results: state.results.clone(),
            elapsed,
        }
    }

    /// Next progress event. Waits while the crawl runs; `None` once the
    /// channel is closed and drained.
    ///
    /// Several observers may call this concurrently. Each event goes to
    /// exactly one of them.
    pub async fn recv(&self) -> Option<ProgressEvent> {
        self.events.lock().await.recv().await
    }

    /// A buffered event, if one is available right now.
    pub fn try_recv(&self) -> Option<ProgressEvent> {
        self.events.try_lock().ok()?.try_recv().ok()
    }

    /// Ask the crawl to stop at its next file or directory.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Hand out the channel's only sender. `None` after the first call.
    pub(crate) fn take_sender(&self) -> Option<mpsc::Sender<ProgressEvent>> {
        self.sender.lock().take()
    }

    /// Record the terminal outcome. Returns `false` if already finished.
    pub(crate) fn finish(&self, results: JobResults) -> bool {
        let mut state = self.state.lock();
        if state.done {
            return false;
        }
        state.error = results.error.clone();
        state.results = Some(Arc::new(results));
        state.completed_at = Some(Instant::now());
        state.done = true;
        true
    }

    /// Whether a finished job has outlived `retention` at `now`.
    pub(crate) fn is_expired(&self, now: Instant, retention: Duration) -> bool {
        let state = self.state.lock();
        match state.completed_at {
            Some(at) if state.done => now.saturating_duration_since(at) >= retention,
            _ => false,
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("done", &state.done)
            .field("error", &state.error)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrawlError;
    use crate::results::CrawlStats;

    fn crawl(error: Option<CrawlError>) -> CrawlResults {
        CrawlResults {
            matches: vec![MatchRecord {
                path: "/www/a.php".into(),
                terms: vec!["Foo".into(), "bar".into(), "Foo".into()],
            }],
            stats: CrawlStats::compute(2, 1, 1, 20, Duration::from_millis(5)),
            error,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn job_ids_are_distinct_and_parse_back() {
        let a = JobId::new();
        let b = JobId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().parse::<JobId>().unwrap(), a);
        assert!("not-a-job".parse::<JobId>().is_err());
    }

    #[test]
    fn results_aggregate_terms() {
        let id = JobId::new();
        let res = JobResults::from_crawl(id, &crawl(None), Duration::from_secs(1));
        assert_eq!(res.total_files, 1);
        assert_eq!(res.total_terms, 3);
        let terms: Vec<String> = res.files[0].terms.iter().map(ToString::to_string).collect();
        assert_eq!(terms, vec!["Foo - 2", "bar - 1"]);
        assert!(res.error.is_none());
    }

    #[test]
    fn failed_crawl_keeps_partial_files_and_message() {
        let err = CrawlError::list("/www/lib", "550 denied");
        let res = JobResults::from_crawl(JobId::new(), &crawl(Some(err)), Duration::ZERO);
        assert_eq!(res.total_files, 1);
        assert_eq!(res.error.as_deref(), Some("cannot list /www/lib: 550 denied"));
    }

    #[test]
    fn finish_happens_once() {
        let job = Job::new(JobId::new(), 4);
        assert!(!job.is_done());
        let res = JobResults::from_crawl(job.id(), &crawl(None), Duration::ZERO);
        assert!(job.finish(res.clone()));
        assert!(!job.finish(res));
        let snap = job.snapshot();
        assert!(snap.done);
        assert!(snap.error.is_none());
        assert_eq!(snap.results.unwrap().total_files, 1);
    }

    #[test]
    fn expiry_uses_completion_time() {
        let job = Job::new(JobId::new(), 4);
        let retention = Duration::from_secs(60);
        assert!(!job.is_expired(Instant::now() + retention * 2, retention));

        job.finish(JobResults::crashed(job.id(), "boom".into(), Duration::ZERO));
        let done_at = job.completed_at().unwrap();
        assert!(!job.is_expired(done_at + Duration::from_secs(59), retention));
        assert!(job.is_expired(done_at + retention, retention));
    }

    #[test]
    fn sender_is_handed_out_once() {
        let job = Job::new(JobId::new(), 4);
        assert!(job.take_sender().is_some());
        assert!(job.take_sender().is_none());
    }

    #[test]
    fn progress_event_serializes_camel_case() {
        let ev = ProgressEvent::from(CrawlProgress {
            files_scanned: 3,
            files_matched: 1,
            matched: Some(MatchRecord { path: "/a.php".into(), terms: vec!["eval".into()] }),
        });
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["scannedFiles"], 3);
        assert_eq!(json["matchedFile"]["terms"][0], "eval - 1");
        assert_eq!(json["matchedFile"]["totalTerms"], 1);
    }
}
