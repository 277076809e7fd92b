//! Observing a job: turns its progress channel and terminal state into a
//! stream of updates any push transport can forward.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::job::{Job, JobId, JobResults, MatchedFile, ProgressEvent};

/// One update for an observer.
///
/// Serializes to the payload only; pair it with [`event_name`](JobUpdate::event_name)
/// for transports with named events (SSE `event:` lines).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JobUpdate {
    /// First update of every watch.
    #[serde(rename_all = "camelCase")]
    Connected { job_id: JobId },

    /// Counters changed, or a heartbeat repeating the last counters.
    #[serde(rename_all = "camelCase")]
    Progress { scanned_files: usize, matched_files: usize },

    /// A file just matched.
    MatchFound(MatchedFile),

    /// The job finished without error. Always the last update.
    Complete(JobResults),

    /// The job finished with an error. Always the last update.
    Failed { message: String },
}

impl JobUpdate {
    pub fn event_name(&self) -> &'static str {
        match self {
            JobUpdate::Connected { .. } => "connected",
            JobUpdate::Progress { .. } => "progress",
            JobUpdate::MatchFound(_) => "match-found",
            JobUpdate::Complete(_) => "complete",
            JobUpdate::Failed { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobUpdate::Complete(_) | JobUpdate::Failed { .. })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Streaming,
    Finished,
}

enum Wake {
    Event(Option<ProgressEvent>),
    Tick,
}

/// Follows one job from `Connected` to its terminal update.
///
/// Progress is forwarded only when a counter grows. A matched file is always
/// forwarded. Every heartbeat the job's state is checked. When nothing new
/// arrived, the last counters are repeated so idle transports stay alive.
/// Once the job is done the remaining buffered events are flushed, followed
/// by exactly one `Complete` or `Failed`.
///
/// Several watchers on the same job share its channel, so each progress
/// event reaches only one of them. Terminal updates reach all of them.
pub struct JobWatcher {
    job: Arc<Job>,
    ticker: Interval,
    phase: Phase,
    pending: VecDeque<JobUpdate>,
    last_scanned: usize,
    last_matched: usize,
}

impl JobWatcher {
    pub fn new(job: Arc<Job>, heartbeat: Duration) -> Self {
        let mut ticker = interval_at(Instant::now() + heartbeat, heartbeat);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            job,
            ticker,
            phase: Phase::Start,
            pending: VecDeque::new(),
            last_scanned: 0,
            last_matched: 0,
        }
    }

    pub fn job(&self) -> &Arc<Job> {
        &self.job
    }

    /// Next update, or `None` after the terminal one.
    pub async fn next(&mut self) -> Option<JobUpdate> {
        loop {
            if let Some(update) = self.pending.pop_front() {
                return Some(update);
            }
            match self.phase {
                Phase::Start => {
                    self.phase = Phase::Streaming;
                    return Some(JobUpdate::Connected { job_id: self.job.id() });
                }
                Phase::Finished => return None,
                Phase::Streaming => {}
            }

            let wake = {
                let job = &self.job;
                let ticker = &mut self.ticker;
                tokio::select! {
                    event = job.recv() => Wake::Event(event),
                    _ = ticker.tick() => Wake::Tick,
                }
            };

            match wake {
                Wake::Event(Some(event)) => self.absorb(event),
                // The relay closes the channel only after the job is done.
                Wake::Event(None) => self.conclude(),
                Wake::Tick => self.on_tick(),
            }
        }
    }

    fn absorb(&mut self, event: ProgressEvent) {
        if event.scanned_files > self.last_scanned || event.matched_files > self.last_matched {
            self.last_scanned = self.last_scanned.max(event.scanned_files);
            self.last_matched = self.last_matched.max(event.matched_files);
            self.pending.push_back(self.progress());
        }
        if let Some(file) = event.matched_file {
            self.pending.push_back(JobUpdate::MatchFound(file));
        }
    }

    fn on_tick(&mut self) {
        if self.job.is_done() {
            while let Some(event) = self.job.try_recv() {
                self.absorb(event);
            }
            self.conclude();
        } else if self.last_scanned > 0 {
            self.pending.push_back(self.progress());
        }
    }

    fn conclude(&mut self) {
        let snapshot = self.job.snapshot();
        let update = match (snapshot.error, snapshot.results) {
            (Some(message), _) => JobUpdate::Failed { message },
            (None, Some(results)) => JobUpdate::Complete(results.as_ref().clone()),
            (None, None) => JobUpdate::Failed {
                message: "job ended without results".to_string(),
            },
        };
        self.pending.push_back(update);
        self.phase = Phase::Finished;
    }

    fn progress(&self) -> JobUpdate {
        JobUpdate::Progress {
            scanned_files: self.last_scanned,
            matched_files: self.last_matched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CrawlProgress;
    use crate::relay::ProgressRelay;
    use crate::results::MatchRecord;
    use crate::traits::ProgressSink;

    fn progress(scanned: usize, matched: usize, hit: Option<&str>) -> CrawlProgress {
        CrawlProgress {
            files_scanned: scanned,
            files_matched: matched,
            matched: hit.map(|p| MatchRecord { path: p.to_string(), terms: vec!["foo".into()] }),
        }
    }

    async fn collect(mut watcher: JobWatcher) -> Vec<JobUpdate> {
        let mut out = Vec::new();
        while let Some(update) = watcher.next().await {
            out.push(update);
        }
        out
    }

    fn done(job: &Job, error: Option<&str>) -> JobResults {
        JobResults {
            job_id: job.id(),
            files: Vec::new(),
            total_files: 0,
            total_terms: 0,
            files_scanned: 2,
            duration_secs: 0.1,
            error: error.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn streams_progress_then_completes() {
        let job = Arc::new(Job::new(JobId::new(), 16));
        let relay = ProgressRelay::attach(&job).unwrap();
        relay.emit(progress(1, 1, Some("/a.php")));
        relay.emit(progress(2, 1, None));
        relay.finish(&job, done(&job, None));

        let updates = collect(JobWatcher::new(Arc::clone(&job), Duration::from_millis(10))).await;
        let names: Vec<&str> = updates.iter().map(JobUpdate::event_name).collect();
        assert_eq!(names, vec!["connected", "progress", "match-found", "progress", "complete"]);
        assert_eq!(
            updates[3],
            JobUpdate::Progress { scanned_files: 2, matched_files: 1 }
        );
    }

    #[tokio::test]
    async fn failed_job_ends_with_error_event() {
        let job = Arc::new(Job::new(JobId::new(), 16));
        let relay = ProgressRelay::attach(&job).unwrap();
        relay.finish(&job, done(&job, Some("cannot connect to h:21")));

        let updates = collect(JobWatcher::new(job, Duration::from_millis(10))).await;
        assert_eq!(
            updates.last(),
            Some(&JobUpdate::Failed { message: "cannot connect to h:21".into() })
        );
        assert_eq!(updates.iter().filter(|u| u.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn repeated_counters_are_not_resent() {
        let job = Arc::new(Job::new(JobId::new(), 16));
        let relay = ProgressRelay::attach(&job).unwrap();
        relay.emit(progress(1, 0, None));
        relay.emit(progress(1, 0, None));
        relay.finish(&job, done(&job, None));

        let updates = collect(JobWatcher::new(job, Duration::from_secs(3600))).await;
        let progress_count = updates.iter().filter(|u| u.event_name() == "progress").count();
        assert_eq!(progress_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_repeats_last_counters_while_running() {
        let job = Arc::new(Job::new(JobId::new(), 16));
        let relay = ProgressRelay::attach(&job).unwrap();
        relay.emit(progress(3, 0, None));

        let mut watcher = JobWatcher::new(Arc::clone(&job), Duration::from_millis(300));
        assert_eq!(watcher.next().await.unwrap().event_name(), "connected");
        let first = watcher.next().await.unwrap();
        let beat = watcher.next().await.unwrap();
        assert_eq!(first, beat);
        assert_eq!(beat, JobUpdate::Progress { scanned_files: 3, matched_files: 0 });

        relay.finish(&job, done(&job, None));
        assert!(watcher.next().await.unwrap().is_terminal());
        assert!(watcher.next().await.is_none());
    }

    #[test]
    fn payloads_serialize_without_tags() {
        let json = JobUpdate::Progress { scanned_files: 4, matched_files: 1 }.to_json().unwrap();
        assert_eq!(json, r#"{"scannedFiles":4,"matchedFiles":1}"#);
        let json = JobUpdate::Failed { message: "boom".into() }.to_json().unwrap();
        assert_eq!(json, r#"{"message":"boom"}"#);
    }
}
