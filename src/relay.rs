use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::engine::CrawlProgress;
use crate::job::{Job, JobId, JobResults, ProgressEvent};
use crate::traits::ProgressSink;

/// Bridges one crawl's progress into its job's channel.
///
/// Holds the channel's only sender. Events are offered without waiting and
/// dropped when the buffer is full. [`finish`](ProgressRelay::finish)
/// records the job's outcome and then closes the channel by dropping the
/// sender, so observers that see the channel close can rely on the job
/// being done.
pub struct ProgressRelay {
    job_id: JobId,
    tx: mpsc::Sender<ProgressEvent>,
    sent: AtomicUsize,
    dropped: AtomicUsize,
}

impl ProgressRelay {
    /// Take over `job`'s channel. `None` if a relay was already attached.
    pub fn attach(job: &Job) -> Option<Self> {
        let tx = job.take_sender()?;
        Some(Self {
            job_id: job.id(),
            tx,
            sent: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        })
    }

    /// Offer an event. Returns `false` if it was dropped.
    pub fn publish(&self, event: ProgressEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            // Every observer is gone; nobody is left to miss it.
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Write the terminal outcome into `job`, then close the channel.
    pub fn finish(self, job: &Job, results: JobResults) {
        debug_assert_eq!(job.id(), self.job_id);
        if !job.finish(results) {
            debug!("job {} was already finished", self.job_id);
        }
        let dropped = self.dropped();
        if dropped > 0 {
            debug!(
                "job {}: {} progress events delivered, {} dropped on full buffer",
                self.job_id,
                self.sent(),
                dropped
            );
        }
        drop(self.tx);
    }
}

impl ProgressSink for ProgressRelay {
    fn emit(&self, progress: CrawlProgress) {
        self.publish(ProgressEvent::from(progress));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn progress(scanned: usize) -> CrawlProgress {
        CrawlProgress { files_scanned: scanned, files_matched: 0, matched: None }
    }

    #[test]
    fn attaches_once() {
        let job = Job::new(JobId::new(), 4);
        assert!(ProgressRelay::attach(&job).is_some());
        assert!(ProgressRelay::attach(&job).is_none());
    }

    #[test]
    fn full_buffer_drops_without_blocking() {
        let job = Job::new(JobId::new(), 2);
        let relay = ProgressRelay::attach(&job).unwrap();
        for i in 1..=5 {
            relay.emit(progress(i));
        }
        assert_eq!(relay.sent(), 2);
        assert_eq!(relay.dropped(), 3);

        assert_eq!(job.try_recv().unwrap().scanned_files, 1);
        assert_eq!(job.try_recv().unwrap().scanned_files, 2);
        assert!(job.try_recv().is_none());
    }

    #[tokio::test]
    async fn finish_marks_done_before_close() {
        let job = Job::new(JobId::new(), 8);
        let relay = ProgressRelay::attach(&job).unwrap();
        relay.emit(progress(1));
        relay.finish(&job, JobResults::crashed(job.id(), "boom".into(), Duration::ZERO));

        assert_eq!(job.recv().await.unwrap().scanned_files, 1);
        assert!(job.recv().await.is_none());
        let snap = job.snapshot();
        assert!(snap.done);
        assert_eq!(snap.error.as_deref(), Some("boom"));
    }
}
