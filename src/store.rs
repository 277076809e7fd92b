use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::JobConfig;
use crate::engine::{self, CrawlOptions};
use crate::error::CrawlError;
use crate::job::{Job, JobId, JobResults};
use crate::relay::ProgressRelay;
use crate::request::CrawlRequest;
use crate::traits::Connector;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("job {0} was already started")]
    AlreadyStarted(JobId),

    #[error("invalid crawl request: {0}")]
    InvalidRequest(#[from] CrawlError),
}

/// Registry of crawl jobs.
///
/// Construct one at startup and share it (`Arc<JobStore>`). The map lock is
/// only held to insert, look up or remove records; each job's own state has
/// its own lock, so finishing one job never blocks lookups of another.
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Arc<Job>>>,
    config: JobConfig,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new(JobConfig::default())
    }
}

impl JobStore {
    pub fn new(config: JobConfig) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Register a fresh job and return its identity. Nothing runs until
    /// [`launch`](JobStore::launch) is called for it.
    pub fn create_job(&self) -> JobId {
        self.insert().id()
    }

    fn insert(&self) -> Arc<Job> {
        let id = JobId::new();
        let job = Arc::new(Job::new(id, self.config.channel_capacity));
        self.jobs.write().insert(id, Arc::clone(&job));
        debug!("job {} created", id);
        job
    }

    pub fn lookup(&self, id: &JobId) -> Option<Arc<Job>> {
        self.jobs.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    /// Jobs that have not finished yet.
    pub fn active_count(&self) -> usize {
        self.jobs.read().values().filter(|job| !job.is_done()).count()
    }

    /// Validate `request` and run the crawl for a created job on a blocking
    /// worker thread. An invalid request leaves the job unstarted.
    ///
    /// Must be called from within a tokio runtime. Returns immediately.
    pub fn launch(
        &self,
        id: JobId,
        connector: Arc<dyn Connector>,
        request: CrawlRequest,
        options: CrawlOptions,
    ) -> Result<(), JobError> {
        request.validate()?;
        let job = self.lookup(&id).ok_or(JobError::NotFound(id))?;
        let relay = ProgressRelay::attach(&job).ok_or(JobError::AlreadyStarted(id))?;
        spawn_crawl(job, relay, connector, request, options);
        Ok(())
    }

    /// Validate `request`, create a job and launch it.
    pub fn start(
        &self,
        connector: Arc<dyn Connector>,
        request: CrawlRequest,
        options: CrawlOptions,
    ) -> Result<JobId, JobError> {
        request.validate()?;
        let job = self.insert();
        let id = job.id();
        let relay = ProgressRelay::attach(&job).ok_or(JobError::AlreadyStarted(id))?;
        spawn_crawl(job, relay, connector, request, options);
        Ok(id)
    }

    /// Ask a running job to stop. Returns `false` for unknown or finished jobs.
    pub fn cancel(&self, id: &JobId) -> bool {
        match self.lookup(id) {
            Some(job) if !job.is_done() => {
                job.cancel();
                info!("job {} cancellation requested", id);
                true
            }
            _ => false,
        }
    }

    /// Evict finished jobs older than the retention window.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// [`sweep`](JobStore::sweep) as if the current time were `now`.
    ///
    /// Only drops the store's reference. A job's channel is closed by its
    /// relay, never here; observers still holding the job keep it alive.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let retention = self.config.retention();
        let expired: Vec<JobId> = self
            .jobs
            .read()
            .iter()
            .filter(|(_, job)| job.is_expired(now, retention))
            .map(|(id, _)| *id)
            .collect();
        if expired.is_empty() {
            return 0;
        }

        let mut jobs = self.jobs.write();
        for id in &expired {
            jobs.remove(id);
        }
        debug!("swept {} expired jobs, {} remain", expired.len(), jobs.len());
        expired.len()
    }

    /// Sweep every `sweep_interval` until the store is dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        let period = self.config.sweep_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                store.sweep();
            }
        })
    }
}

fn spawn_crawl(
    job: Arc<Job>,
    relay: ProgressRelay,
    connector: Arc<dyn Connector>,
    request: CrawlRequest,
    options: CrawlOptions,
) {
    let id = job.id();
    info!(
        "job {} started: {}@{}{}",
        id, request.target.user, request.target.host, request.target.root
    );

    tokio::task::spawn_blocking(move || {
        let cancel = job.cancellation_token();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            engine::run(connector.as_ref(), &request, &options, &relay, &cancel)
        }));

        let elapsed = job.started_at().elapsed();
        let results = match outcome {
            Ok(crawl) => JobResults::from_crawl(id, &crawl, elapsed),
            Err(_) => {
                warn!("job {} crawl panicked", id);
                JobResults::crashed(id, "crawl aborted unexpectedly".to_string(), elapsed)
            }
        };

        match &results.error {
            Some(e) => warn!("job {} failed: {}", id, e),
            None => info!(
                "job {} finished: {} files matched, {} terms",
                id, results.total_files, results.total_terms
            ),
        }
        relay.finish(&job, results);
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn store(retention_secs: u64) -> JobStore {
        JobStore::new(JobConfig {
            retention_secs,
            ..JobConfig::default()
        })
    }

    #[test]
    fn created_jobs_are_distinct_and_found() {
        let store = store(60);
        let a = store.create_job();
        let b = store.create_job();
        assert_ne!(a, b);
        assert_eq!(store.lookup(&a).unwrap().id(), a);
        assert_eq!(store.len(), 2);
        assert_eq!(store.active_count(), 2);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let store = store(60);
        assert!(store.lookup(&JobId::new()).is_none());
        assert!(!store.cancel(&JobId::new()));
    }

    #[test]
    fn sweep_evicts_only_expired_finished_jobs() {
        let store = store(60);
        let running = store.create_job();
        let finished = store.create_job();

        let job = store.lookup(&finished).unwrap();
        let relay = ProgressRelay::attach(&job).unwrap();
        relay.finish(&job, JobResults::crashed(finished, "x".into(), Duration::ZERO));
        let done_at = job.completed_at().unwrap();

        assert_eq!(store.sweep_at(done_at + Duration::from_secs(30)), 0);
        assert_eq!(store.sweep_at(done_at + Duration::from_secs(61)), 1);
        assert!(store.lookup(&finished).is_none());
        assert!(store.lookup(&running).is_some());

        // The evicted record stays usable for whoever still holds it.
        assert!(job.snapshot().done);
    }

    #[test]
    fn sweep_right_after_completion_keeps_job() {
        let store = store(1800);
        let id = store.create_job();
        let job = store.lookup(&id).unwrap();
        ProgressRelay::attach(&job)
            .unwrap()
            .finish(&job, JobResults::crashed(id, "x".into(), Duration::ZERO));
        assert_eq!(store.sweep(), 0);
        assert!(store.lookup(&id).is_some());
    }
}
