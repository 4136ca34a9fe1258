//! Durable, strictly sequential generation queue.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc, watch, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};

use super::store::{is_valid_job_id, JobStore};
use super::types::{Job, JobUpdate, QueueEvent};
use crate::models::Metadata;
use crate::pipeline::{GenerationPipeline, ProgressEvent};
use crate::{GenforgeError, Result};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Accepts generation requests as persisted jobs and runs them one at a time.
///
/// Cloning is cheap; all clones share the same queue.
#[derive(Clone)]
pub struct GenerationQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    store: JobStore,
    pipeline: Arc<dyn GenerationPipeline>,
    state: Mutex<QueueState>,
    /// Held across read-merge-write so updates reach disk in order.
    writes: AsyncMutex<()>,
    events: broadcast::Sender<QueueEvent>,
    idle: watch::Sender<bool>,
}

#[derive(Default)]
struct QueueState {
    jobs: HashMap<String, Job>,
    pending: VecDeque<String>,
    /// A worker task is draining `pending`.
    running: bool,
}

impl GenerationQueue {
    pub fn new(jobs_dir: impl Into<PathBuf>, pipeline: Arc<dyn GenerationPipeline>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (idle, _) = watch::channel(true);
        Self {
            inner: Arc::new(QueueInner {
                store: JobStore::new(jobs_dir),
                pipeline,
                state: Mutex::new(QueueState::default()),
                writes: AsyncMutex::new(()),
                events,
                idle,
            }),
        }
    }

    /// Create the jobs directory, re-enqueue unfinished jobs and start
    /// processing them. Returns the number of recovered jobs.
    pub async fn init(&self) -> Result<usize> {
        self.inner.store.ensure_dir()?;
        let recovered = self.recover();
        if recovered > 0 {
            info!("Recovered {} unfinished job(s)", recovered);
            self.start_processing();
        }
        Ok(recovered)
    }

    /// Load pending and processing jobs from disk into the queue, oldest
    /// first. Jobs already known to this queue are not enqueued again.
    fn recover(&self) -> usize {
        let mut unfinished: Vec<Job> = self
            .inner
            .store
            .load_all()
            .into_iter()
            .filter(|job| !job.status.is_terminal())
            .collect();
        unfinished.sort_by_key(|job| job.created_at);

        let mut state = self.inner.state.lock().expect("queue lock poisoned");
        let mut recovered = 0;
        for job in unfinished {
            if state.jobs.contains_key(&job.id) {
                continue;
            }
            debug!("Restored job {} ({:?})", job.id, job.status);
            state.pending.push_back(job.id.clone());
            state.jobs.insert(job.id.clone(), job);
            recovered += 1;
        }
        recovered
    }

    /// Persist a new pending job, enqueue it and make sure a worker is
    /// running. Returns the job id.
    pub async fn submit(&self, prompt: impl Into<String>, metadata: Metadata) -> Result<String> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(GenforgeError::Validation {
                field: "prompt".to_string(),
                message: "prompt must not be empty".to_string(),
            });
        }

        let job = Job::new(prompt, metadata);
        self.save(job.clone()).await?;

        let job_id = job.id.clone();
        {
            let mut state = self.inner.state.lock().expect("queue lock poisoned");
            state.jobs.insert(job_id.clone(), job.clone());
            state.pending.push_back(job_id.clone());
        }
        info!("Queued job {}", job_id);

        let _ = self.inner.events.send(QueueEvent::Created(job));
        self.start_processing();
        Ok(job_id)
    }

    /// Look up a job in memory, then on disk.
    ///
    /// Unknown and malformed ids yield `None`.
    pub fn get(&self, job_id: &str) -> Result<Option<Job>> {
        if !is_valid_job_id(job_id) {
            return Ok(None);
        }
        if let Some(job) = self
            .inner
            .state
            .lock()
            .expect("queue lock poisoned")
            .jobs
            .get(job_id)
        {
            return Ok(Some(job.clone()));
        }
        self.inner.store.load(job_id)
    }

    /// Merge `update` into a job and persist it before returning.
    ///
    /// If the write fails the in-memory job is left untouched and the error
    /// is returned. Concurrent updates are last-writer-wins.
    pub async fn update(&self, job_id: &str, update: JobUpdate) -> Result<Option<Job>> {
        if !is_valid_job_id(job_id) {
            return Ok(None);
        }

        let _write = self.inner.writes.lock().await;
        let in_memory = self
            .inner
            .state
            .lock()
            .expect("queue lock poisoned")
            .jobs
            .get(job_id)
            .cloned();
        let current = match in_memory {
            Some(job) => Some(job),
            None => self.inner.store.load(job_id)?,
        };
        let Some(mut job) = current else {
            return Ok(None);
        };

        update.apply(&mut job);
        if let Err(e) = self.save(job.clone()).await {
            error!("Failed to persist job {}: {}", job_id, e);
            return Err(e);
        }
        self.inner
            .state
            .lock()
            .expect("queue lock poisoned")
            .jobs
            .insert(job_id.to_string(), job.clone());

        let _ = self.inner.events.send(QueueEvent::Updated(job.clone()));
        Ok(Some(job))
    }

    /// Write a job record off the async runtime.
    async fn save(&self, job: Job) -> Result<()> {
        let store = self.inner.store.clone();
        tokio::task::spawn_blocking(move || store.save(&job))
            .await
            .map_err(|e| GenforgeError::Other(format!("job write task failed: {e}")))?
    }

    /// All jobs known in memory, oldest first.
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .inner
            .state
            .lock()
            .expect("queue lock poisoned")
            .jobs
            .values()
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    /// Ids still waiting to run, in run order.
    pub fn queued_ids(&self) -> Vec<String> {
        self.inner
            .state
            .lock()
            .expect("queue lock poisoned")
            .pending
            .iter()
            .cloned()
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_processing(&self) -> bool {
        self.inner.state.lock().expect("queue lock poisoned").running
    }

    /// Wait until no worker is running and nothing is queued.
    pub async fn wait_until_idle(&self) {
        let mut idle = self.inner.idle.subscribe();
        // The sender lives as long as the queue, so this cannot fail.
        let _ = idle.wait_for(|idle| *idle).await;
    }

    fn start_processing(&self) {
        {
            let mut state = self.inner.state.lock().expect("queue lock poisoned");
            if state.running || state.pending.is_empty() {
                return;
            }
            state.running = true;
            self.inner.idle.send_replace(false);
        }

        let queue = self.clone();
        tokio::spawn(async move {
            while let Some(job_id) = queue.next_job_id() {
                queue.process_job(&job_id).await;
            }
            debug!("Queue drained");
        });
    }

    /// Pop the next id, or mark the worker stopped when there is none.
    fn next_job_id(&self) -> Option<String> {
        let mut state = self.inner.state.lock().expect("queue lock poisoned");
        let next = state.pending.pop_front();
        if next.is_none() {
            state.running = false;
            self.inner.idle.send_replace(true);
        }
        next
    }

    async fn process_job(&self, job_id: &str) {
        let job = match self.get(job_id) {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!("Queued job {} no longer exists", job_id);
                return;
            }
            Err(e) => {
                error!("Failed to load job {}: {}", job_id, e);
                return;
            }
        };
        if job.status.is_terminal() {
            debug!("Skipping job {} already {:?}", job_id, job.status);
            return;
        }

        if let Err(e) = self.update(job_id, JobUpdate::started()).await {
            error!("Job {} not started: {}", job_id, e);
            return;
        }
        info!("Processing job {}", job_id);

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<ProgressEvent>();
        let forwarder = {
            let queue = self.clone();
            let job_id = job_id.to_string();
            tokio::spawn(async move {
                while let Some(event) = progress_rx.recv().await {
                    if let Err(e) = queue.update(&job_id, JobUpdate::step(event)).await {
                        warn!("Dropped progress for job {}: {}", job_id, e);
                    }
                }
            })
        };

        let pipeline = self.inner.pipeline.clone();
        let request = job.request();
        let outcome = tokio::spawn(async move { pipeline.run(&request, &progress_tx).await }).await;

        // The sender was dropped with the pipeline task, so this finishes
        // once every progress event is recorded.
        if let Err(e) = forwarder.await {
            warn!("Progress forwarder for job {} ended abnormally: {}", job_id, e);
        }

        let (update, completed) = match outcome {
            Ok(Ok(result)) => (JobUpdate::completed(result), true),
            Ok(Err(e)) => (JobUpdate::failed(e.to_string()), false),
            Err(e) => (JobUpdate::failed(format!("pipeline task failed: {e}")), false),
        };

        match self.update(job_id, update).await {
            Ok(Some(job)) if completed => {
                info!("Job {} completed", job_id);
                let _ = self.inner.events.send(QueueEvent::Completed(job));
            }
            Ok(Some(job)) => {
                warn!("Job {} failed: {}", job_id, job.error.as_deref().unwrap_or("unknown error"));
                let _ = self.inner.events.send(QueueEvent::Failed(job));
            }
            Ok(None) => warn!("Job {} disappeared before completion", job_id),
            Err(e) => error!("Failed to record outcome of job {}: {}", job_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StructuredOutput;
    use crate::queue::JobStatus;
    use crate::pipeline::{GenerationRequest, ProgressSink, Stage};
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Records each run's start and end and emits two progress events.
    #[derive(Default)]
    struct TimedPipeline {
        runs: Mutex<Vec<(String, chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)>>,
    }

    #[async_trait]
    impl GenerationPipeline for TimedPipeline {
        async fn run(
            &self,
            request: &GenerationRequest,
            progress: &dyn ProgressSink,
        ) -> Result<StructuredOutput> {
            let start = chrono::Utc::now();
            progress.emit(ProgressEvent::stage(Stage::CacheCheck, "checking"));
            tokio::time::sleep(Duration::from_millis(20)).await;
            progress.emit(ProgressEvent::stage(Stage::Complete, "done"));
            let end = chrono::Utc::now();
            self.runs
                .lock()
                .unwrap()
                .push((request.prompt.clone(), start, end));
            Ok(StructuredOutput {
                name: format!("{}App", request.prompt),
                ..Default::default()
            })
        }
    }

    struct ErrPipeline;

    #[async_trait]
    impl GenerationPipeline for ErrPipeline {
        async fn run(
            &self,
            _request: &GenerationRequest,
            _progress: &dyn ProgressSink,
        ) -> Result<StructuredOutput> {
            Err(GenforgeError::Other("pipeline exploded".into()))
        }
    }

    struct PanicPipeline;

    #[async_trait]
    impl GenerationPipeline for PanicPipeline {
        async fn run(
            &self,
            _request: &GenerationRequest,
            _progress: &dyn ProgressSink,
        ) -> Result<StructuredOutput> {
            panic!("unexpected state")
        }
    }

    #[tokio::test]
    async fn test_jobs_run_in_order_without_overlap() {
        let tmp = TempDir::new().unwrap();
        let pipeline = Arc::new(TimedPipeline::default());
        let queue = GenerationQueue::new(tmp.path(), pipeline.clone());

        let mut ids = Vec::new();
        for prompt in ["first", "second", "third"] {
            ids.push(queue.submit(prompt, Metadata::new()).await.unwrap());
        }
        queue.wait_until_idle().await;

        let runs = pipeline.runs.lock().unwrap().clone();
        let order: Vec<&str> = runs.iter().map(|(p, _, _)| p.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
        for pair in runs.windows(2) {
            assert!(pair[1].1 >= pair[0].2, "runs overlapped");
        }

        let jobs: Vec<Job> = ids.iter().map(|id| queue.get(id).unwrap().unwrap()).collect();
        for pair in jobs.windows(2) {
            assert!(pair[1].started_at.unwrap() >= pair[0].completed_at.unwrap());
        }
        assert!(jobs.iter().all(|j| j.status == JobStatus::Completed));
    }

    #[tokio::test]
    async fn test_completed_job_is_persisted_with_steps() {
        let tmp = TempDir::new().unwrap();
        let queue = GenerationQueue::new(tmp.path(), Arc::new(TimedPipeline::default()));

        let id = queue.submit("notes", Metadata::new()).await.unwrap();
        queue.wait_until_idle().await;

        let on_disk = JobStore::new(tmp.path()).load(&id).unwrap().unwrap();
        assert_eq!(on_disk.status, JobStatus::Completed);
        assert_eq!(on_disk.progress, 100);
        assert_eq!(on_disk.result.unwrap().name, "notesApp");
        let steps: Vec<Stage> = on_disk.steps.iter().map(|s| s.step).collect();
        assert_eq!(steps, vec![Stage::CacheCheck, Stage::Complete]);
        assert!(on_disk.started_at.unwrap() <= on_disk.completed_at.unwrap());
    }

    #[tokio::test]
    async fn test_pipeline_error_marks_job_failed() {
        let tmp = TempDir::new().unwrap();
        let queue = GenerationQueue::new(tmp.path(), Arc::new(ErrPipeline));
        let mut events = queue.subscribe();

        let id = queue.submit("anything", Metadata::new()).await.unwrap();
        queue.wait_until_idle().await;

        let job = queue.get(&id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains("pipeline exploded"));
        assert!(job.completed_at.is_some());

        let mut saw_failed = false;
        while let Ok(event) = events.try_recv() {
            if let QueueEvent::Failed(job) = event {
                assert_eq!(job.id, id);
                saw_failed = true;
            }
        }
        assert!(saw_failed);
    }

    #[tokio::test]
    async fn test_pipeline_panic_marks_job_failed_and_queue_continues() {
        let tmp = TempDir::new().unwrap();
        let queue = GenerationQueue::new(tmp.path(), Arc::new(PanicPipeline));

        let first = queue.submit("one", Metadata::new()).await.unwrap();
        let second = queue.submit("two", Metadata::new()).await.unwrap();
        queue.wait_until_idle().await;

        for id in [first, second] {
            let job = queue.get(&id).unwrap().unwrap();
            assert_eq!(job.status, JobStatus::Failed);
            assert!(job.error.unwrap().contains("pipeline task failed"));
        }
    }

    #[tokio::test]
    async fn test_recovery_reenqueues_unfinished_jobs_once() {
        let tmp = TempDir::new().unwrap();
        let store = JobStore::new(tmp.path());

        let mut processing = Job::new("interrupted", Metadata::new());
        processing.status = JobStatus::Processing;
        processing.created_at -= chrono::Duration::seconds(10);
        let pending = Job::new("waiting", Metadata::new());
        let mut done = Job::new("finished", Metadata::new());
        done.status = JobStatus::Completed;
        for job in [&pending, &processing, &done] {
            store.save(job).unwrap();
        }

        let pipeline = Arc::new(TimedPipeline::default());
        let queue = GenerationQueue::new(tmp.path(), pipeline.clone());
        assert_eq!(queue.recover(), 2);
        assert_eq!(queue.queued_ids(), vec![processing.id.clone(), pending.id.clone()]);
        // A second scan does not enqueue the same ids again.
        assert_eq!(queue.recover(), 0);
        assert_eq!(queue.queued_ids().len(), 2);

        queue.start_processing();
        queue.wait_until_idle().await;

        let prompts: Vec<String> = pipeline.runs.lock().unwrap().iter().map(|r| r.0.clone()).collect();
        assert_eq!(prompts, vec!["interrupted", "waiting"]);
        assert_eq!(
            store.load(&done.id).unwrap().unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_init_recovers_and_runs() {
        let tmp = TempDir::new().unwrap();
        let jobs_dir = tmp.path().join("jobs");
        let store = JobStore::new(&jobs_dir);
        let mut job = Job::new("resume me", Metadata::new());
        job.status = JobStatus::Processing;
        store.save(&job).unwrap();

        let queue = GenerationQueue::new(&jobs_dir, Arc::new(TimedPipeline::default()));
        assert_eq!(queue.init().await.unwrap(), 1);
        queue.wait_until_idle().await;

        assert_eq!(queue.get(&job.id).unwrap().unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_get_falls_back_to_disk_and_rejects_bad_ids() {
        let tmp = TempDir::new().unwrap();
        let mut archived = Job::new("old", Metadata::new());
        archived.status = JobStatus::Completed;
        JobStore::new(tmp.path()).save(&archived).unwrap();

        let queue = GenerationQueue::new(tmp.path(), Arc::new(TimedPipeline::default()));
        assert_eq!(queue.get(&archived.id).unwrap().unwrap().prompt, "old");
        assert!(queue.get("does-not-exist").unwrap().is_none());
        assert!(queue.get("../../etc/passwd").unwrap().is_none());
        assert!(queue.list().is_empty());
    }

    #[tokio::test]
    async fn test_update_merges_and_persists() {
        let tmp = TempDir::new().unwrap();
        let mut archived = Job::new("old", Metadata::new());
        archived.status = JobStatus::Failed;
        JobStore::new(tmp.path()).save(&archived).unwrap();

        let queue = GenerationQueue::new(tmp.path(), Arc::new(TimedPipeline::default()));
        let updated = queue
            .update(
                &archived.id,
                JobUpdate {
                    error: Some("retried manually".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, JobStatus::Failed);
        assert_eq!(updated.error.as_deref(), Some("retried manually"));

        let on_disk = JobStore::new(tmp.path()).load(&archived.id).unwrap().unwrap();
        assert_eq!(on_disk.error.as_deref(), Some("retried manually"));
        assert!(queue
            .update("missing-id", JobUpdate::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_reach_disk_in_order() {
        let tmp = TempDir::new().unwrap();
        let job = Job::new("busy", Metadata::new());
        JobStore::new(tmp.path()).save(&job).unwrap();

        let queue = GenerationQueue::new(tmp.path(), Arc::new(TimedPipeline::default()));
        let updates = (0..20).map(|i| {
            let queue = queue.clone();
            let id = job.id.clone();
            tokio::spawn(async move {
                let event = ProgressEvent::at(Stage::Streaming, 21, format!("chunk {i}"));
                queue.update(&id, JobUpdate::step(event)).await.unwrap();
            })
        });
        for handle in futures::future::join_all(updates).await {
            handle.unwrap();
        }

        let in_memory = queue.get(&job.id).unwrap().unwrap();
        let on_disk = JobStore::new(tmp.path()).load(&job.id).unwrap().unwrap();
        assert_eq!(in_memory.steps.len(), 20);
        assert_eq!(on_disk.steps, in_memory.steps);
    }

    #[tokio::test]
    async fn test_empty_prompt_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let queue = GenerationQueue::new(tmp.path(), Arc::new(TimedPipeline::default()));
        assert!(matches!(
            queue.submit("   ", Metadata::new()).await,
            Err(GenforgeError::Validation { .. })
        ));
        assert!(queue.list().is_empty());
    }
}
