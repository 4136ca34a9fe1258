//! Job submission and inspection on Genforge.

use tokio::sync::broadcast;

use crate::error::{GenforgeError, Result};
use crate::models::{Metadata, StructuredOutput};
use crate::pipeline::{GenerationRequest, NoopProgress};
use crate::queue::{Job, QueueEvent};
use crate::Genforge;

impl Genforge {
    /// Queue a prompt. The job is on disk before its id is returned.
    pub async fn submit(&self, prompt: impl Into<String>, metadata: Metadata) -> Result<String> {
        self.queue.submit(prompt, metadata).await
    }

    /// Look up a job by id.
    pub fn get_job(&self, job_id: &str) -> Result<Job> {
        self.queue
            .get(job_id)?
            .ok_or_else(|| GenforgeError::JobNotFound {
                job_id: job_id.to_string(),
            })
    }

    /// Jobs known to this process, oldest first.
    pub fn list_jobs(&self) -> Vec<Job> {
        self.queue.list()
    }

    /// Ids waiting to run, in order.
    pub fn queued_job_ids(&self) -> Vec<String> {
        self.queue.queued_ids()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.queue.subscribe()
    }

    /// Wait for the queue to drain.
    pub async fn wait_until_idle(&self) {
        self.queue.wait_until_idle().await
    }

    /// Run one request directly, bypassing the queue.
    pub async fn generate_now(&self, request: &GenerationRequest) -> StructuredOutput {
        self.orchestrator.generate(request, &NoopProgress).await
    }
}
