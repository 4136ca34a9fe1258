//! Job records and queue events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Metadata, StructuredOutput};
use crate::pipeline::{GenerationRequest, ProgressEvent};

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and failed jobs are never run again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// A durable generation request and everything recorded while running it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub prompt: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub status: JobStatus,
    /// Percent complete, 0 to 100.
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub steps: Vec<ProgressEvent>,
    #[serde(default)]
    pub result: Option<StructuredOutput>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// New pending job with a random UUID v4 id.
    pub fn new(prompt: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            prompt: prompt.into(),
            metadata,
            status: JobStatus::Pending,
            progress: 0,
            steps: Vec::new(),
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn request(&self) -> GenerationRequest {
        GenerationRequest {
            prompt: self.prompt.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Fields to merge into a job. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    /// Appended to `steps`; its progress also becomes the job's progress.
    pub step: Option<ProgressEvent>,
    pub result: Option<StructuredOutput>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobUpdate {
    pub fn started() -> Self {
        Self {
            status: Some(JobStatus::Processing),
            progress: Some(0),
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn step(event: ProgressEvent) -> Self {
        Self {
            step: Some(event),
            ..Default::default()
        }
    }

    pub fn completed(result: StructuredOutput) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            result: Some(result),
            completed_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error.into()),
            completed_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub(crate) fn apply(self, job: &mut Job) {
        if let Some(event) = self.step {
            job.progress = event.progress;
            job.steps.push(event);
        }
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(progress) = self.progress {
            job.progress = progress.min(100);
        }
        if let Some(result) = self.result {
            job.result = Some(result);
        }
        if let Some(error) = self.error {
            job.error = Some(error);
        }
        if let Some(started_at) = self.started_at {
            job.started_at = Some(started_at);
        }
        if let Some(completed_at) = self.completed_at {
            job.completed_at = Some(completed_at);
        }
    }
}

/// Job lifecycle notifications.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    Created(Job),
    Updated(Job),
    Completed(Job),
    Failed(Job),
}

impl QueueEvent {
    pub fn job(&self) -> &Job {
        match self {
            QueueEvent::Created(job)
            | QueueEvent::Updated(job)
            | QueueEvent::Completed(job)
            | QueueEvent::Failed(job) => job,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Stage;

    #[test]
    fn test_new_job_is_pending() {
        let job = Job::new("make a blog", Metadata::new());
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert!(uuid::Uuid::parse_str(&job.id).is_ok());
        assert!(job.started_at.is_none());
    }

    #[test]
    fn test_step_update_appends_and_sets_progress() {
        let mut job = Job::new("x", Metadata::new());
        JobUpdate::step(ProgressEvent::stage(Stage::QualityEnhancement, "checking")).apply(&mut job);
        JobUpdate::step(ProgressEvent::stage(Stage::ImageFetching, "images")).apply(&mut job);

        assert_eq!(job.steps.len(), 2);
        assert_eq!(job.steps[1].step, Stage::ImageFetching);
        assert_eq!(job.progress, 90);
    }

    #[test]
    fn test_terminal_updates() {
        let mut job = Job::new("x", Metadata::new());
        JobUpdate::started().apply(&mut job);
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.started_at.is_some());

        JobUpdate::completed(StructuredOutput::default()).apply(&mut job);
        assert!(job.status.is_terminal());
        assert_eq!(job.progress, 100);
        assert!(job.result.is_some());
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_job_json_shape() {
        let job = Job::new("x", Metadata::new());
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["status"], "pending");
        assert!(value.get("createdAt").is_some());
        assert!(value["result"].is_null());
    }
}
