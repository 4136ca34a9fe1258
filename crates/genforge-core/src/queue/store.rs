//! One-file-per-job persistence for crash recovery.
//!
//! Every job lives at `{jobs_dir}/{job_id}.json`. Files are never deleted;
//! terminal jobs stay on disk as an audit trail.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::types::Job;
use crate::persist::{atomic_read_json, atomic_write_json};
use crate::{GenforgeError, Result};

/// Job ids are used as file names, so only UUID-like ids are accepted.
pub fn is_valid_job_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 64 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Manages job files in a directory.
#[derive(Debug, Clone)]
pub struct JobStore {
    dir: PathBuf,
}

impl JobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| GenforgeError::io_with_path(e, &self.dir))
    }

    fn path_for(&self, job_id: &str) -> Result<PathBuf> {
        if !is_valid_job_id(job_id) {
            return Err(GenforgeError::InvalidJobId(job_id.to_string()));
        }
        Ok(self.dir.join(format!("{job_id}.json")))
    }

    /// Write the full record atomically.
    pub fn save(&self, job: &Job) -> Result<()> {
        let path = self.path_for(&job.id)?;
        debug!("Writing job {} ({:?}) to {}", job.id, job.status, path.display());
        atomic_write_json(&path, job, false).map_err(|e| GenforgeError::JobPersistence {
            job_id: job.id.clone(),
            message: e.to_string(),
        })
    }

    /// Load a job; `None` when there is no record.
    pub fn load(&self, job_id: &str) -> Result<Option<Job>> {
        atomic_read_json(&self.path_for(job_id)?)
    }

    /// Load every readable job record. Unreadable files are skipped.
    pub fn load_all(&self) -> Vec<Job> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Failed to scan job directory {}: {}", self.dir.display(), e);
                return Vec::new();
            }
        };

        let mut jobs = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match atomic_read_json::<Job>(&path) {
                Ok(Some(job)) => jobs.push(job),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable job file {}: {}", path.display(), e),
            }
        }
        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;
    use crate::queue::JobStatus;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let store = JobStore::new(tmp.path().join("jobs"));

        let job = Job::new("make a store", Metadata::new());
        store.save(&job).unwrap();

        let loaded = store.load(&job.id).unwrap().unwrap();
        assert_eq!(loaded, job);
        assert!(tmp.path().join("jobs").join(format!("{}.json", job.id)).exists());
    }

    #[test]
    fn test_save_overwrites() {
        let tmp = TempDir::new().unwrap();
        let store = JobStore::new(tmp.path());

        let mut job = Job::new("x", Metadata::new());
        store.save(&job).unwrap();
        job.status = JobStatus::Failed;
        store.save(&job).unwrap();

        let all = store.load_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, JobStatus::Failed);
    }

    #[test]
    fn test_load_missing() {
        let tmp = TempDir::new().unwrap();
        let store = JobStore::new(tmp.path());
        assert!(store.load("0b7c2a44-0000-4000-8000-000000000000").unwrap().is_none());
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let tmp = TempDir::new().unwrap();
        let store = JobStore::new(tmp.path());
        assert!(matches!(
            store.load("../secrets"),
            Err(GenforgeError::InvalidJobId(_))
        ));
        assert!(!is_valid_job_id(""));
        assert!(!is_valid_job_id("a/b"));
        assert!(is_valid_job_id("3f2b8e1c-1d2e-4f5a-9b8c-7d6e5f4a3b2c"));
    }

    #[test]
    fn test_load_all_skips_junk() {
        let tmp = TempDir::new().unwrap();
        let store = JobStore::new(tmp.path());

        store.save(&Job::new("a", Metadata::new())).unwrap();
        store.save(&Job::new("b", Metadata::new())).unwrap();
        fs::write(tmp.path().join("broken.json"), "{not json").unwrap();
        fs::write(tmp.path().join("notes.txt"), "ignore me").unwrap();

        assert_eq!(store.load_all().len(), 2);
    }

    #[test]
    fn test_load_all_without_directory() {
        let tmp = TempDir::new().unwrap();
        let store = JobStore::new(tmp.path().join("missing"));
        assert!(store.load_all().is_empty());
    }
}
