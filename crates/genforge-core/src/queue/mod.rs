//! Persistent FIFO job queue.
//!
//! Jobs are written to disk before they are acknowledged and processed one
//! at a time in submission order. Unfinished jobs found on disk at startup
//! are resumed.

mod manager;
mod store;
mod types;

pub use manager::GenerationQueue;
pub use store::{is_valid_job_id, JobStore};
pub use types::{Job, JobStatus, JobUpdate, QueueEvent};
