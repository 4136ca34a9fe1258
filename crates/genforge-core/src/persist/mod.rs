//! Crash-safe JSON persistence shared by the cache and the job store.

mod atomic;

pub use atomic::{atomic_read_json, atomic_write_json};
