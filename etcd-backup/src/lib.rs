//! etcd backup library
//!
//! Snapshots the host etcd and every supported guest cluster's etcd, then
//! archives, optionally encrypts, and uploads each snapshot to S3.

pub mod catalog;
pub mod config;
pub mod fs;
pub mod gate;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod retry;
pub mod storage;
pub mod telemetry;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::Config;
pub use models::{BackupOutcome, BackupTarget, BatchResult, Provider};
pub use orchestrator::Orchestrator;
pub use utils::PipelineError;
pub type Result<T> = std::result::Result<T, PipelineError>;
