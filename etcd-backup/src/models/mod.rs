//! Data model shared by every stage of a run.

pub mod outcome;
pub mod target;

pub use outcome::{BackupOutcome, BatchResult, StageTiming, StageTimings};
pub use target::{BackupTarget, Provider, TlsFiles};
