use serde::Serialize;
use std::time::Duration;

/// Time spent in one pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageTiming {
    #[default]
    Pending,
    Ran(Duration),
    /// Stage intentionally not run (e.g. encryption with no passphrase)
    Skipped,
}

impl StageTiming {
    /// Milliseconds for telemetry: a skipped stage took no time, a pending one is unknown.
    pub fn as_millis(&self) -> i64 {
        match self {
            StageTiming::Ran(d) => d.as_millis() as i64,
            StageTiming::Skipped => 0,
            StageTiming::Pending => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageTimings {
    pub create: StageTiming,
    pub encrypt: StageTiming,
    pub upload: StageTiming,
}

/// Result of backing up one target, as reported to telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupOutcome {
    pub target_id: String,
    pub success: bool,
    /// Stored size as seen by object storage, -1 when unknown
    pub size_bytes: i64,
    pub creation_ms: i64,
    pub encryption_ms: i64,
    pub upload_ms: i64,
}

impl BackupOutcome {
    pub fn succeeded(target_id: impl Into<String>, size_bytes: u64, timings: &StageTimings) -> Self {
        Self {
            target_id: target_id.into(),
            success: true,
            size_bytes: size_bytes as i64,
            creation_ms: timings.create.as_millis(),
            encryption_ms: timings.encrypt.as_millis(),
            upload_ms: timings.upload.as_millis(),
        }
    }

    pub fn failed(target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            success: false,
            size_bytes: -1,
            creation_ms: -1,
            encryption_ms: -1,
            upload_ms: -1,
        }
    }
}

/// Aggregate over every target of one run.
///
/// `any_failed()` is a pure union: true iff some recorded outcome failed or a
/// step outside the per-target pipeline (e.g. listing guests) failed.
#[derive(Debug, Default)]
pub struct BatchResult {
    outcomes: Vec<BackupOutcome>,
    skipped: Vec<String>,
    phase_failures: Vec<String>,
    target_count: usize,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a target as attempted. Called once per target, before any of its steps run.
    pub fn count_target(&mut self) {
        self.target_count += 1;
    }

    pub fn record(&mut self, outcome: BackupOutcome) {
        self.outcomes.push(outcome);
    }

    /// A target that was attempted but rejected by the version gate.
    pub fn record_skipped(&mut self, target_id: impl Into<String>) {
        self.skipped.push(target_id.into());
    }

    /// A failure that belongs to no single target.
    pub fn record_phase_failure(&mut self, reason: impl Into<String>) {
        self.phase_failures.push(reason.into());
    }

    pub fn any_failed(&self) -> bool {
        !self.phase_failures.is_empty() || self.outcomes.iter().any(|o| !o.success)
    }

    pub fn target_count(&self) -> usize {
        self.target_count
    }

    pub fn outcomes(&self) -> &[BackupOutcome] {
        &self.outcomes
    }

    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn phase_failures(&self) -> &[String] {
        &self.phase_failures
    }

    /// Ids of targets with at least one failed outcome, in processing order.
    pub fn failed_targets(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for outcome in self.outcomes.iter().filter(|o| !o.success) {
            if !ids.contains(&outcome.target_id.as_str()) {
                ids.push(&outcome.target_id);
            }
        }
        ids
    }

    pub fn exit_code(&self) -> i32 {
        if self.any_failed() {
            1
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timings() -> StageTimings {
        StageTimings {
            create: StageTiming::Ran(Duration::from_millis(1500)),
            encrypt: StageTiming::Skipped,
            upload: StageTiming::Ran(Duration::from_millis(250)),
        }
    }

    #[test]
    fn test_success_outcome_uses_timings() {
        let outcome = BackupOutcome::succeeded("abc", 4096, &timings());
        assert!(outcome.success);
        assert_eq!(outcome.size_bytes, 4096);
        assert_eq!(outcome.creation_ms, 1500);
        assert_eq!(outcome.encryption_ms, 0);
        assert_eq!(outcome.upload_ms, 250);
    }

    #[test]
    fn test_failure_outcome_is_unknown_everywhere() {
        let outcome = BackupOutcome::failed("abc");
        assert!(!outcome.success);
        assert_eq!(outcome.size_bytes, -1);
        assert_eq!(outcome.creation_ms, -1);
        assert_eq!(outcome.encryption_ms, -1);
        assert_eq!(outcome.upload_ms, -1);
    }

    #[test]
    fn test_any_failed_is_union_of_outcomes() {
        let mut batch = BatchResult::new();
        assert!(!batch.any_failed());
        assert_eq!(batch.exit_code(), 0);

        batch.count_target();
        batch.record(BackupOutcome::succeeded("", 10, &timings()));
        batch.count_target();
        batch.record(BackupOutcome::failed("b"));
        batch.count_target();
        batch.record(BackupOutcome::succeeded("c", 10, &timings()));

        assert!(batch.any_failed());
        assert_eq!(batch.exit_code(), 1);
        assert_eq!(batch.target_count(), 3);
        assert_eq!(batch.failed_targets(), vec!["b"]);
    }

    #[test]
    fn test_skipped_targets_do_not_fail_batch() {
        let mut batch = BatchResult::new();
        batch.count_target();
        batch.record_skipped("old-cluster");
        assert!(!batch.any_failed());
        assert_eq!(batch.skipped(), &["old-cluster".to_string()]);
    }

    #[test]
    fn test_phase_failure_fails_batch() {
        let mut batch = BatchResult::new();
        batch.record_phase_failure("listing guest clusters failed");
        assert!(batch.any_failed());
        assert!(batch.outcomes().is_empty());
    }
}
