//! Orchestrator: one host target, then every guest of the configured provider.
//!
//! Targets are processed sequentially. A target's failure is logged, recorded
//! in the [`BatchResult`] and reported to telemetry; it never stops the run.

use crate::catalog::TargetCatalog;
use crate::fs::ScratchDir;
use crate::gate;
use crate::models::{BackupOutcome, BackupTarget, BatchResult, Provider};
use crate::pipeline::{Artifact, Pipeline, SnapshotTool, SnapshotVariant};
use crate::retry::{run_with_retry, RetryPolicy};
use crate::storage::ObjectStore;
use crate::telemetry::TelemetrySink;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Where guest targets come from.
pub struct GuestSource {
    pub provider: Provider,
    pub catalog: TargetCatalog,
}

pub struct Orchestrator {
    host: BackupTarget,
    guests: Option<GuestSource>,
    scratch_root: Option<PathBuf>,
    passphrase: Option<String>,
    retry: RetryPolicy,
    snapshot: Arc<dyn SnapshotTool>,
    store: Arc<dyn ObjectStore>,
    sink: Arc<dyn TelemetrySink>,
}

impl Orchestrator {
    /// Host-only run with default retry policy and no encryption.
    /// Guest artifacts are prefixed with the host's name prefix.
    pub fn new(
        host: BackupTarget,
        snapshot: Arc<dyn SnapshotTool>,
        store: Arc<dyn ObjectStore>,
        sink: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            host,
            guests: None,
            scratch_root: None,
            passphrase: None,
            retry: RetryPolicy::default(),
            snapshot,
            store,
            sink,
        }
    }

    pub fn with_guests(mut self, provider: Provider, catalog: TargetCatalog) -> Self {
        self.guests = Some(GuestSource { provider, catalog });
        self
    }

    pub fn with_passphrase(mut self, passphrase: Option<String>) -> Self {
        self.passphrase = passphrase;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Parent for the per-run scratch directory; the system temp dir otherwise.
    pub fn with_scratch_root(mut self, root: Option<PathBuf>) -> Self {
        self.scratch_root = root;
        self
    }

    pub async fn run(&self) -> BatchResult {
        let mut batch = BatchResult::new();

        let scratch = match ScratchDir::create(self.scratch_root.as_deref()) {
            Ok(scratch) => scratch,
            Err(e) => {
                error!("Failed to create scratch directory: {}", e);
                batch.record_phase_failure(format!("scratch directory: {}", e));
                return batch;
            }
        };

        let pipeline = Pipeline::new(
            scratch.path(),
            self.passphrase.clone(),
            self.snapshot.clone(),
            self.store.clone(),
        );

        self.run_host(&pipeline, &mut batch).await;

        match &self.guests {
            Some(guests) => self.run_guests(guests, &pipeline, scratch.path(), &mut batch).await,
            None => info!("No provider configured, skipping guest cluster backups"),
        }

        scratch.release();

        info!(
            targets = batch.target_count(),
            succeeded = batch.outcomes().iter().filter(|o| o.success).count(),
            skipped = batch.skipped().len(),
            any_failed = batch.any_failed(),
            "Backup run finished"
        );
        if batch.any_failed() {
            error!("Failed targets: {:?}", batch.failed_targets());
        }
        if let Ok(outcomes) = serde_json::to_string(batch.outcomes()) {
            debug!("Outcomes: {}", outcomes);
        }

        batch
    }

    async fn run_host(&self, pipeline: &Pipeline, batch: &mut BatchResult) {
        let host = &self.host;
        batch.count_target();

        for variant in SnapshotVariant::for_target(host) {
            if let SnapshotVariant::V2 { .. } = variant {
                // Local copy of the data directory; not retried
                if let Err(e) = pipeline.run(host, &variant).await {
                    error!(cluster = "host", stage = e.stage(), "Etcd v2 backup failed: {}", e);
                    self.finish(batch, BackupOutcome::failed(&host.id)).await;
                    return;
                }
                info!(cluster = "host", "Etcd v2 backup finished");
                continue;
            }

            self.backup_with_retry(pipeline, host, &variant, batch).await;
        }
    }

    async fn run_guests(&self, guests: &GuestSource, pipeline: &Pipeline, scratch: &Path, batch: &mut BatchResult) {
        let provider = guests.provider;
        let catalog = &guests.catalog;

        let ids = match catalog.list_targets(provider).await {
            Ok(ids) => ids,
            Err(e) => {
                error!(provider = %provider, "Guest cluster listing failed: {}", e);
                batch.record_phase_failure(e.to_string());
                return;
            }
        };

        for id in ids {
            batch.count_target();

            match gate::is_supported(catalog.api(), provider, &id).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(cluster = %id, "Release is too old for etcd backup, skipping");
                    batch.record_skipped(&id);
                    continue;
                }
                Err(e) => {
                    error!(cluster = %id, stage = "gate", "{}", e);
                    self.finish(batch, BackupOutcome::failed(&id)).await;
                    continue;
                }
            }

            let tls = match catalog.resolve_credentials(&id, scratch).await {
                Ok(tls) => tls,
                Err(e) => {
                    error!(cluster = %id, stage = "credentials", "{}", e);
                    self.finish(batch, BackupOutcome::failed(&id)).await;
                    continue;
                }
            };

            let endpoint = match catalog.resolve_endpoint(&id, provider).await {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    error!(cluster = %id, stage = "endpoint", "{}", e);
                    self.finish(batch, BackupOutcome::failed(&id)).await;
                    continue;
                }
            };

            let target = BackupTarget::guest(&self.host.name_prefix, id, provider, endpoint, tls);
            self.backup_with_retry(pipeline, &target, &SnapshotVariant::V3, batch).await;
        }
    }

    async fn backup_with_retry(
        &self,
        pipeline: &Pipeline,
        target: &BackupTarget,
        variant: &SnapshotVariant,
        batch: &mut BatchResult,
    ) {
        let result = run_with_retry(self.retry, target.label(), move |_| pipeline.run(target, variant)).await;

        let outcome = match result {
            Ok(artifact) => {
                info!(
                    cluster = %target.label(),
                    artifact = %artifact.filename,
                    "Etcd {} backup finished successfully",
                    variant.version()
                );
                outcome_of(target, &artifact)
            }
            Err(e) => {
                error!(cluster = %target.label(), "Etcd {} backup failed: {}", variant.version(), e);
                BackupOutcome::failed(&target.id)
            }
        };

        self.finish(batch, outcome).await;
    }

    /// Report an outcome to telemetry, then record it.
    async fn finish(&self, batch: &mut BatchResult, outcome: BackupOutcome) {
        if let Err(e) = self.sink.record(&outcome).await {
            warn!(cluster = %outcome.target_id, "Failed to push backup metrics: {}", e);
        }
        batch.record(outcome);
    }
}

fn outcome_of(target: &BackupTarget, artifact: &Artifact) -> BackupOutcome {
    match artifact.size_bytes {
        Some(size) => BackupOutcome::succeeded(&target.id, size, &artifact.timings),
        None => BackupOutcome::failed(&target.id),
    }
}
