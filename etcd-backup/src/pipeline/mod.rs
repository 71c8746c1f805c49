//! Artifact pipeline: create snapshot, optionally encrypt, upload.
//!
//! Stages are strictly ordered and each one consumes the filename the
//! previous stage produced:
//!
//! ```text
//! <prefix>-etcd-backup-v3-<ts>.db  --create-->  ….db.tar.zst  --encrypt-->  ….db.tar.zst.enc  --upload--> size
//! ```
//!
//! Every `create` derives a fresh timestamped name, so a retried attempt never
//! reuses a local file left behind by a failed one.

pub mod archive;
pub mod crypto;
pub mod snapshot;

use crate::models::{BackupTarget, StageTiming, StageTimings};
use crate::storage::ObjectStore;
use crate::utils::PipelineError;
use crate::Result;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub use archive::ARCHIVE_EXT;
pub use crypto::ENCRYPTED_EXT;
pub use snapshot::{Etcdctl, SnapshotError, SnapshotTool};

/// Extension of a raw v3 snapshot file.
pub const SNAPSHOT_EXT: &str = ".db";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// The two incompatible etcd snapshot formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotVariant {
    /// Legacy copy of a local v2 data directory
    V2 { data_dir: PathBuf },
    /// `snapshot save` over the v3 client API
    V3,
}

impl SnapshotVariant {
    pub fn version(&self) -> &'static str {
        match self {
            SnapshotVariant::V2 { .. } => "v2",
            SnapshotVariant::V3 => "v3",
        }
    }

    /// Variants a target needs, in the order they run: v2 only when a local
    /// data directory is configured, v3 always.
    pub fn for_target(target: &BackupTarget) -> Vec<SnapshotVariant> {
        let mut variants = Vec::with_capacity(2);
        if let Some(data_dir) = &target.v2_data_dir {
            variants.push(SnapshotVariant::V2 {
                data_dir: data_dir.clone(),
            });
        }
        variants.push(SnapshotVariant::V3);
        variants
    }

    /// Name of the raw snapshot this variant writes.
    pub fn snapshot_name(&self, prefix: &str, at: DateTime<Utc>) -> String {
        let stamp = at.format(TIMESTAMP_FORMAT);
        match self {
            SnapshotVariant::V2 { .. } => format!("{}-etcd-backup-v2-{}", prefix, stamp),
            SnapshotVariant::V3 => format!("{}-etcd-backup-v3-{}{}", prefix, stamp, SNAPSHOT_EXT),
        }
    }
}

/// Mutable record of one pipeline invocation. Never shared across attempts.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub target: String,
    pub version: &'static str,
    pub dir: PathBuf,
    /// Grows one suffix per stage
    pub filename: String,
    pub size_bytes: Option<u64>,
    pub timings: StageTimings,
}

impl Artifact {
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.filename)
    }
}

pub struct Pipeline {
    scratch_dir: PathBuf,
    passphrase: Option<String>,
    snapshot: Arc<dyn SnapshotTool>,
    store: Arc<dyn ObjectStore>,
}

impl Pipeline {
    /// An empty passphrase disables encryption.
    pub fn new(
        scratch_dir: impl Into<PathBuf>,
        passphrase: Option<String>,
        snapshot: Arc<dyn SnapshotTool>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            passphrase: passphrase.filter(|p| !p.is_empty()),
            snapshot,
            store,
        }
    }

    /// Take a snapshot and archive it. Names are derived from `at`.
    pub async fn create(
        &self,
        target: &BackupTarget,
        variant: &SnapshotVariant,
        at: DateTime<Utc>,
    ) -> Result<Artifact> {
        let version = variant.version();
        let start = Instant::now();

        let snapshot_name = variant.snapshot_name(&target.name_prefix, at);
        let snapshot_path = self.scratch_dir.join(&snapshot_name);

        let taken = match variant {
            SnapshotVariant::V2 { data_dir } => self.snapshot.backup_v2(data_dir, &snapshot_path).await,
            SnapshotVariant::V3 => {
                self.snapshot
                    .save_v3(&snapshot_path, &target.endpoints, &target.tls)
                    .await
            }
        };
        taken.map_err(|e| PipelineError::Create {
            version,
            artifact: snapshot_name.clone(),
            reason: e.to_string(),
        })?;

        let archived_name = format!("{}{}", snapshot_name, ARCHIVE_EXT);
        let archived_path = self.scratch_dir.join(&archived_name);
        let src = snapshot_path.clone();
        let dst = archived_path.clone();
        tokio::task::spawn_blocking(move || archive::archive(&src, &dst))
            .await
            .map_err(std::io::Error::other)
            .and_then(|r| r)
            .map_err(|source| PipelineError::Archive {
                version,
                artifact: archived_name.clone(),
                source,
            })?;

        info!(cluster = %target.label(), artifact = %archived_name, "Etcd {} backup created successfully", version);

        Ok(Artifact {
            target: target.label().to_string(),
            version,
            dir: self.scratch_dir.clone(),
            filename: archived_name,
            size_bytes: None,
            timings: StageTimings {
                create: StageTiming::Ran(start.elapsed()),
                ..StageTimings::default()
            },
        })
    }

    /// Encrypt in place of the archive. Without a passphrase this is a logged no-op.
    pub async fn encrypt(&self, artifact: &mut Artifact) -> Result<()> {
        let Some(passphrase) = self.passphrase.clone() else {
            warn!(cluster = %artifact.target, "No passphrase provided. Skipping etcd {} backup encryption", artifact.version);
            artifact.timings.encrypt = StageTiming::Skipped;
            return Ok(());
        };

        let start = Instant::now();
        let encrypted_name = format!("{}{}", artifact.filename, ENCRYPTED_EXT);
        let src = artifact.path();
        let dst = artifact.dir.join(&encrypted_name);

        tokio::task::spawn_blocking(move || crypto::encrypt_file(&src, &dst, &passphrase))
            .await
            .map_err(std::io::Error::other)
            .and_then(|r| r)
            .map_err(|e| PipelineError::Encrypt {
                version: artifact.version,
                artifact: artifact.filename.clone(),
                reason: e.to_string(),
            })?;

        artifact.filename = encrypted_name;
        artifact.timings.encrypt = StageTiming::Ran(start.elapsed());
        info!(cluster = %artifact.target, artifact = %artifact.filename, "Etcd {} backup encrypted successfully", artifact.version);
        Ok(())
    }

    /// Upload the artifact keyed by its filename; returns the stored size.
    pub async fn upload(&self, artifact: &mut Artifact) -> Result<u64> {
        let start = Instant::now();

        let size = self
            .store
            .put_file(&artifact.path(), &artifact.filename)
            .await
            .map_err(|e| PipelineError::Upload {
                version: artifact.version,
                artifact: artifact.filename.clone(),
                reason: e.to_string(),
            })?;

        artifact.size_bytes = Some(size);
        artifact.timings.upload = StageTiming::Ran(start.elapsed());
        info!(cluster = %artifact.target, artifact = %artifact.filename, size, "Etcd {} backup uploaded successfully", artifact.version);
        Ok(size)
    }

    /// All three stages. Any stage error aborts the rest; in particular a
    /// failed encryption never falls through to uploading plaintext.
    pub async fn run(&self, target: &BackupTarget, variant: &SnapshotVariant) -> Result<Artifact> {
        let mut artifact = self.create(target, variant, Utc::now()).await?;
        self.encrypt(&mut artifact).await?;
        self.upload(&mut artifact).await?;
        Ok(artifact)
    }
}
