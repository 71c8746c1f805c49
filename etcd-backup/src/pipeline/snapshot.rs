//! Snapshot tool seam and its `etcdctl` implementation.

use crate::models::TlsFiles;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {output}")]
    Failed {
        program: String,
        status: String,
        output: String,
    },
}

/// Produces a point-in-time snapshot of an etcd instance on local disk.
#[async_trait]
pub trait SnapshotTool: Send + Sync {
    /// Save a v3 snapshot of the instance behind `endpoints` into the file `output`.
    async fn save_v3(&self, output: &Path, endpoints: &str, tls: &TlsFiles) -> Result<(), SnapshotError>;

    /// Copy a local v2 data directory into the directory `backup_dir`.
    async fn backup_v2(&self, data_dir: &Path, backup_dir: &Path) -> Result<(), SnapshotError>;
}

/// Runs the `etcdctl` binary.
#[derive(Debug, Clone)]
pub struct Etcdctl {
    program: PathBuf,
}

impl Etcdctl {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    async fn exec(&self, args: Vec<OsString>, api_version: &str) -> Result<(), SnapshotError> {
        let program = self.program.display().to_string();
        info!("Executing: {} {:?}", program, args);

        let output = tokio::process::Command::new(&self.program)
            .args(&args)
            .env("ETCDCTL_API", api_version)
            .output()
            .await
            .map_err(|source| SnapshotError::Spawn {
                program: program.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let combined = combined.trim().to_string();
        error!("{} failed ({}): {}", program, output.status, combined);

        Err(SnapshotError::Failed {
            program,
            status: output.status.to_string(),
            output: combined,
        })
    }
}

impl Default for Etcdctl {
    fn default() -> Self {
        Self::new("etcdctl")
    }
}

#[async_trait]
impl SnapshotTool for Etcdctl {
    async fn save_v3(&self, output: &Path, endpoints: &str, tls: &TlsFiles) -> Result<(), SnapshotError> {
        self.exec(v3_args(output, endpoints, tls), "3").await
    }

    async fn backup_v2(&self, data_dir: &Path, backup_dir: &Path) -> Result<(), SnapshotError> {
        self.exec(v2_args(data_dir, backup_dir), "2").await
    }
}

/// `snapshot save <file>` plus whichever connection flags are configured.
pub fn v3_args(output: &Path, endpoints: &str, tls: &TlsFiles) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["snapshot".into(), "save".into(), output.into()];

    if !endpoints.is_empty() {
        args.push("--endpoints".into());
        args.push(endpoints.into());
    }
    if let Some(ca) = &tls.ca {
        args.push("--cacert".into());
        args.push(ca.into());
    }
    if let Some(cert) = &tls.cert {
        args.push("--cert".into());
        args.push(cert.into());
    }
    if let Some(key) = &tls.key {
        args.push("--key".into());
        args.push(key.into());
    }

    args
}

pub fn v2_args(data_dir: &Path, backup_dir: &Path) -> Vec<OsString> {
    vec![
        "backup".into(),
        "--data-dir".into(),
        data_dir.into(),
        "--backup-dir".into(),
        backup_dir.into(),
    ]
}
