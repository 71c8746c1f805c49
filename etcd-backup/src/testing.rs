//! In-memory implementations of the external seams, for unit tests.

use crate::catalog::{ClusterApi, EtcdSecret};
use crate::models::{BackupOutcome, Provider, TlsFiles};
use crate::pipeline::{SnapshotError, SnapshotTool};
use crate::storage::{ObjectStore, StorageError};
use crate::telemetry::TelemetrySink;
use crate::utils::{CatalogError, TelemetryError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Writes a small fake snapshot. Can be told to fail its first N calls, or
/// every call whose output name starts with a given prefix.
#[derive(Default)]
pub struct FakeSnapshotTool {
    fail_first: usize,
    failing_prefixes: Vec<String>,
    calls: Mutex<Vec<PathBuf>>,
}

impl FakeSnapshotTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    pub fn failing_for(mut self, name_prefix: &str) -> Self {
        self.failing_prefixes.push(format!("{}-etcd-backup-", name_prefix));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn outputs(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }

    fn check(&self, output: &Path) -> Result<(), SnapshotError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(output.to_path_buf());

        let name = output.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        if calls.len() <= self.fail_first || self.failing_prefixes.iter().any(|p| name.starts_with(p)) {
            return Err(SnapshotError::Failed {
                program: "etcdctl".to_string(),
                status: "exit status: 1".to_string(),
                output: "context deadline exceeded".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotTool for FakeSnapshotTool {
    async fn save_v3(&self, output: &Path, endpoints: &str, _tls: &TlsFiles) -> Result<(), SnapshotError> {
        self.check(output)?;
        std::fs::write(output, format!("snapshot of {}", endpoints)).map_err(|source| SnapshotError::Spawn {
            program: "etcdctl".to_string(),
            source,
        })
    }

    async fn backup_v2(&self, data_dir: &Path, backup_dir: &Path) -> Result<(), SnapshotError> {
        self.check(backup_dir)?;
        let write = || -> std::io::Result<()> {
            std::fs::create_dir_all(backup_dir.join("member/snap"))?;
            std::fs::write(backup_dir.join("member/snap/db"), data_dir.display().to_string())
        };
        write().map_err(|source| SnapshotError::Spawn {
            program: "etcdctl".to_string(),
            source,
        })
    }
}

/// Records uploaded keys with their on-disk sizes.
#[derive(Default)]
pub struct MemoryStore {
    fail: bool,
    objects: Mutex<Vec<(String, u64)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn objects(&self) -> Vec<(String, u64)> {
        self.objects.lock().unwrap().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects().into_iter().map(|(k, _)| k).collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_file(&self, path: &Path, key: &str) -> Result<u64, StorageError> {
        if self.fail {
            return Err(StorageError::Request {
                operation: "PutObject",
                key: key.to_string(),
                reason: "service unavailable".to_string(),
            });
        }
        let size = tokio::fs::metadata(path)
            .await
            .map_err(|e| StorageError::Read {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
            .len();
        self.objects.lock().unwrap().push((key.to_string(), size));
        Ok(size)
    }
}

#[derive(Debug, Clone)]
pub struct FakeCluster {
    pub id: String,
    pub version: String,
    pub domain: String,
    pub secret: Option<EtcdSecret>,
}

impl FakeCluster {
    /// Supported on every provider, with a full secret.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            version: "9.0.0".to_string(),
            domain: format!("etcd.{}.example", id),
            secret: Some(EtcdSecret {
                ca: format!("ca-{}", id).into_bytes(),
                crt: format!("crt-{}", id).into_bytes(),
                key: format!("key-{}", id).into_bytes(),
            }),
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn without_secret(mut self) -> Self {
        self.secret = None;
        self
    }
}

pub struct FakeClusterApi {
    clusters: Vec<FakeCluster>,
    reachable: bool,
}

impl FakeClusterApi {
    pub fn new(clusters: Vec<FakeCluster>) -> Self {
        Self {
            clusters,
            reachable: true,
        }
    }

    /// Every listing fails.
    pub fn unreachable() -> Self {
        Self {
            clusters: Vec::new(),
            reachable: false,
        }
    }

    fn find(&self, cluster_id: &str) -> Result<&FakeCluster, CatalogError> {
        self.clusters
            .iter()
            .find(|c| c.id == cluster_id)
            .ok_or_else(|| CatalogError::Lookup {
                cluster_id: cluster_id.to_string(),
                reason: "not found".to_string(),
            })
    }
}

#[async_trait]
impl ClusterApi for FakeClusterApi {
    async fn list_clusters(&self, provider: Provider) -> Result<Vec<String>, CatalogError> {
        if !self.reachable {
            return Err(CatalogError::List {
                provider: provider.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(self.clusters.iter().map(|c| c.id.clone()).collect())
    }

    async fn release_version(&self, _provider: Provider, cluster_id: &str) -> Result<String, CatalogError> {
        Ok(self.find(cluster_id)?.version.clone())
    }

    async fn etcd_domain(&self, _provider: Provider, cluster_id: &str) -> Result<String, CatalogError> {
        Ok(self.find(cluster_id)?.domain.clone())
    }

    async fn etcd_secret(&self, cluster_id: &str) -> Result<EtcdSecret, CatalogError> {
        self.find(cluster_id)?
            .secret
            .clone()
            .ok_or_else(|| CatalogError::Credentials {
                cluster_id: cluster_id.to_string(),
                reason: format!("secrets \"{}-etcd\" not found", cluster_id),
            })
    }
}

/// Keeps every outcome it is given.
#[derive(Default)]
pub struct RecordingSink {
    outcomes: Mutex<Vec<BackupOutcome>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcomes(&self) -> Vec<BackupOutcome> {
        self.outcomes.lock().unwrap().clone()
    }
}

#[async_trait]
impl TelemetrySink for RecordingSink {
    async fn record(&self, outcome: &BackupOutcome) -> Result<bool, TelemetryError> {
        self.outcomes.lock().unwrap().push(outcome.clone());
        Ok(true)
    }
}
