//! Configuration management for etcd-backup.
//!
//! Loads configuration from a TOML file; command-line flags and environment
//! variables are applied on top by the binary before `validate()` runs.

use crate::models::{Provider, TlsFiles};
use crate::retry::RetryPolicy;
use crate::utils::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backup: BackupConfig,
    pub etcd: EtcdConfig,
    pub storage: StorageConfig,
    pub encryption: EncryptionConfig,
    pub retry: RetryConfig,
    pub telemetry: TelemetryConfig,
    pub kubernetes: KubernetesConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Leading part of every artifact name
    pub prefix: String,

    /// Guest provider (aws, azure, kvm); guests are not backed up when unset
    pub provider: Option<String>,

    /// Parent of the per-run scratch directory (default: system temp dir)
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EtcdConfig {
    /// Host etcd v3 endpoints
    pub endpoints: String,

    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub cacert: Option<PathBuf>,

    /// Host etcd v2 data directory; enables the v2 backup when set
    pub v2_data_dir: Option<PathBuf>,

    /// Path to the etcdctl binary
    pub etcdctl: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,

    /// Custom S3 endpoint (e.g. MinIO)
    pub endpoint: Option<String>,

    /// Use path-style bucket addressing
    pub path_style: bool,

    /// From ETCDBACKUP_AWS_ACCESS_KEY
    #[serde(skip_serializing)]
    pub access_key: Option<String>,

    /// From ETCDBACKUP_AWS_SECRET_KEY
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// From ETCDBACKUP_PASSPHRASE; empty or unset disables encryption
    #[serde(skip_serializing)]
    pub passphrase: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Prometheus push gateway; telemetry is disabled when unset
    pub pushgateway_url: Option<String>,
    pub job: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesConfig {
    pub api_url: String,
    pub token_path: PathBuf,
    pub ca_path: PathBuf,

    /// Namespace of the provider configs and etcd secrets
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

// Default values
const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

impl Default for EtcdConfig {
    fn default() -> Self {
        Self {
            endpoints: "http://127.0.0.1:2379".to_string(),
            cert: None,
            key: None,
            cacert: None,
            v2_data_dir: None,
            etcdctl: PathBuf::from("etcdctl"),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "etcdbackups".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            path_style: false,
            access_key: None,
            secret_key: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay_secs: 20,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            pushgateway_url: None,
            job: "etcd-backup".to_string(),
        }
    }
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            api_url: "https://kubernetes.default.svc".to_string(),
            token_path: Path::new(SERVICE_ACCOUNT_DIR).join("token"),
            ca_path: Path::new(SERVICE_ACCOUNT_DIR).join("ca.crt"),
            namespace: "default".to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.attempts,
            delay: Duration::from_secs(self.delay_secs),
        }
    }
}

impl EtcdConfig {
    pub fn tls(&self) -> TlsFiles {
        TlsFiles {
            cert: self.cert.clone(),
            key: self.key.clone(),
            ca: self.cacert.clone(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Guest provider, if one is configured.
    pub fn provider(&self) -> Result<Option<Provider>, ConfigError> {
        non_empty(&self.backup.provider).map(str::parse::<Provider>).transpose()
    }

    /// Passphrase, `None` when encryption is disabled.
    pub fn passphrase(&self) -> Option<String> {
        self.encryption.passphrase.clone().filter(|p| !p.is_empty())
    }

    /// Storage credentials; both are required.
    pub fn storage_credentials(&self) -> Result<(&str, &str), ConfigError> {
        let access = non_empty(&self.storage.access_key).ok_or(ConfigError::Missing("ETCDBACKUP_AWS_ACCESS_KEY"))?;
        let secret = non_empty(&self.storage.secret_key).ok_or(ConfigError::Missing("ETCDBACKUP_AWS_SECRET_KEY"))?;
        Ok((access, secret))
    }

    /// Reject configurations that cannot run. Nothing is contacted here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backup.prefix.trim().is_empty() {
            return Err(ConfigError::Missing("backup.prefix"));
        }
        self.provider()?;
        self.storage_credentials()?;

        if self.storage.bucket.trim().is_empty() {
            return Err(ConfigError::Missing("storage.bucket"));
        }
        if self.storage.region.trim().is_empty() {
            return Err(ConfigError::Missing("storage.region"));
        }
        if self.retry.attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "retry.attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        // Artifact names have second resolution; retries must land in a new second
        if self.retry.delay_secs < 1 {
            return Err(ConfigError::Invalid {
                name: "retry.delay_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(url) = non_empty(&self.telemetry.pushgateway_url) {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Invalid {
                    name: "telemetry.pushgateway_url",
                    reason: format!("{} is not an http(s) URL", url),
                });
            }
        }
        Ok(())
    }
}
