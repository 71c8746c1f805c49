use crate::utils::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Installation provider kind. Closed set; anything else is a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Azure,
    Kvm,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Azure => "azure",
            Provider::Kvm => "kvm",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" => Ok(Provider::Aws),
            "azure" => Ok(Provider::Azure),
            "kvm" => Ok(Provider::Kvm),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

/// Client TLS material passed to the snapshot tool as file paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub ca: Option<PathBuf>,
}

impl TlsFiles {
    pub fn is_empty(&self) -> bool {
        self.cert.is_none() && self.key.is_none() && self.ca.is_none()
    }
}

/// One etcd instance to back up. Built once per run and not mutated afterwards.
#[derive(Debug, Clone)]
pub struct BackupTarget {
    /// Cluster id; empty for the host installation
    pub id: String,

    /// Provider kind; the host has none unless guest backups are configured
    pub provider: Option<Provider>,

    /// etcd v3 client endpoint(s)
    pub endpoints: String,

    /// Client certificate files, empty for an unauthenticated host
    pub tls: TlsFiles,

    /// Leading part of every artifact filename for this target
    pub name_prefix: String,

    /// Local v2 data directory; when set the legacy format is backed up too
    pub v2_data_dir: Option<PathBuf>,
}

impl BackupTarget {
    pub fn host(
        name_prefix: impl Into<String>,
        endpoints: impl Into<String>,
        tls: TlsFiles,
        v2_data_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            id: String::new(),
            provider: None,
            endpoints: endpoints.into(),
            tls,
            name_prefix: name_prefix.into(),
            v2_data_dir,
        }
    }

    /// A guest cluster target; its artifacts are prefixed `<prefix>-<cluster id>`.
    pub fn guest(
        prefix: &str,
        cluster_id: impl Into<String>,
        provider: Provider,
        endpoints: impl Into<String>,
        tls: TlsFiles,
    ) -> Self {
        let id = cluster_id.into();
        Self {
            name_prefix: format!("{}-{}", prefix, id),
            id,
            provider: Some(provider),
            endpoints: endpoints.into(),
            tls,
            v2_data_dir: None,
        }
    }

    pub fn is_host(&self) -> bool {
        self.id.is_empty()
    }

    /// Human-readable name for logs.
    pub fn label(&self) -> &str {
        if self.is_host() {
            "host"
        } else {
            &self.id
        }
    }
}
