//! Error types for the backup run.
//!
//! One enum per layer. Each variant names the target or artifact it concerns
//! so the final log line says which target and which stage failed.

use thiserror::Error;

/// Fatal configuration problems. Raised before any target is processed.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown provider: {0} (expected one of aws, azure, kvm)")]
    UnknownProvider(String),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Target discovery and connection-material failures.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to list {provider} clusters: {reason}")]
    List { provider: String, reason: String },

    #[error("Failed to look up cluster {cluster_id}: {reason}")]
    Lookup { cluster_id: String, reason: String },

    #[error("Failed to resolve etcd credentials for cluster {cluster_id}: {reason}")]
    Credentials { cluster_id: String, reason: String },

    #[error("Failed to write credential file {path}: {source}")]
    CredentialFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to resolve etcd endpoint for cluster {cluster_id}: {reason}")]
    Endpoint { cluster_id: String, reason: String },

    #[error("Cluster API client error: {0}")]
    Client(String),
}

/// Version gate failures (distinct from a gate rejection, which is `Ok(false)`).
#[derive(Error, Debug)]
pub enum GateError {
    #[error("Failed to read release version of cluster {cluster_id}: {source}")]
    Lookup {
        cluster_id: String,
        #[source]
        source: CatalogError,
    },

    #[error("Cluster {cluster_id} reports invalid release version {version:?}: {source}")]
    InvalidVersion {
        cluster_id: String,
        version: String,
        #[source]
        source: semver::Error,
    },
}

/// One failed stage of one pipeline invocation.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Etcd {version} snapshot {artifact} creation failed: {reason}")]
    Create {
        version: &'static str,
        artifact: String,
        reason: String,
    },

    #[error("Etcd {version} snapshot {artifact} archiving failed: {source}")]
    Archive {
        version: &'static str,
        artifact: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Etcd {version} backup {artifact} encryption failed: {reason}")]
    Encrypt {
        version: &'static str,
        artifact: String,
        reason: String,
    },

    #[error("Etcd {version} backup {artifact} upload failed: {reason}")]
    Upload {
        version: &'static str,
        artifact: String,
        reason: String,
    },
}

impl PipelineError {
    /// Stage name used in structured log fields.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Create { .. } | PipelineError::Archive { .. } => "create",
            PipelineError::Encrypt { .. } => "encrypt",
            PipelineError::Upload { .. } => "upload",
        }
    }
}

#[derive(Error, Debug)]
pub enum RetryError<E: std::error::Error + 'static> {
    #[error("Giving up after {attempts} attempt(s): {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },
}

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),

    #[error("Push gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Push gateway rejected metrics with status {status}: {body}")]
    Rejected { status: u16, body: String },
}
