//! Target Catalog: guest discovery and per-guest connection material.

pub mod kube;

use crate::fs::write_private;
use crate::models::{Provider, TlsFiles};
use crate::utils::CatalogError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub use kube::KubeClient;

/// PEM material for a guest's etcd client certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtcdSecret {
    pub ca: Vec<u8>,
    pub crt: Vec<u8>,
    pub key: Vec<u8>,
}

/// Read-only view of the cluster API.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Ids of live guest clusters of `provider`.
    async fn list_clusters(&self, provider: Provider) -> Result<Vec<String>, CatalogError>;

    /// Release version string, possibly empty.
    async fn release_version(&self, provider: Provider, cluster_id: &str) -> Result<String, CatalogError>;

    async fn etcd_domain(&self, provider: Provider, cluster_id: &str) -> Result<String, CatalogError>;

    /// Contents of the `<cluster_id>-etcd` secret.
    async fn etcd_secret(&self, cluster_id: &str) -> Result<EtcdSecret, CatalogError>;
}

/// Client endpoint for a guest's etcd, by provider.
pub fn endpoint_for(provider: Provider, domain: &str) -> String {
    let port = match provider {
        Provider::Aws | Provider::Azure => 2379,
        Provider::Kvm => 443,
    };
    format!("https://{}:{}", domain, port)
}

/// Ids become file names under the scratch directory.
fn is_plain_name(cluster_id: &str) -> bool {
    !cluster_id.is_empty() && !cluster_id.contains(['/', '\\']) && !cluster_id.contains("..")
}

pub struct TargetCatalog {
    api: Arc<dyn ClusterApi>,
}

impl TargetCatalog {
    pub fn new(api: Arc<dyn ClusterApi>) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &dyn ClusterApi {
        self.api.as_ref()
    }

    pub async fn list_targets(&self, provider: Provider) -> Result<Vec<String>, CatalogError> {
        let ids = self.api.list_clusters(provider).await?;
        info!(provider = %provider, count = ids.len(), "Listed guest clusters");
        Ok(ids)
    }

    /// Fetch the guest's etcd client certificate and write it as
    /// `<id>-crt.pem`, `<id>-key.pem`, `<id>-ca.pem` (mode 0600) under `dir`.
    pub async fn resolve_credentials(&self, cluster_id: &str, dir: &Path) -> Result<TlsFiles, CatalogError> {
        if !is_plain_name(cluster_id) {
            return Err(CatalogError::Credentials {
                cluster_id: cluster_id.to_string(),
                reason: "cluster id is not a plain file name".to_string(),
            });
        }

        let secret = self
            .api
            .etcd_secret(cluster_id)
            .await
            .map_err(|e| match e {
                CatalogError::Credentials { .. } => e,
                other => CatalogError::Credentials {
                    cluster_id: cluster_id.to_string(),
                    reason: other.to_string(),
                },
            })?;

        let cert = dir.join(format!("{}-crt.pem", cluster_id));
        let key = dir.join(format!("{}-key.pem", cluster_id));
        let ca = dir.join(format!("{}-ca.pem", cluster_id));

        for (path, data) in [(&cert, &secret.crt), (&key, &secret.key), (&ca, &secret.ca)] {
            write_private(path, data).map_err(|source| CatalogError::CredentialFile {
                path: path.display().to_string(),
                source,
            })?;
        }

        debug!(cluster = %cluster_id, "Wrote etcd client certificate files");
        Ok(TlsFiles {
            cert: Some(cert),
            key: Some(key),
            ca: Some(ca),
        })
    }

    pub async fn resolve_endpoint(&self, cluster_id: &str, provider: Provider) -> Result<String, CatalogError> {
        let domain = self
            .api
            .etcd_domain(provider, cluster_id)
            .await
            .map_err(|e| CatalogError::Endpoint {
                cluster_id: cluster_id.to_string(),
                reason: e.to_string(),
            })?;

        if domain.trim().is_empty() {
            return Err(CatalogError::Endpoint {
                cluster_id: cluster_id.to_string(),
                reason: "empty etcd domain".to_string(),
            });
        }

        Ok(endpoint_for(provider, domain.trim()))
    }
}
