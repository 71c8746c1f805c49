//! Kubernetes REST client for the provider config CRDs and etcd secrets.

use super::{ClusterApi, EtcdSecret};
use crate::config::KubernetesConfig;
use crate::models::Provider;
use crate::utils::CatalogError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

const PROVIDER_API: &str = "apis/providers.giantswarm.io/v1alpha1";

#[derive(Debug, Deserialize)]
struct ObjectList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMeta {
    #[serde(default)]
    name: String,
    #[serde(default)]
    deletion_timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderConfig {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    spec: ProviderSpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderSpec {
    #[serde(default)]
    cluster: ClusterSpec,
    #[serde(default)]
    version_bundle: VersionBundle,
}

#[derive(Debug, Default, Deserialize)]
struct ClusterSpec {
    #[serde(default)]
    etcd: EtcdSpec,
}

#[derive(Debug, Default, Deserialize)]
struct EtcdSpec {
    #[serde(default)]
    domain: String,
}

#[derive(Debug, Default, Deserialize)]
struct VersionBundle {
    #[serde(default)]
    version: String,
}

#[derive(Debug, Deserialize)]
struct Secret {
    #[serde(default)]
    data: HashMap<String, String>,
}

fn plural(provider: Provider) -> &'static str {
    match provider {
        Provider::Aws => "awsconfigs",
        Provider::Azure => "azureconfigs",
        Provider::Kvm => "kvmconfigs",
    }
}

/// In-cluster client authenticated with the pod's service account.
pub struct KubeClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    namespace: String,
}

impl KubeClient {
    pub fn new(config: &KubernetesConfig) -> Result<Self, CatalogError> {
        let token = std::fs::read_to_string(&config.token_path).map_err(|e| {
            CatalogError::Client(format!(
                "failed to read service account token {}: {}",
                config.token_path.display(),
                e
            ))
        })?;

        let mut builder = reqwest::Client::builder().use_rustls_tls();
        if config.ca_path.exists() {
            let pem = std::fs::read(&config.ca_path).map_err(|e| {
                CatalogError::Client(format!("failed to read CA bundle {}: {}", config.ca_path.display(), e))
            })?;
            let ca = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| CatalogError::Client(format!("invalid CA bundle: {}", e)))?;
            builder = builder.add_root_certificate(ca);
        }
        let client = builder
            .build()
            .map_err(|e| CatalogError::Client(e.to_string()))?;

        info!(api = %config.api_url, namespace = %config.namespace, "Kubernetes client configured");

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
            namespace: config.namespace.clone(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, String> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("GET {}", url);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("HTTP {} from {}: {}", status, url, body.trim()));
        }

        resp.json::<T>().await.map_err(|e| e.to_string())
    }

    async fn provider_config(&self, provider: Provider, cluster_id: &str) -> Result<ProviderConfig, CatalogError> {
        let path = format!(
            "{}/namespaces/{}/{}/{}",
            PROVIDER_API,
            self.namespace,
            plural(provider),
            cluster_id
        );
        self.get(&path).await.map_err(|reason| CatalogError::Lookup {
            cluster_id: cluster_id.to_string(),
            reason,
        })
    }
}

#[async_trait]
impl ClusterApi for KubeClient {
    async fn list_clusters(&self, provider: Provider) -> Result<Vec<String>, CatalogError> {
        let path = format!("{}/namespaces/{}/{}", PROVIDER_API, self.namespace, plural(provider));
        let list: ObjectList<ProviderConfig> = self.get(&path).await.map_err(|reason| CatalogError::List {
            provider: provider.to_string(),
            reason,
        })?;

        Ok(live_cluster_ids(list))
    }

    async fn release_version(&self, provider: Provider, cluster_id: &str) -> Result<String, CatalogError> {
        let config = self.provider_config(provider, cluster_id).await?;
        Ok(config.spec.version_bundle.version)
    }

    async fn etcd_domain(&self, provider: Provider, cluster_id: &str) -> Result<String, CatalogError> {
        let config = self.provider_config(provider, cluster_id).await?;
        Ok(config.spec.cluster.etcd.domain)
    }

    async fn etcd_secret(&self, cluster_id: &str) -> Result<EtcdSecret, CatalogError> {
        let path = format!("api/v1/namespaces/{}/secrets/{}-etcd", self.namespace, cluster_id);
        let secret: Secret = self.get(&path).await.map_err(|reason| CatalogError::Credentials {
            cluster_id: cluster_id.to_string(),
            reason,
        })?;

        decode_secret(cluster_id, &secret)
    }
}

fn live_cluster_ids(list: ObjectList<ProviderConfig>) -> Vec<String> {
    list.items
        .into_iter()
        .filter(|item| {
            if item.metadata.deletion_timestamp.is_some() {
                info!(cluster = %item.metadata.name, "Skipping guest cluster being deleted");
                return false;
            }
            !item.metadata.name.is_empty()
        })
        .map(|item| item.metadata.name)
        .collect()
}

fn decode_secret(cluster_id: &str, secret: &Secret) -> Result<EtcdSecret, CatalogError> {
    let field = |name: &str| -> Result<Vec<u8>, CatalogError> {
        let encoded = secret.data.get(name).ok_or_else(|| CatalogError::Credentials {
            cluster_id: cluster_id.to_string(),
            reason: format!("secret {}-etcd has no {:?} entry", cluster_id, name),
        })?;
        STANDARD.decode(encoded.trim()).map_err(|e| CatalogError::Credentials {
            cluster_id: cluster_id.to_string(),
            reason: format!("secret entry {:?} is not base64: {}", name, e),
        })
    };

    Ok(EtcdSecret {
        ca: field("ca")?,
        crt: field("crt")?,
        key: field("key")?,
    })
}
