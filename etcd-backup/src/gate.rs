//! Version Gate: is a guest's release new enough to be backed up?

use crate::catalog::ClusterApi;
use crate::models::Provider;
use crate::utils::GateError;
use semver::Version;
use tracing::debug;

/// Oldest supported release per provider; `None` means every release is supported.
pub fn minimum_version(provider: Provider) -> Option<Version> {
    match provider {
        Provider::Aws => Some(Version::new(3, 1, 1)),
        Provider::Azure => Some(Version::new(0, 2, 0)),
        Provider::Kvm => None,
    }
}

/// `Ok(true)` iff `version` is at least the provider's minimum. An empty
/// version counts as `0.0.0`.
pub fn version_supported(provider: Provider, cluster_id: &str, version: &str) -> Result<bool, GateError> {
    let Some(minimum) = minimum_version(provider) else {
        return Ok(true);
    };

    let version = version.trim();
    let version = version.strip_prefix('v').unwrap_or(version);
    let parsed = if version.is_empty() {
        Version::new(0, 0, 0)
    } else {
        Version::parse(version).map_err(|source| GateError::InvalidVersion {
            cluster_id: cluster_id.to_string(),
            version: version.to_string(),
            source,
        })?
    };

    debug!(cluster = %cluster_id, version = %parsed, minimum = %minimum, "Checked release version");
    Ok(parsed >= minimum)
}

/// Look up a guest's release version and check it. Ungated providers never
/// touch the cluster API.
pub async fn is_supported(api: &dyn ClusterApi, provider: Provider, cluster_id: &str) -> Result<bool, GateError> {
    if minimum_version(provider).is_none() {
        return Ok(true);
    }

    let version = api
        .release_version(provider, cluster_id)
        .await
        .map_err(|source| GateError::Lookup {
            cluster_id: cluster_id.to_string(),
            source,
        })?;

    version_supported(provider, cluster_id, &version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCluster, FakeClusterApi};

    #[test]
    fn test_minimum_is_inclusive() {
        assert!(version_supported(Provider::Aws, "c1", "3.1.1").unwrap());
        assert!(version_supported(Provider::Azure, "c1", "0.2.0").unwrap());
    }

    #[test]
    fn test_below_minimum_rejected() {
        assert!(!version_supported(Provider::Aws, "c1", "3.1.0").unwrap());
        assert!(!version_supported(Provider::Azure, "c1", "0.1.9").unwrap());
        assert!(version_supported(Provider::Aws, "c1", "4.0.0").unwrap());
    }

    #[test]
    fn test_empty_version_never_supported() {
        assert!(!version_supported(Provider::Aws, "c1", "").unwrap());
        assert!(!version_supported(Provider::Azure, "c1", "  ").unwrap());
    }

    #[test]
    fn test_kvm_always_supported() {
        assert!(version_supported(Provider::Kvm, "c1", "").unwrap());
        assert!(version_supported(Provider::Kvm, "c1", "not-a-version").unwrap());
    }

    #[test]
    fn test_garbage_version_is_error() {
        let err = version_supported(Provider::Aws, "c1", "three").unwrap_err();
        assert!(matches!(err, GateError::InvalidVersion { .. }));
    }

    #[tokio::test]
    async fn test_is_supported_reads_release_version() {
        let api = FakeClusterApi::new(vec![
            FakeCluster::new("old").with_version("2.9.0"),
            FakeCluster::new("new").with_version("3.1.1"),
        ]);

        assert!(!is_supported(&api, Provider::Aws, "old").await.unwrap());
        assert!(is_supported(&api, Provider::Aws, "new").await.unwrap());
    }

    #[tokio::test]
    async fn test_lookup_failure_is_gate_error() {
        let api = FakeClusterApi::new(vec![]);
        let err = is_supported(&api, Provider::Azure, "missing").await.unwrap_err();
        assert!(matches!(err, GateError::Lookup { .. }));

        // kvm short-circuits before any lookup
        assert!(is_supported(&api, Provider::Kvm, "missing").await.unwrap());
    }
}
