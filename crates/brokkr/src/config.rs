//! Delivery run configuration file
//!
//! One YAML document describes everything a run needs: the request identity,
//! the component to materialize, user configuration, and where secrets,
//! object storage, and rendered downstream manifests live.

use anyhow::{Context, Result};
use brokkr_deliver::RunRequest;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

/// Default configuration file name when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "delivery.yaml";

/// Full run configuration document
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealizeConfig {
    #[serde(flatten)]
    pub request: RunRequest,

    /// Directory holding secret documents (`<name>.yaml`)
    #[serde(default = "default_secrets_dir")]
    pub secrets_dir: Utf8PathBuf,

    /// Object storage destination
    #[serde(default)]
    pub storage: StorageConfig,

    /// Directory rendered downstream manifests are written into
    #[serde(default = "default_manifest_dir")]
    pub manifest_dir: Utf8PathBuf,
}

/// Where published files go
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// S3 or S3-compatible store
    pub s3: Option<S3Config>,
    /// Local directory store; the default when no S3 store is configured
    pub dir: Option<Utf8PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Config {
    pub region: String,
    /// Custom endpoint for MinIO and other S3-compatible stores
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_secrets_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("./secrets")
}

fn default_manifest_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("./manifests")
}

/// Load the run configuration, defaulting to `delivery.yaml`
pub fn load(path: Option<&Utf8Path>) -> Result<RealizeConfig> {
    let path = path.unwrap_or_else(|| Utf8Path::new(DEFAULT_CONFIG_FILE));
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read run configuration: {}", path))?;
    serde_yaml_ng::from_str(&content)
        .with_context(|| format!("failed to parse run configuration: {}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("delivery.yaml");
        std::fs::write(
            &path,
            r#"
name: podinfo
namespace: default
component:
  endpoint: oci://registry.example.com
  name: acme.org/podinfo
  version: 6.3.5
packageResource: deploy-package
config:
  replicas: 3
secretsDir: ./my-secrets
storage:
  s3:
    region: us-east-1
    endpoint: http://localhost:9000
"#,
        )
        .unwrap();

        let config = load(Some(Utf8Path::new(path.to_str().unwrap()))).unwrap();
        assert_eq!(config.request.name, "podinfo");
        assert_eq!(config.request.component.version, "6.3.5");
        assert_eq!(config.secrets_dir, "./my-secrets");
        assert_eq!(
            config.storage.s3.as_ref().unwrap().endpoint.as_deref(),
            Some("http://localhost:9000")
        );
        assert_eq!(config.manifest_dir, "./manifests");
    }

    #[test]
    fn test_load_missing_file() {
        let err = load(Some(Utf8Path::new("/nonexistent/delivery.yaml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
