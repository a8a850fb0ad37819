//! Downstream deployment-resource materialization
//!
//! When the package declares a supported downstream kind, its spec template
//! is cascade-evaluated against the run's user configuration, its source
//! reference rewritten to the published bucket, and the resource bound to
//! the originating request and submitted for creation. Creation is
//! idempotent: "already exists" is success.

use crate::cascade;
use crate::package::DeliveryPackage;
use async_trait::async_trait;
use brokkr_core::{Document, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// API group/version for resources this pipeline materializes
pub const API_VERSION: &str = "kustomize.toolkit.fluxcd.io/v1beta2";

/// API group/version of the originating request object
pub const REQUEST_API_VERSION: &str = "delivery.brokkr.io/v1alpha1";

/// Kind of the originating request object
pub const REQUEST_KIND: &str = "Delivery";

/// The only downstream kind this pipeline materializes
pub const KIND_KUSTOMIZATION: &str = "Kustomization";

/// Identity of the request a run was started for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRef {
    pub name: String,
    pub namespace: String,
}

/// Rendered downstream deployment resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResource {
    pub api_version: String,
    pub kind: String,
    pub metadata: ResourceMetadata,
    pub spec: Document,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    pub name: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
}

/// Binding back to the object that requested this run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
}

/// Result of an idempotent create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Creation endpoint for downstream resources
///
/// Implementations must report "already exists" as `AlreadyExists`, never as
/// an error; any other creation failure is fatal for the run.
#[async_trait]
pub trait DeploymentApi: Send + Sync {
    async fn create(&self, resource: &DeploymentResource) -> Result<CreateOutcome>;
}

/// Render the package's downstream resource, if it declares a supported kind
///
/// The template's `spec` document is evaluated against the user
/// configuration, then its
/// source reference is rewritten to point at the run's published bucket.
pub fn render_output(
    package: &DeliveryPackage,
    user_config: &Document,
    request: &RequestRef,
) -> Result<Option<DeploymentResource>> {
    let Some(template) = &package.deploy_template else {
        debug!("package declares no downstream resource");
        return Ok(None);
    };

    if template.kind != KIND_KUSTOMIZATION {
        warn!("skipping unsupported downstream kind {}", template.kind);
        return Ok(None);
    }

    let evaluated = cascade::evaluate_with_values(&template.spec, user_config)?;

    let mut spec = match evaluated {
        Document::Mapping(map) => map,
        Document::Null => serde_yaml_ng::Mapping::new(),
        _ => return Err(Error::validation("deploy template spec must be a mapping")),
    };

    // bind the resource to the bucket the run publishes into
    let mut source_ref = serde_yaml_ng::Mapping::new();
    source_ref.insert(Document::from("kind"), Document::from("Bucket"));
    source_ref.insert(Document::from("name"), Document::from(request.name.as_str()));
    source_ref.insert(
        Document::from("namespace"),
        Document::from(request.namespace.as_str()),
    );
    spec.insert(
        Document::String("sourceRef".to_string()),
        Document::Mapping(source_ref),
    );

    Ok(Some(DeploymentResource {
        api_version: API_VERSION.to_string(),
        kind: KIND_KUSTOMIZATION.to_string(),
        metadata: ResourceMetadata {
            name: request.name.clone(),
            namespace: request.namespace.clone(),
            owner_references: vec![OwnerReference {
                api_version: REQUEST_API_VERSION.to_string(),
                kind: REQUEST_KIND.to_string(),
                name: request.name.clone(),
            }],
        },
        spec: Document::Mapping(spec),
    }))
}

/// Manifest-directory creation endpoint
///
/// Writes each resource as a YAML manifest under the directory; an existing
/// manifest reports `AlreadyExists`. Stands in for the cluster API, which
/// belongs to the surrounding platform.
#[derive(Debug, Clone)]
pub struct LocalManifestApi {
    dir: PathBuf,
}

impl LocalManifestApi {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn manifest_path(&self, resource: &DeploymentResource) -> PathBuf {
        self.dir.join(format!(
            "{}-{}-{}.yaml",
            resource.metadata.namespace,
            resource.metadata.name,
            resource.kind.to_lowercase()
        ))
    }
}

#[async_trait]
impl DeploymentApi for LocalManifestApi {
    async fn create(&self, resource: &DeploymentResource) -> Result<CreateOutcome> {
        let path = self.manifest_path(resource);
        if path.exists() {
            info!("downstream resource already exists at {:?}", path);
            return Ok(CreateOutcome::AlreadyExists);
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::publish(format!("cannot create {:?}: {}", self.dir, e)))?;
        let rendered = serde_yaml_ng::to_string(resource)
            .map_err(|e| Error::publish(format!("cannot render downstream resource: {}", e)))?;
        tokio::fs::write(&path, rendered)
            .await
            .map_err(|e| Error::publish(format!("cannot write {:?}: {}", path, e)))?;

        info!("created downstream resource at {:?}", path);
        Ok(CreateOutcome::Created)
    }
}
