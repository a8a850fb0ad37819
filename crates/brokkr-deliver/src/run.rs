//! Run orchestration
//!
//! One run executes the full sequence against a single component version:
//! resolve credentials and the component, verify its signature when asked,
//! extract and decode the delivery package, materialize the template into an
//! ephemeral staging tree, localize, cascade, substitute, render and create
//! the downstream resource, and publish the tree. The staging tree is
//! dropped on every exit path. A failed verification is recorded in the
//! report rather than aborting; every other component failure is terminal.

use crate::cascade::configure;
use crate::localize::localize;
use crate::output::{render_output, DeploymentApi, RequestRef};
use crate::package::parse_package;
use crate::publish::{publish_tree, ObjectStore};
use crate::stage::StagingTree;
use crate::substitute::apply;
use brokkr_core::{Document, Result};
use brokkr_registry::credentials::resolve_for_endpoint;
use brokkr_registry::extract::extract_resource;
use brokkr_registry::resolver::ComponentResolver;
use brokkr_registry::secrets::SecretStore;
use brokkr_registry::types::ComponentIdentity;
use brokkr_registry::verify::verify_signature;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything one run needs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    /// Name of the originating request object
    pub name: String,
    /// Namespace of the originating request object
    pub namespace: String,
    /// Component to materialize
    pub component: ComponentIdentity,
    /// Name of the resource holding the delivery package
    pub package_resource: String,
    /// User configuration merged into the cascade
    #[serde(default)]
    pub config: Document,
    /// Optional signature verification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify: Option<VerifySpec>,
    /// Destination bucket; defaults to `{name}.{namespace}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    /// Additional stub value-sets layered below the user configuration
    #[serde(default)]
    pub stubs: Vec<Document>,
}

impl RunRequest {
    /// Destination bucket, derived from the request identity when unset
    pub fn bucket_name(&self) -> String {
        self.bucket
            .clone()
            .unwrap_or_else(|| format!("{}.{}", self.name, self.namespace))
    }
}

/// Which stored signature to verify and where its public key lives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySpec {
    /// Name of the stored signature
    pub signature: String,
    /// Secret holding the public key under the signature name
    pub public_key_secret: String,
}

/// Terminal outcome of one successful run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub component: String,
    pub version: String,
    /// Recomputed descriptor digest, when verification ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// Verification outcome, when verification ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    /// Why verification failed, when it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_reason: Option<String>,
    pub bucket: String,
    pub published_files: usize,
    /// Name of the downstream resource, when one was materialized
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downstream: Option<String>,
}

/// Executes runs against pluggable stores and APIs
pub struct Runner {
    secrets: Arc<dyn SecretStore>,
    store: Arc<dyn ObjectStore>,
    deployments: Arc<dyn DeploymentApi>,
}

impl Runner {
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        store: Arc<dyn ObjectStore>,
        deployments: Arc<dyn DeploymentApi>,
    ) -> Self {
        Self {
            secrets,
            store,
            deployments,
        }
    }

    /// Execute one full resolve-to-publish sequence
    pub async fn execute(&self, request: &RunRequest) -> Result<RunReport> {
        info!(
            "starting run {}/{} for component {}:{}",
            request.namespace, request.name, request.component.name, request.component.version
        );

        // credentials and component resolution
        let credentials = resolve_for_endpoint(
            self.secrets.as_ref(),
            &request.component.endpoint,
            request.component.credentials_secret.as_deref(),
        )
        .await?;
        let resolver = ComponentResolver::new(&request.component.endpoint, credentials)?;
        let cv = resolver
            .lookup(&request.component.name, &request.component.version)
            .await?;

        // verification: failure is recorded, not fatal
        let mut digest = None;
        let mut verified = None;
        let mut verification_reason = None;
        if let Some(verify) = &request.verify {
            let outcome = async {
                let key_secret = self.secrets.get(&verify.public_key_secret).await?;
                verify_signature(cv.descriptor(), &resolver, &verify.signature, &key_secret).await
            }
            .await;
            match outcome {
                Ok(outcome) => {
                    digest = Some(outcome.digest);
                    verified = Some(outcome.verified);
                    verification_reason = outcome.reason;
                }
                Err(e) => {
                    warn!("verification could not be completed: {}", e);
                    verified = Some(false);
                    verification_reason = Some(e.to_string());
                }
            }
        }

        // delivery package
        let package_data = extract_resource(&cv, &request.package_resource).await?;
        let package = parse_package(&package_data)?;

        // template materialization; the tree is torn down on every exit path
        let template_data = extract_resource(&cv, &package.template_resource.name).await?;
        let tree = StagingTree::create()?;
        tree.extract_archive(&template_data)?;

        // localization and cascade
        let localizations = localize(&package.localization_rules, cv.descriptor())?;
        let substitutions = configure(
            &package.config_rules,
            localizations,
            &request.config,
            &package.config_template,
            &package.config_scheme,
            &request.stubs,
        )?;

        apply(&substitutions, &tree)?;

        // downstream resource; "already exists" is success
        let request_ref = RequestRef {
            name: request.name.clone(),
            namespace: request.namespace.clone(),
        };
        let mut downstream = None;
        if let Some(resource) = render_output(&package, &request.config, &request_ref)? {
            self.deployments.create(&resource).await?;
            downstream = Some(resource.metadata.name.clone());
        }

        // publish
        let bucket = request.bucket_name();
        let published_files = publish_tree(self.store.as_ref(), &bucket, &tree).await?;

        info!(
            "run {}/{} complete: {} files published to {}",
            request.namespace, request.name, published_files, bucket
        );

        Ok(RunReport {
            component: cv.name().to_string(),
            version: cv.version().to_string(),
            digest,
            verified,
            verification_reason,
            bucket,
            published_files,
            downstream,
        })
    }
}
