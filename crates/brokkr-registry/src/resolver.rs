//! Component-version resolution
//!
//! Locates the registry repository for a component and resolves a
//! `name:version` pair into an immutable descriptor. Resolution failures
//! keep the unreachable/not-found split so callers can decide between retry
//! and permanent failure.

use crate::client::RegistryClient;
use crate::credentials::{parse_endpoint, Credentials};
use crate::types::{
    ComponentDescriptor, Resource, DESCRIPTOR_MEDIA_TYPE, DESCRIPTOR_REPOSITORY_PREFIX,
};
use async_trait::async_trait;
use brokkr_core::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Resolver for component versions within one registry endpoint
pub struct ComponentResolver {
    client: Arc<RegistryClient>,
    /// Repository namespace taken from the endpoint URL path
    repository_prefix: String,
}

impl ComponentResolver {
    /// Create a resolver for an endpoint URL
    pub fn new(endpoint: &str, credentials: Option<Credentials>) -> Result<Self> {
        let url = parse_endpoint(endpoint)?;
        let client = Arc::new(RegistryClient::from_url(&url, credentials)?);

        let path = url.path().trim_matches('/');
        let repository_prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{}/", path)
        };

        Ok(Self {
            client,
            repository_prefix,
        })
    }

    /// Repository holding a component's version descriptors
    pub fn repository_for(&self, component_name: &str) -> String {
        format!(
            "{}{}/{}",
            self.repository_prefix, DESCRIPTOR_REPOSITORY_PREFIX, component_name
        )
    }

    /// Resolve a component version to its immutable descriptor
    pub async fn lookup(&self, name: &str, version: &str) -> Result<ComponentVersion> {
        let repository = self.repository_for(name);
        debug!("resolving component version {}:{} in {}", name, version, repository);

        let manifest = self
            .client
            .get_manifest(&repository, version)
            .await
            .map_err(|e| match e {
                Error::NotFound { .. } => {
                    Error::not_found("component version", format!("{}:{}", name, version))
                }
                other => other,
            })?;

        let descriptor_layer = manifest
            .layers
            .iter()
            .find(|l| l.media_type == DESCRIPTOR_MEDIA_TYPE)
            .or_else(|| manifest.layers.first())
            .ok_or_else(|| {
                Error::validation(format!(
                    "component version {}:{} carries no descriptor layer",
                    name, version
                ))
            })?;

        let raw = self.client.get_blob(&repository, &descriptor_layer.digest).await?;
        let descriptor: ComponentDescriptor = serde_yaml_ng::from_slice(&raw)
            .map_err(|e| Error::validation(format!("malformed component descriptor: {}", e)))?;

        if descriptor.name != name || descriptor.version != version {
            return Err(Error::validation(format!(
                "descriptor identity mismatch: requested {}:{}, stored {}:{}",
                name, version, descriptor.name, descriptor.version
            )));
        }

        info!("resolved component version {}:{}", name, version);

        Ok(ComponentVersion {
            descriptor,
            repository,
            client: Arc::clone(&self.client),
        })
    }
}

/// Source of descriptors for sub-component dereferencing during digesting
#[async_trait]
pub trait DescriptorSource: Send + Sync {
    async fn descriptor_for(&self, name: &str, version: &str) -> Result<ComponentDescriptor>;
}

#[async_trait]
impl DescriptorSource for ComponentResolver {
    async fn descriptor_for(&self, name: &str, version: &str) -> Result<ComponentDescriptor> {
        Ok(self.lookup(name, version).await?.descriptor)
    }
}

/// A resolved, read-only component version
pub struct ComponentVersion {
    descriptor: ComponentDescriptor,
    repository: String,
    client: Arc<RegistryClient>,
}

impl ComponentVersion {
    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn version(&self) -> &str {
        &self.descriptor.version
    }

    /// Look up a named resource; absence is a not-found resolution error
    pub fn resource(&self, name: &str) -> Result<&Resource> {
        self.descriptor
            .resource(name)
            .ok_or_else(|| Error::not_found("resource", name.to_string()))
    }

    /// Fetch a blob stored alongside this component version
    pub async fn fetch_blob(&self, digest: &str) -> Result<Vec<u8>> {
        self.client.get_blob(&self.repository, digest).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_for_without_base_path() {
        let resolver = ComponentResolver::new("registry.example.com", None).unwrap();
        assert_eq!(
            resolver.repository_for("acme.org/podinfo"),
            "component-descriptors/acme.org/podinfo"
        );
    }

    #[test]
    fn test_repository_for_with_base_path() {
        let resolver = ComponentResolver::new("oci://registry.example.com/base/repo", None).unwrap();
        assert_eq!(
            resolver.repository_for("acme.org/podinfo"),
            "base/repo/component-descriptors/acme.org/podinfo"
        );
    }
}
