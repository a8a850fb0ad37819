//! Localization: substitutions derived from the component's own resources
//!
//! Each rule names a resource whose resolved image reference becomes the
//! substitution value for the rule's file/path target. Rules are processed
//! in manifest order and that order is preserved into the output list, where
//! it becomes part of the later merge order.

use crate::package::{LocalizationRule, Substitution};
use brokkr_core::{Document, Error, Result};
use brokkr_registry::types::{AccessSpec, ComponentDescriptor};
use tracing::debug;

/// Derive one substitution per localization rule, in manifest order
pub fn localize(
    rules: &[LocalizationRule],
    descriptor: &ComponentDescriptor,
) -> Result<Vec<Substitution>> {
    let mut substitutions = Vec::with_capacity(rules.len());

    for rule in rules {
        let resource = descriptor
            .resource(&rule.resource_name)
            .ok_or_else(|| Error::not_found("resource", rule.resource_name.clone()))?;

        let image_reference = match &resource.access {
            AccessSpec::OciArtifact { image_reference } => image_reference.clone(),
            other => {
                return Err(Error::validation(format!(
                    "localized resource must be an OCI artifact: {} has access kind {}",
                    rule.resource_name,
                    other.kind()
                )))
            }
        };

        debug!(
            "localizing {} -> {} at {}:{}",
            rule.resource_name, image_reference, rule.file_path, rule.value_path
        );

        substitutions.push(Substitution {
            name: rule.name.clone(),
            file_path: rule.file_path.clone(),
            value_path: rule.value_path.clone(),
            value: Document::String(image_reference),
        });
    }

    Ok(substitutions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ComponentDescriptor {
        serde_yaml_ng::from_str(
            r#"
name: acme.org/podinfo
version: 6.3.5
resources:
  - name: app-image
    type: ociImage
    access:
      type: ociArtifact
      imageReference: registry.example/app@sha256:abc
  - name: sidecar-image
    type: ociImage
    access:
      type: ociArtifact
      imageReference: registry.example/sidecar:1.2
  - name: package
    type: deliveryPackage
    access:
      type: localBlob
      localReference: sha256:feed
"#,
        )
        .unwrap()
    }

    fn rule(resource: &str, file: &str, path: &str) -> LocalizationRule {
        LocalizationRule {
            name: None,
            resource_name: resource.to_string(),
            file_path: file.to_string(),
            value_path: path.to_string(),
        }
    }

    #[test]
    fn test_localize_resolves_image_reference() {
        let rules = vec![rule(
            "app-image",
            "deploy.yaml",
            "spec.template.containers[0].image",
        )];
        let substitutions = localize(&rules, &descriptor()).unwrap();
        assert_eq!(substitutions.len(), 1);
        assert_eq!(substitutions[0].file_path, "deploy.yaml");
        assert_eq!(substitutions[0].value_path, "spec.template.containers[0].image");
        assert_eq!(
            substitutions[0].value,
            Document::String("registry.example/app@sha256:abc".to_string())
        );
    }

    #[test]
    fn test_localize_preserves_rule_order() {
        let rules = vec![
            rule("sidecar-image", "deploy.yaml", "b"),
            rule("app-image", "deploy.yaml", "a"),
        ];
        let substitutions = localize(&rules, &descriptor()).unwrap();
        assert_eq!(substitutions[0].value_path, "b");
        assert_eq!(substitutions[1].value_path, "a");
    }

    #[test]
    fn test_localize_rejects_non_oci_access() {
        let rules = vec![rule("package", "deploy.yaml", "a")];
        let err = localize(&rules, &descriptor()).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }), "got: {:?}", err);
        assert!(err.to_string().contains("OCI artifact"));
    }

    #[test]
    fn test_localize_missing_resource() {
        let rules = vec![rule("absent", "deploy.yaml", "a")];
        let err = localize(&rules, &descriptor()).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }), "got: {:?}", err);
    }
}
