//! Delivery package manifest
//!
//! The package is a YAML document attached to the component version as a
//! resource. It names the template archive to materialize, the localization
//! and config rules to apply to it, the schema user configuration must
//! satisfy, and optionally a downstream deployment-resource template.
//! Parsing is forward-compatible: unknown fields are ignored.

use brokkr_core::{Document, Error, Result};
use serde::{Deserialize, Serialize};

/// The manifest describing which template to materialize and which rules to apply
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeliveryPackage {
    /// The resource holding the tar-archived template file tree
    pub template_resource: TemplateResourceRef,
    /// Optional downstream deployment-resource template
    pub deploy_template: Option<DeployTemplate>,
    /// Ordered config rules, appended after localizations in the cascade
    pub config_rules: Vec<ConfigRule>,
    /// Schema user configuration must satisfy (absent when null)
    pub config_scheme: Document,
    /// Cascade template document (absent when null)
    pub config_template: Document,
    /// Ordered localization rules, processed in manifest order
    pub localization_rules: Vec<LocalizationRule>,
}

/// Reference to the template resource by name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateResourceRef {
    pub name: String,
}

/// Downstream deployment-resource template
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployTemplate {
    pub kind: String,
    #[serde(default)]
    pub spec: Document,
}

/// Rule deriving a substitution from a resource's access spec
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizationRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Resource whose resolved image reference becomes the value
    pub resource_name: String,
    pub file_path: String,
    pub value_path: String,
}

/// Rule mapping configuration onto a file location
///
/// The value may hold `(( reference ))` expressions resolved during the
/// cascade against the merged binding set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub file_path: String,
    pub value_path: String,
    pub value: Document,
}

/// One concrete edit: splice `value` at `value_path` inside `file_path`
///
/// Later entries targeting the same path override earlier ones; order is the
/// merged-list order and is authoritative for the applier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Substitution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub file_path: String,
    pub value_path: String,
    pub value: Document,
}

/// Decode a buffered package blob
pub fn parse_package(data: &[u8]) -> Result<DeliveryPackage> {
    serde_yaml_ng::from_slice(data)
        .map_err(|e| Error::validation(format!("malformed delivery package: {}", e)))
}
