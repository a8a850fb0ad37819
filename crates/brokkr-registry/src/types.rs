//! Component identity and descriptor types
//!
//! A component version is an immutable registry-resolved bundle: named typed
//! resources, references to sub-components, and optional stored signatures.
//! Descriptors are decoded forward-compatibly: unknown fields and unknown
//! access kinds are preserved rather than rejected.

use brokkr_core::Document;
use serde::{Deserialize, Serialize};

/// Media type of the component descriptor blob inside a version manifest
pub const DESCRIPTOR_MEDIA_TYPE: &str = "application/vnd.brokkr.component.descriptor.v1+yaml";

/// Repository namespace under which component descriptors are stored
pub const DESCRIPTOR_REPOSITORY_PREFIX: &str = "component-descriptors";

/// What to fetch: endpoint, component name, version, and the credential secret
///
/// Immutable once resolved for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentIdentity {
    /// Registry endpoint URL; `oci://` is assumed when no scheme is given
    pub endpoint: String,
    /// Component name (e.g. `acme.org/podinfo`)
    pub name: String,
    /// Component version (e.g. `6.3.5`)
    pub version: String,
    /// Name of the secret holding registry credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_secret: Option<String>,
}

/// Resolved component-version descriptor
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDescriptor {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub references: Vec<ComponentReference>,
    #[serde(default)]
    pub signatures: Vec<Signature>,
}

impl ComponentDescriptor {
    /// Look up a resource by name
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Look up a stored signature by name
    pub fn signature(&self, name: &str) -> Option<&Signature> {
        self.signatures.iter().find(|s| s.name == name)
    }
}

/// A named, typed blob attached to a component version
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub access: AccessSpec,
    #[serde(default)]
    pub digest: Option<DigestSpec>,
}

/// How a resource's content is reached
///
/// Decoded by the `type` discriminator; unknown kinds are kept raw so the
/// descriptor stays forward-compatible and diagnostics can name the kind.
#[derive(Debug, Clone)]
pub enum AccessSpec {
    /// Content is an OCI artifact in some registry
    OciArtifact { image_reference: String },
    /// Content is a blob stored alongside the component version
    LocalBlob {
        local_reference: String,
        media_type: Option<String>,
    },
    /// Any access kind this build does not know
    Other(Document),
}

impl AccessSpec {
    /// The access kind string as it appeared in the descriptor
    pub fn kind(&self) -> &str {
        match self {
            AccessSpec::OciArtifact { .. } => "ociArtifact",
            AccessSpec::LocalBlob { .. } => "localBlob",
            AccessSpec::Other(doc) => doc
                .get("type")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown"),
        }
    }
}

impl<'de> serde::Deserialize<'de> for AccessSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error as _;

        let doc = Document::deserialize(deserializer)?;
        let kind = doc.get("type").and_then(|v| v.as_str()).unwrap_or_default();

        match kind {
            "ociArtifact" => {
                let image_reference = doc
                    .get("imageReference")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| D::Error::missing_field("imageReference"))?
                    .to_string();
                Ok(AccessSpec::OciArtifact { image_reference })
            }
            "localBlob" => {
                let local_reference = doc
                    .get("localReference")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| D::Error::missing_field("localReference"))?
                    .to_string();
                let media_type = doc
                    .get("mediaType")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                Ok(AccessSpec::LocalBlob {
                    local_reference,
                    media_type,
                })
            }
            _ => Ok(AccessSpec::Other(doc)),
        }
    }
}

/// Reference from one component version to another
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentReference {
    pub name: String,
    pub component_name: String,
    pub version: String,
}

/// A stored signature over the descriptor digest
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub name: String,
    pub digest: DigestSpec,
    #[serde(default)]
    pub signature: Option<SignatureSpec>,
}

/// Digest algorithm and value
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestSpec {
    pub hash_algorithm: String,
    #[serde(default)]
    pub normalisation_algorithm: Option<String>,
    pub value: String,
}

/// Signature algorithm and encoded value
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureSpec {
    pub algorithm: String,
    #[serde(default)]
    pub media_type: Option<String>,
    pub value: String,
}
