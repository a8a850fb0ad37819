//! Digest-based signature verification
//!
//! The descriptor is reduced to a canonical JSON form (sorted keys,
//! signatures excluded, referenced sub-components dereferenced and digested
//! recursively), hashed with SHA-256, and the hex digest compared
//! byte-for-byte against the stored signature's digest value. A mismatch is
//! a recorded outcome, never an error; errors are reserved for a missing
//! public key, an absent signature, or an unknown digest algorithm.

use crate::resolver::DescriptorSource;
use crate::secrets::SecretDocument;
use crate::types::ComponentDescriptor;
use brokkr_core::{Error, Result};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// The only digest algorithm this build computes
pub const DIGEST_ALGORITHM_SHA256: &str = "SHA-256";

/// Result of a verification attempt
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    /// Whether the recomputed digest byte-equals the stored one
    pub verified: bool,
    /// The recomputed descriptor digest (hex)
    pub digest: String,
    /// Failure reason when unverified
    pub reason: Option<String>,
}

/// Recompute the canonical digest of a descriptor
///
/// References are dereferenced through `source` and digested recursively, so
/// the parent digest covers the full component graph.
pub async fn digest_descriptor(
    descriptor: &ComponentDescriptor,
    source: &dyn DescriptorSource,
) -> Result<String> {
    let normalized = normalized_json(descriptor, source).await?;
    // default serde_json maps are BTree-backed, so serialization is key-sorted
    let canonical = serde_json::to_vec(&normalized)?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

async fn normalized_json(
    descriptor: &ComponentDescriptor,
    source: &dyn DescriptorSource,
) -> Result<serde_json::Value> {
    let mut references = Vec::with_capacity(descriptor.references.len());
    for reference in &descriptor.references {
        let referenced = source
            .descriptor_for(&reference.component_name, &reference.version)
            .await?;
        let digest = Box::pin(digest_descriptor(&referenced, source)).await?;
        references.push(json!({
            "name": reference.name,
            "componentName": reference.component_name,
            "version": reference.version,
            "digest": digest,
        }));
    }

    let resources: Vec<serde_json::Value> = descriptor
        .resources
        .iter()
        .map(|resource| {
            json!({
                "name": resource.name,
                "type": resource.resource_type,
                "digest": resource.digest.as_ref().map(|d| d.value.clone()),
            })
        })
        .collect();

    Ok(json!({
        "name": descriptor.name,
        "version": descriptor.version,
        "provider": descriptor.provider,
        "resources": resources,
        "references": references,
    }))
}

/// Verify a named stored signature against the recomputed descriptor digest
///
/// The public key must be present in `key_secret` under the signature name;
/// locating it is a precondition even though the success criterion is digest
/// equality.
pub async fn verify_signature(
    descriptor: &ComponentDescriptor,
    source: &dyn DescriptorSource,
    signature_name: &str,
    key_secret: &SecretDocument,
) -> Result<VerifyOutcome> {
    let signature = descriptor.signature(signature_name).ok_or_else(|| {
        Error::verification(format!(
            "component {} carries no signature named {}",
            descriptor.name, signature_name
        ))
    })?;

    let public_key = key_secret.get(signature_name)?.ok_or_else(|| {
        Error::verification(format!("public key for signature {} not found", signature_name))
    })?;
    debug!(
        "located public key for signature {} ({} bytes)",
        signature_name,
        public_key.len()
    );

    if !signature
        .digest
        .hash_algorithm
        .eq_ignore_ascii_case(DIGEST_ALGORITHM_SHA256)
    {
        return Err(Error::verification(format!(
            "unsupported digest algorithm: {}",
            signature.digest.hash_algorithm
        )));
    }

    let computed = digest_descriptor(descriptor, source).await?;

    if computed == signature.digest.value {
        debug!("signature {} verified for {}", signature_name, descriptor.name);
        Ok(VerifyOutcome {
            verified: true,
            digest: computed,
            reason: None,
        })
    } else {
        let reason = format!(
            "digest mismatch: computed {}, stored {}",
            computed, signature.digest.value
        );
        warn!("signature {} NOT verified for {}: {}", signature_name, descriptor.name, reason);
        Ok(VerifyOutcome {
            verified: false,
            digest: computed,
            reason: Some(reason),
        })
    }
}
