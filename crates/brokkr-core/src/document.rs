//! Dynamic document values with format-tagged decode and encode
//!
//! Package manifests, config documents, and the files targeted by
//! substitutions are arbitrarily shaped, so they are handled as generic
//! ordered document values rather than fixed structs. Files are decoded by
//! attempting JSON first and falling back to YAML; the format that succeeded
//! travels with the document so write-back uses the same encoding.

use crate::error::Result;

/// A dynamically shaped document value (null/bool/number/string/mapping/sequence)
pub type Document = serde_yaml_ng::Value;

/// The encoding a document was decoded from
///
/// Carried explicitly alongside each loaded document instead of being
/// re-inferred at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocFormat {
    Json,
    Yaml,
}

/// Decode raw bytes by attempting JSON first, falling back to YAML
///
/// Returns the decoded document together with the format that succeeded.
/// YAML accepts most JSON documents, so the JSON attempt must come first for
/// the format tag to be meaningful.
pub fn decode_auto(data: &[u8]) -> Result<(Document, DocFormat)> {
    match serde_json::from_slice::<Document>(data) {
        Ok(doc) => Ok((doc, DocFormat::Json)),
        Err(_) => {
            let doc = serde_yaml_ng::from_slice::<Document>(data)?;
            Ok((doc, DocFormat::Yaml))
        }
    }
}

/// Encode a document in the given format
pub fn encode(doc: &Document, format: DocFormat) -> Result<Vec<u8>> {
    match format {
        DocFormat::Json => Ok(serde_json::to_vec(doc)?),
        DocFormat::Yaml => Ok(serde_yaml_ng::to_string(doc)?.into_bytes()),
    }
}

/// Convert a document into a JSON value (for schema validation)
pub fn to_json(doc: &Document) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(doc)?)
}

/// Whether a document is absent for cascade purposes (missing or null)
pub fn is_empty(doc: &Document) -> bool {
    matches!(doc, Document::Null)
}
