//! Named-resource extraction with content-sniffed decompression
//!
//! Resource blobs may be stored compressed; the format is detected from the
//! content's magic bytes rather than any declared media type. Gzip is the
//! supported compressed form, anything else passes through unmodified.

use crate::resolver::ComponentVersion;
use crate::types::AccessSpec;
use brokkr_core::{Error, Result};
use flate2::read::GzDecoder;
use std::io::Read;
use tracing::debug;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Fetch a named resource's content, decompressed and buffered
pub async fn extract_resource(cv: &ComponentVersion, name: &str) -> Result<Vec<u8>> {
    let resource = cv.resource(name)?;

    let raw = match &resource.access {
        AccessSpec::LocalBlob { local_reference, .. } => cv.fetch_blob(local_reference).await?,
        other => {
            return Err(Error::validation(format!(
                "resource {} content is not fetchable (access kind {})",
                name,
                other.kind()
            )))
        }
    };

    let data = auto_decompress(raw)?;
    debug!("extracted resource {} ({} bytes)", name, data.len());
    Ok(data)
}

/// Decompress when the content sniffs as gzip, pass through otherwise
pub fn auto_decompress(data: Vec<u8>) -> Result<Vec<u8>> {
    if !data.starts_with(&GZIP_MAGIC) {
        return Ok(data);
    }

    let mut decoder = GzDecoder::new(data.as_slice());
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::materialization(format!("failed to decompress resource blob: {}", e)))?;
    Ok(out)
}
