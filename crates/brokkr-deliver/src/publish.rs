//! Publishing the staging tree to object storage
//!
//! Every regular file under the staging root is uploaded with an object key
//! equal to its root-relative path; directories and non-regular entries are
//! skipped. The first upload failure aborts the remaining walk. The S3
//! implementation supports S3-compatible stores (MinIO et al.) through a
//! custom endpoint with path-style addressing.

use crate::stage::StagingTree;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use brokkr_core::{Error, Result};
use std::path::{Component, Path};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Content type for published structured text files
pub const CONTENT_TYPE_YAML: &str = "application/x-yaml";

/// Destination for published files
///
/// Uploads have overwrite semantics; "already exists" is not a distinguished
/// case for files.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
        content_type: &str,
    ) -> Result<()>;
}

/// Upload every regular file in the tree; returns the number of uploads
pub async fn publish_tree(
    store: &dyn ObjectStore,
    bucket: &str,
    tree: &StagingTree,
) -> Result<usize> {
    let mut published = 0usize;

    for entry in WalkDir::new(tree.root()) {
        let entry = entry.map_err(|e| Error::publish(format!("staging tree walk failed: {}", e)))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(tree.root()).map_err(|e| {
            Error::publish(format!("file {:?} outside staging root: {}", entry.path(), e))
        })?;
        let key = object_key(relative)?;

        debug!("uploading {} to bucket {}", key, bucket);
        store
            .put(bucket, &key, entry.path(), CONTENT_TYPE_YAML)
            .await?;
        published += 1;
    }

    info!("published {} files to bucket {}", published, bucket);
    Ok(published)
}

/// Root-relative path as a slash-separated object key
fn object_key(relative: &Path) -> Result<String> {
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => segments.push(
                part.to_str()
                    .ok_or_else(|| Error::publish(format!("non-UTF-8 path: {:?}", relative)))?,
            ),
            Component::CurDir => continue,
            other => {
                return Err(Error::publish(format!(
                    "unexpected path component {:?} in {:?}",
                    other, relative
                )))
            }
        }
    }
    Ok(segments.join("/"))
}

/// S3-backed object store
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Connect using the default credential chain
    ///
    /// A custom endpoint switches to path-style addressing, required for
    /// MinIO and most S3-compatible services.
    pub async fn connect(region: &str, endpoint: Option<&str>) -> Result<Self> {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint_url) = endpoint {
            debug!("using custom object storage endpoint: {}", endpoint_url);
            builder = builder.endpoint_url(endpoint_url).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
        content_type: &str,
    ) -> Result<()> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| Error::publish(format!("cannot read {:?}: {}", local_path, e)))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                Error::publish(format!("upload of {} to {} failed: {}", key, bucket, e))
            })?;

        Ok(())
    }
}

/// Directory-backed object store (`<root>/<bucket>/<key>`)
///
/// Stands in for a real store in local development; the embedded
/// object-storage server's own provisioning is outside this pipeline.
#[derive(Debug, Clone)]
pub struct DirObjectStore {
    root: std::path::PathBuf,
}

impl DirObjectStore {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectStore for DirObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
        _content_type: &str,
    ) -> Result<()> {
        let dest = self.root.join(bucket).join(key);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::publish(format!("cannot create {:?}: {}", parent, e)))?;
        }
        tokio::fs::copy(local_path, &dest)
            .await
            .map_err(|e| Error::publish(format!("cannot copy to {:?}: {}", dest, e)))?;
        Ok(())
    }
}
