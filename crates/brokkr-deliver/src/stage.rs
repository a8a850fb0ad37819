//! Ephemeral staging tree
//!
//! The materialized file tree is an arena-scoped resource: a fresh temporary
//! root is allocated per run, all file operations are path-relative against
//! it, and the whole tree is removed when the value drops, on every exit
//! path. Trees are never persisted or shared across run attempts.

use brokkr_core::{Error, Result};
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tempfile::TempDir;
use tracing::debug;

/// Ephemeral file tree scoped to one run
pub struct StagingTree {
    root: TempDir,
}

impl StagingTree {
    /// Allocate a fresh staging root
    pub fn create() -> Result<Self> {
        let root = tempfile::Builder::new()
            .prefix("brokkr-stage-")
            .tempdir()
            .map_err(|e| Error::materialization(format!("failed to create staging tree: {}", e)))?;
        debug!("created staging tree at {:?}", root.path());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Extract a tar archive into the staging root
    ///
    /// Entry paths must stay inside the tree: absolute paths and `..`
    /// traversal are rejected as materialization failures.
    pub fn extract_archive(&self, data: &[u8]) -> Result<()> {
        let mut archive = Archive::new(data);
        let entries = archive
            .entries()
            .map_err(|e| Error::materialization(format!("corrupt template archive: {}", e)))?;

        let mut count = 0usize;
        for entry in entries {
            let mut entry =
                entry.map_err(|e| Error::materialization(format!("corrupt archive entry: {}", e)))?;
            let path = entry
                .path()
                .map_err(|e| Error::materialization(format!("archive entry has invalid path: {}", e)))?
                .into_owned();

            if !is_safe_relative(&path) {
                return Err(Error::materialization(format!(
                    "archive entry escapes the staging tree: {:?}",
                    path
                )));
            }

            entry
                .unpack_in(self.root.path())
                .map_err(|e| Error::materialization(format!("failed to unpack {:?}: {}", path, e)))?;
            count += 1;
        }

        debug!("extracted {} archive entries into staging tree", count);
        Ok(())
    }

    /// Resolve a canonical relative key to its absolute path in the tree
    pub fn resolve(&self, rel: &str) -> Result<PathBuf> {
        let key = canonicalize_rel(rel)?;
        Ok(self.root.path().join(key))
    }

    /// Read a file by its relative key
    pub fn read(&self, rel: &str) -> Result<Vec<u8>> {
        let path = self.resolve(rel)?;
        Ok(std::fs::read(path)?)
    }

    /// Write a file by its relative key
    pub fn write(&self, rel: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve(rel)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(std::fs::write(path, data)?)
    }
}

/// Normalize a relative file key: strip `.` segments, collapse separators,
/// reject absolute paths and `..` traversal
pub fn canonicalize_rel(path: &str) -> Result<String> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(Error::validation(format!(
                    "path escapes the staging tree: {}",
                    path
                )))
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return Err(Error::validation(format!("empty file path: {:?}", path)));
    }
    Ok(segments.join("/"))
}

fn is_safe_relative(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
