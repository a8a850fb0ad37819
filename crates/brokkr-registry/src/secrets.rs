//! Secret store abstraction
//!
//! Credentials and public keys live in secrets owned by the surrounding
//! platform. The store is a trait so the platform's own secret source can be
//! plugged in; the bundled implementation reads YAML secret documents from a
//! directory, one file per secret, with the usual split between base64
//! `data` entries and plain `stringData` entries.

use async_trait::async_trait;
use base64::Engine;
use brokkr_core::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// A fetched secret's key/value entries
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretDocument {
    /// Base64-encoded entries
    #[serde(default)]
    data: HashMap<String, String>,
    /// Plain-text entries; take precedence over `data` on key collision
    #[serde(default, rename = "stringData")]
    string_data: HashMap<String, String>,
}

impl SecretDocument {
    /// Build a secret from plain entries (test and in-process use)
    pub fn from_entries(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            data: HashMap::new(),
            string_data: entries.into_iter().collect(),
        }
    }

    /// Decode one entry by key
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(value) = self.string_data.get(key) {
            return Ok(Some(value.clone()));
        }
        match self.data.get(key) {
            Some(encoded) => {
                let raw = base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|e| {
                        Error::credential(format!("secret entry {} is not valid base64: {}", key, e))
                    })?;
                let value = String::from_utf8(raw).map_err(|_| {
                    Error::credential(format!("secret entry {} is not valid UTF-8", key))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Decode every entry, `stringData` winning on collision
    pub fn entries(&self) -> Result<Vec<(String, String)>> {
        let mut out: HashMap<String, String> = HashMap::new();
        for key in self.data.keys() {
            if let Some(value) = self.get(key)? {
                out.insert(key.clone(), value);
            }
        }
        for (key, value) in &self.string_data {
            out.insert(key.clone(), value.clone());
        }
        Ok(out.into_iter().collect())
    }
}

/// Source of named secrets
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch a secret by name; missing secrets are a `Credential` error
    async fn get(&self, name: &str) -> Result<SecretDocument>;
}

/// Directory-backed secret store (`<dir>/<name>.yaml`)
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get(&self, name: &str) -> Result<SecretDocument> {
        let path = self.dir.join(format!("{}.yaml", name));
        debug!("loading secret {} from {:?}", name, path);

        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            Error::credential(format!("secret {} not found at {:?}: {}", name, path, e))
        })?;

        serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::credential(format!("secret {} is malformed: {}", name, e)))
    }
}
