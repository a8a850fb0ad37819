//! Docker Registry v2 HTTP client
//!
//! Minimal client surface for component resolution: manifest and blob
//! fetches with bearer-token exchange. Transport failures and non-404 error
//! statuses classify as `RepositoryUnreachable` (retryable); 404 classifies
//! as `NotFound` (permanent) so callers can tell retry from permanent
//! failure apart.

use crate::credentials::Credentials;
use brokkr_core::{Error, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use std::sync::RwLock;
use tracing::{debug, trace};
use url::Url;

/// Manifest media types accepted when resolving a component version
const MANIFEST_ACCEPT: &str =
    "application/vnd.oci.image.manifest.v1+json,application/vnd.docker.distribution.manifest.v2+json";

/// Client for one registry endpoint
pub struct RegistryClient {
    client: reqwest::Client,
    scheme: &'static str,
    registry_host: String,
    credentials: Option<Credentials>,
    /// Cached bearer token obtained from the registry auth endpoint
    bearer_token: RwLock<Option<String>>,
}

impl RegistryClient {
    /// Create a client for a parsed endpoint URL
    ///
    /// Plain `http` endpoints keep plain HTTP (local registries); anything
    /// else, including `oci://`, is reached over HTTPS.
    pub fn from_url(endpoint: &Url, credentials: Option<Credentials>) -> Result<Self> {
        let host = endpoint
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::credential(format!("endpoint has no host: {}", endpoint)))?;
        let registry_host = match endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let scheme = if endpoint.scheme() == "http" { "http" } else { "https" };

        let client = reqwest::Client::builder()
            .user_agent(concat!("brokkr/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::repository_unreachable(registry_host.clone(), e.to_string()))?;

        Ok(Self {
            client,
            scheme,
            registry_host,
            credentials,
            bearer_token: RwLock::new(None),
        })
    }

    /// Host (with port) this client talks to
    pub fn host(&self) -> &str {
        &self.registry_host
    }

    fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.registry_host)
    }

    /// Obtain a bearer token via the registry token endpoint
    ///
    /// A `token` credential property is used directly; username/password are
    /// exchanged through the Docker Registry v2 token flow and cached.
    async fn get_token(&self, repository: &str) -> Result<String> {
        if let Some(token) = self.credentials.as_ref().and_then(|c| c.token()) {
            return Ok(token.to_string());
        }

        if let Some(token) = self.bearer_token.read().expect("token lock").as_ref() {
            return Ok(token.clone());
        }

        let token_url = format!(
            "{}/token?service={}&scope=repository:{}:pull",
            self.base_url(),
            self.registry_host,
            repository
        );
        debug!("requesting registry token from {}", token_url);

        let mut request = self.client.get(&token_url);
        if let Some(credentials) = &self.credentials {
            if let Some(username) = credentials.username() {
                request = request.basic_auth(username, credentials.password());
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::repository_unreachable(&token_url, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::repository_unreachable(
                &token_url,
                format!("token request failed ({}): {}", status, body),
            ));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::repository_unreachable(&token_url, e.to_string()))?;

        *self.bearer_token.write().expect("token lock") = Some(token_response.token.clone());

        Ok(token_response.token)
    }

    /// The authorization header for a repository request, when credentials exist
    async fn auth_header(&self, repository: &str) -> Result<Option<HeaderValue>> {
        if self.credentials.is_none() {
            return Ok(None);
        }
        let bearer = self.get_token(repository).await?;
        let value = HeaderValue::from_str(&format!("Bearer {}", bearer))
            .map_err(|e| Error::credential(format!("credential not header-safe: {}", e)))?;
        Ok(Some(value))
    }

    /// Fetch a manifest by tag or digest
    pub async fn get_manifest(&self, repository: &str, reference: &str) -> Result<OciManifest> {
        let url = format!("{}/v2/{}/manifests/{}", self.base_url(), repository, reference);
        debug!("fetching manifest from {}", url);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(MANIFEST_ACCEPT));
        if let Some(auth) = self.auth_header(repository).await? {
            headers.insert(AUTHORIZATION, auth);
        }

        let response = self
            .client
            .get(&url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| Error::repository_unreachable(&url, e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json()
                .await
                .map_err(|e| Error::repository_unreachable(&url, e.to_string())),
            reqwest::StatusCode::NOT_FOUND => Err(Error::not_found(
                "manifest",
                format!("{}/{}:{}", self.registry_host, repository, reference),
            )),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::repository_unreachable(
                    &url,
                    format!("registry returned {}: {}", status, body),
                ))
            }
        }
    }

    /// Fetch a blob by digest
    pub async fn get_blob(&self, repository: &str, digest: &str) -> Result<Vec<u8>> {
        let url = format!("{}/v2/{}/blobs/{}", self.base_url(), repository, digest);
        debug!("fetching blob from {}", url);

        let mut headers = HeaderMap::new();
        if let Some(auth) = self.auth_header(repository).await? {
            headers.insert(AUTHORIZATION, auth);
        }

        let response = self
            .client
            .get(&url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| Error::repository_unreachable(&url, e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| Error::repository_unreachable(&url, e.to_string()))?;
                trace!("fetched blob {} ({} bytes)", digest, bytes.len());
                Ok(bytes.to_vec())
            }
            reqwest::StatusCode::NOT_FOUND => Err(Error::not_found("blob", digest.to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::repository_unreachable(
                    &url,
                    format!("registry returned {}: {}", status, body),
                ))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Manifest of one stored component version
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciManifest {
    pub schema_version: i32,
    #[serde(default)]
    pub media_type: Option<String>,
    pub config: OciDescriptor,
    pub layers: Vec<OciDescriptor>,
}

/// Content-addressed reference to one blob inside a manifest
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciDescriptor {
    pub media_type: String,
    #[serde(default)]
    pub size: Option<u64>,
    pub digest: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::parse_endpoint;

    #[test]
    fn test_scheme_selection() {
        let url = parse_endpoint("http://localhost:5000").unwrap();
        let client = RegistryClient::from_url(&url, None).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000");

        let url = parse_endpoint("registry.example.com").unwrap();
        let client = RegistryClient::from_url(&url, None).unwrap();
        assert_eq!(client.base_url(), "https://registry.example.com");
    }

    #[test]
    fn test_manifest_parsing() {
        let manifest: OciManifest = serde_json::from_str(
            r#"{
                "schemaVersion": 2,
                "mediaType": "application/vnd.oci.image.manifest.v1+json",
                "config": {"mediaType": "application/vnd.oci.image.config.v1+json", "size": 2, "digest": "sha256:44"},
                "layers": [
                    {"mediaType": "application/vnd.brokkr.component.descriptor.v1+yaml", "size": 812, "digest": "sha256:aa"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(manifest.layers.len(), 1);
        assert_eq!(manifest.layers[0].digest, "sha256:aa");
    }
}
