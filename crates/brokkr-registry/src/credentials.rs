//! Consumer identity and credential resolution
//!
//! A repository endpoint maps to a consumer identity (`OCIRegistry` plus
//! hostname) which keys the credential lookup. Endpoints are allowed to omit
//! the scheme; they are normalized with an `oci://` prefix before host
//! extraction.

use crate::secrets::{SecretDocument, SecretStore};
use brokkr_core::{Error, Result};
use tracing::debug;
use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Consumer type for OCI registry endpoints
pub const CONSUMER_TYPE_OCI_REGISTRY: &str = "OCIRegistry";

/// Well-known credential property names
pub const PROPERTY_USERNAME: &str = "username";
pub const PROPERTY_PASSWORD: &str = "password";
pub const PROPERTY_TOKEN: &str = "token";

/// Stable key used to look up credentials for a remote endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConsumerIdentity {
    pub consumer_type: String,
    pub hostname: String,
}

impl ConsumerIdentity {
    /// Derive the identity for a repository endpoint URL
    ///
    /// Endpoints without a scheme (`registry.example.com/base`) are prefixed
    /// with `oci://` before parsing. The hostname keeps an explicit port.
    pub fn for_endpoint(endpoint: &str) -> Result<Self> {
        let parsed = parse_endpoint(endpoint)?;
        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::credential(format!("endpoint has no host: {}", endpoint)))?;

        let hostname = match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Ok(Self {
            consumer_type: CONSUMER_TYPE_OCI_REGISTRY.to_string(),
            hostname,
        })
    }
}

impl std::fmt::Display for ConsumerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{type: {}, hostname: {}}}", self.consumer_type, self.hostname)
    }
}

/// Parse an endpoint URL, normalizing scheme-less endpoints with `oci://`
pub(crate) fn parse_endpoint(endpoint: &str) -> Result<Url> {
    if let Ok(url) = Url::parse(endpoint) {
        if url.host_str().is_some_and(|h| !h.is_empty()) {
            return Ok(url);
        }
    }
    let url = Url::parse(&format!("oci://{}", endpoint))
        .map_err(|e| Error::credential(format!("unparsable endpoint {}: {}", endpoint, e)))?;
    if !url.host_str().is_some_and(|h| !h.is_empty()) {
        return Err(Error::credential(format!("endpoint has no host: {}", endpoint)));
    }
    Ok(url)
}

/// Credential property set for one consumer
///
/// Values are zeroized on drop and redacted in debug output.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    #[zeroize(skip)]
    names: Vec<String>,
    values: Vec<String>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a secret's entries into a property set, skipping empty values
    pub fn from_secret(secret: &SecretDocument) -> Result<Self> {
        let mut credentials = Self::new();
        for (name, value) in secret.entries()? {
            credentials.set_non_empty(name, value);
        }
        Ok(credentials)
    }

    /// Set a property unless the value is empty
    pub fn set_non_empty(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            return;
        }
        let name = name.into();
        if let Some(pos) = self.names.iter().position(|n| *n == name) {
            self.values[pos].zeroize();
            self.values[pos] = value;
        } else {
            self.names.push(name);
            self.values.push(value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|pos| self.values[pos].as_str())
    }

    pub fn username(&self) -> Option<&str> {
        self.get(PROPERTY_USERNAME)
    }

    pub fn password(&self) -> Option<&str> {
        self.get(PROPERTY_PASSWORD)
    }

    pub fn token(&self) -> Option<&str> {
        self.get(PROPERTY_TOKEN)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credentials({} properties [REDACTED])", self.names.len())
    }
}

/// Resolve credentials for a repository endpoint from its referenced secret
///
/// Returns `None` when the identity has no credential secret configured
/// (anonymous registry access).
pub async fn resolve_for_endpoint(
    store: &dyn SecretStore,
    endpoint: &str,
    secret_name: Option<&str>,
) -> Result<Option<Credentials>> {
    let identity = ConsumerIdentity::for_endpoint(endpoint)?;

    let Some(secret_name) = secret_name else {
        debug!("no credential secret for consumer {}", identity);
        return Ok(None);
    };

    debug!("resolving credentials for consumer {}", identity);
    let secret = store.get(secret_name).await?;
    let credentials = Credentials::from_secret(&secret)?;
    Ok(Some(credentials))
}
