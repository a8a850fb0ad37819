//! Error types for the Brokkr pipeline

use thiserror::Error;

/// Result type alias using brokkr-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Which stage of applying a substitution entry failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstitutionStage {
    /// Reading the target file from the staging tree
    Read,
    /// Decoding the target file as JSON or YAML
    Parse,
    /// Resolving the value path inside the decoded document
    PathResolution,
    /// Writing the patched file back
    Write,
}

impl std::fmt::Display for SubstitutionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubstitutionStage::Read => write!(f, "read"),
            SubstitutionStage::Parse => write!(f, "parse"),
            SubstitutionStage::PathResolution => write!(f, "path resolution"),
            SubstitutionStage::Write => write!(f, "write"),
        }
    }
}

/// Pipeline error taxonomy
///
/// Every component returns one of these to the run orchestrator; nothing is
/// retried or downgraded below the orchestrator. Signature digest mismatch is
/// deliberately NOT an error variant (see `VerifyOutcome`).
#[derive(Error, Debug)]
pub enum Error {
    /// Registry endpoint could not be reached (retryable)
    #[error("repository unreachable: {url}: {reason}")]
    RepositoryUnreachable { url: String, reason: String },

    /// Component, version, or resource does not exist (permanent)
    #[error("{kind} not found: {name}")]
    NotFound { kind: String, name: String },

    /// Credential secret missing or endpoint unparsable
    #[error("credential error: {message}")]
    Credential { message: String },

    /// Public key missing or signing options incomplete
    #[error("verification error: {message}")]
    Verification { message: String },

    /// Schema violation or reserved-key collision
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// Template-merge or cascade-evaluation failure
    #[error("cascade failed: {message}")]
    Cascade {
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Archive extraction or staging-tree filesystem failure
    #[error("materialization failed: {message}")]
    Materialization { message: String },

    /// A single substitution entry could not be applied
    #[error("substitution entry {index} for {file}: {stage} failed: {message}")]
    Substitution {
        index: usize,
        file: String,
        stage: SubstitutionStage,
        message: String,
    },

    /// Object upload or downstream resource creation failure
    #[error("publish failed: {message}")]
    Publish { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Error {
    /// Create a repository unreachable error
    pub fn repository_unreachable(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RepositoryUnreachable {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a not found error; `kind` names what was looked up
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a credential error
    pub fn credential(message: impl Into<String>) -> Self {
        Self::Credential {
            message: message.into(),
        }
    }

    /// Create a verification error
    pub fn verification(message: impl Into<String>) -> Self {
        Self::Verification {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a cascade error without an underlying cause
    pub fn cascade(message: impl Into<String>) -> Self {
        Self::Cascade {
            message: message.into(),
            source: None,
        }
    }

    /// Create a cascade error wrapping its originating cause
    pub fn cascade_with(message: impl Into<String>, source: Error) -> Self {
        Self::Cascade {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a materialization error
    pub fn materialization(message: impl Into<String>) -> Self {
        Self::Materialization {
            message: message.into(),
        }
    }

    /// Create a substitution error for a specific entry and stage
    pub fn substitution(
        index: usize,
        file: impl Into<String>,
        stage: SubstitutionStage,
        message: impl Into<String>,
    ) -> Self {
        Self::Substitution {
            index,
            file: file.into(),
            stage,
            message: message.into(),
        }
    }

    /// Create a publish error
    pub fn publish(message: impl Into<String>) -> Self {
        Self::Publish {
            message: message.into(),
        }
    }

    /// Whether the error indicates a condition worth retrying by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RepositoryUnreachable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitution_error_identifies_entry() {
        let err = Error::substitution(3, "deploy.yaml", SubstitutionStage::Parse, "bad yaml");
        let msg = err.to_string();
        assert!(msg.contains('3'), "missing index: {}", msg);
        assert!(msg.contains("deploy.yaml"), "missing file: {}", msg);
        assert!(msg.contains("parse"), "missing stage: {}", msg);
    }

    #[test]
    fn test_unreachable_is_retryable_not_found_is_not() {
        assert!(Error::repository_unreachable("oci://reg.example", "timeout").is_retryable());
        assert!(!Error::not_found("component version", "app:1.0.0").is_retryable());
    }

    #[test]
    fn test_cascade_wraps_source() {
        let inner = Error::validation("schema violation");
        let err = Error::cascade_with("config validation failed", inner);
        let chain = std::error::Error::source(&err);
        assert!(chain.is_some());
        assert!(chain.unwrap().to_string().contains("schema violation"));
    }
}
