//! # brokkr-registry
//!
//! Registry access for the Brokkr delivery pipeline:
//! - Consumer identity derivation and secret-backed credential resolution
//! - Docker Registry v2 client with bearer-token exchange
//! - Component-version resolution to immutable descriptors
//! - Digest-based signature verification with sub-component dereferencing
//! - Named-resource extraction with content-sniffed decompression

pub mod client;
pub mod credentials;
pub mod extract;
pub mod resolver;
pub mod secrets;
pub mod types;
pub mod verify;

pub use client::RegistryClient;
pub use credentials::{ConsumerIdentity, Credentials};
pub use extract::extract_resource;
pub use resolver::{ComponentResolver, ComponentVersion, DescriptorSource};
pub use secrets::{FileSecretStore, SecretDocument, SecretStore};
pub use types::{AccessSpec, ComponentDescriptor, ComponentIdentity, Resource, Signature};
pub use verify::{verify_signature, VerifyOutcome};
