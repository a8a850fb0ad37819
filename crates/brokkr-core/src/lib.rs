//! # brokkr-core
//!
//! Core library for the Brokkr delivery pipeline providing:
//! - The shared error taxonomy for every pipeline stage
//! - Dynamic document values with format-tagged decode/encode
//! - Dot/bracket value-path parsing and navigation
//! - Layered document merging
//! - JSON Schema validation of configuration values

pub mod document;
pub mod error;
pub mod merge;
pub mod schema;
pub mod valuepath;

pub use document::{DocFormat, Document};
pub use error::{Error, Result, SubstitutionStage};
pub use schema::SchemaValidator;
