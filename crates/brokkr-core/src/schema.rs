//! JSON Schema validation for package-supplied config schemas
//!
//! A delivery package may carry a schema its user configuration must satisfy
//! before the cascade runs. Schemas arrive as documents inside the package,
//! so they are compiled per run rather than embedded.

use crate::document::{self, Document};
use crate::error::{Error, Result};
use jsonschema::Validator;
use tracing::debug;

/// Validator compiled from a package-supplied schema document
#[derive(Debug)]
pub struct SchemaValidator {
    schema: Validator,
}

impl SchemaValidator {
    /// Compile a schema document into a validator
    pub fn compile(schema: &Document) -> Result<Self> {
        let schema_value = document::to_json(schema)?;
        let compiled = jsonschema::validator_for(&schema_value)
            .map_err(|e| Error::validation(format!("failed to compile config schema: {}", e)))?;
        Ok(Self { schema: compiled })
    }

    /// Validate a JSON value, collecting every violation into one error
    pub fn validate(&self, value: &serde_json::Value) -> Result<()> {
        let errors: Vec<String> = self
            .schema
            .iter_errors(value)
            .map(|e| {
                let path = e.instance_path().to_string();
                if path.is_empty() {
                    format!("  - {}", e)
                } else {
                    format!("  - {}: {}", path, e)
                }
            })
            .collect();

        if !errors.is_empty() {
            debug!("config schema validation produced {} errors", errors.len());
            return Err(Error::validation(errors.join("\n")));
        }

        Ok(())
    }

    /// Validate a document value against the schema
    pub fn validate_document(&self, doc: &Document) -> Result<()> {
        self.validate(&document::to_json(doc)?)
    }

    /// Validate an empty configuration (`{}`) against the schema
    ///
    /// Catches schemas with required fields before cascading starts.
    pub fn validate_empty(&self) -> Result<()> {
        self.validate(&serde_json::json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Document {
        serde_yaml_ng::from_str(
            r#"
type: object
required: [replicas]
properties:
  replicas:
    type: integer
    minimum: 1
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_conforming_config() {
        let validator = SchemaValidator::compile(&schema()).unwrap();
        let config: Document = serde_yaml_ng::from_str("replicas: 3\n").unwrap();
        assert!(validator.validate_document(&config).is_ok());
    }

    #[test]
    fn test_validate_wrong_type() {
        let validator = SchemaValidator::compile(&schema()).unwrap();
        let config: Document = serde_yaml_ng::from_str("replicas: lots\n").unwrap();
        let err = validator.validate_document(&config).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }), "got: {:?}", err);
    }

    #[test]
    fn test_validate_empty_fails_required() {
        let validator = SchemaValidator::compile(&schema()).unwrap();
        let err = validator.validate_empty().unwrap_err();
        assert!(err.to_string().contains("required"), "got: {}", err);
    }

    #[test]
    fn test_validate_empty_passes_without_required() {
        let lax: Document = serde_yaml_ng::from_str("type: object\n").unwrap();
        let validator = SchemaValidator::compile(&lax).unwrap();
        assert!(validator.validate_empty().is_ok());
    }
}
