//! Cascading config evaluation
//!
//! Merges localization substitutions and config rules into one ordered
//! adjustments payload, injects it into the package's config template under
//! the reserved key, evaluates `(( reference ))` expressions against the
//! merged binding set, and decodes the evaluated payload back into the final
//! substitution list.
//!
//! Bindings are private to the cascade: the template document, any stub
//! value-sets, and the user configuration, later sources overriding earlier
//! ones. Nothing from the process environment is visible to expressions.

use crate::package::{ConfigRule, Substitution};
use brokkr_core::{document, merge, valuepath, Document, Error, Result, SchemaValidator};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Reserved key carrying the substitution list through the cascade
pub const ADJUSTMENTS_KEY: &str = "adjustments";

/// Placeholder namespace templates may reference without defining it
pub const UTILITIES_KEY: &str = "utilities";

fn expr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(\(\s*([^()]+?)\s*\)\)").expect("expression regex"))
}

/// Produce the final ordered substitution list
///
/// Implements the full cascade: empty-rules no-op, schema validation of the
/// (possibly empty) user configuration, adjustments merge (localizations
/// first, config rules appended), reserved-key collision check, evaluation,
/// and decode of the evaluated `adjustments` field. The returned order is
/// authoritative for the applier.
pub fn configure(
    rules: &[ConfigRule],
    localizations: Vec<Substitution>,
    user_config: &Document,
    template: &Document,
    schema: &Document,
    stubs: &[Document],
) -> Result<Vec<Substitution>> {
    if rules.is_empty() {
        return Ok(Vec::new());
    }

    let have_schema = !document::is_empty(schema);
    let config_empty = document::is_empty(user_config);

    if config_empty {
        if have_schema {
            // catches schemas with required fields before any evaluation
            SchemaValidator::compile(schema)?.validate_empty()?;
        }
        if document::is_empty(template) {
            return Ok(Vec::new());
        }
    } else if have_schema {
        SchemaValidator::compile(schema)?.validate_document(user_config)?;
    }

    let mut adjustments = Vec::with_capacity(localizations.len() + rules.len());
    for substitution in &localizations {
        adjustments.push(encode_entry(substitution)?);
    }
    for rule in rules {
        adjustments.push(encode_entry(rule)?);
    }
    debug!("cascading {} adjustment entries", adjustments.len());

    let mut doc = if document::is_empty(template) {
        serde_yaml_ng::Mapping::new()
    } else {
        match template {
            Document::Mapping(map) => map.clone(),
            _ => return Err(Error::validation("config template must be a mapping")),
        }
    };

    let adjustments_key = Document::String(ADJUSTMENTS_KEY.to_string());
    if doc.contains_key(&adjustments_key) {
        return Err(Error::validation(format!(
            "config template may not define reserved key {:?}",
            ADJUSTMENTS_KEY
        )));
    }
    doc.insert(adjustments_key, Document::Sequence(adjustments));

    let utilities_key = Document::String(UTILITIES_KEY.to_string());
    if !doc.contains_key(&utilities_key) {
        doc.insert(utilities_key, Document::String(String::new()));
    }

    let doc = Document::Mapping(doc);

    // private-mode bindings: template < stubs < user configuration
    let mut layers: Vec<&Document> = Vec::with_capacity(stubs.len() + 2);
    layers.push(&doc);
    layers.extend(stubs.iter());
    if !config_empty {
        layers.push(user_config);
    }
    let bindings = merge::layered(&layers);

    let evaluated = evaluate(&doc, &bindings)?;

    let list = evaluated
        .get(ADJUSTMENTS_KEY)
        .cloned()
        .unwrap_or(Document::Sequence(Vec::new()));
    serde_yaml_ng::from_value(list)
        .map_err(|e| Error::cascade(format!("cannot decode evaluated adjustments: {}", e)))
}

/// Evaluate a document's spec against user configuration values
///
/// Used for the downstream deploy template, where the document itself and
/// the configuration form the whole binding set.
pub fn evaluate_with_values(doc: &Document, values: &Document) -> Result<Document> {
    let bindings = merge::layered(&[doc, values]);
    evaluate(doc, &bindings)
}

fn encode_entry<T: serde::Serialize>(entry: &T) -> Result<Document> {
    serde_yaml_ng::to_value(entry)
        .map_err(|e| Error::cascade(format!("cannot encode adjustments payload: {}", e)))
}

/// Recursively evaluate every `(( reference ))` expression in a document
pub fn evaluate(doc: &Document, bindings: &Document) -> Result<Document> {
    match doc {
        Document::String(s) => evaluate_string(s, bindings),
        Document::Mapping(map) => {
            let mut out = serde_yaml_ng::Mapping::new();
            for (key, value) in map {
                out.insert(key.clone(), evaluate(value, bindings)?);
            }
            Ok(Document::Mapping(out))
        }
        Document::Sequence(seq) => {
            let mut out = Vec::with_capacity(seq.len());
            for value in seq {
                out.push(evaluate(value, bindings)?);
            }
            Ok(Document::Sequence(out))
        }
        other => Ok(other.clone()),
    }
}

fn evaluate_string(s: &str, bindings: &Document) -> Result<Document> {
    let re = expr_regex();

    // a whole-string expression keeps the bound value's type
    if let Some(found) = re.find(s) {
        if found.start() == 0 && found.end() == s.len() {
            if let Some(expr) = re.captures(s).and_then(|c| c.get(1)) {
                return resolve(expr.as_str(), bindings).cloned();
            }
        }
    } else {
        return Ok(Document::String(s.to_string()));
    }

    // embedded expressions stringify scalar values in place
    let mut out = String::new();
    let mut last = 0;
    for caps in re.captures_iter(s) {
        let (Some(whole), Some(expr)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&s[last..whole.start()]);
        let value = resolve(expr.as_str(), bindings)?;
        let scalar = scalar_string(value).ok_or_else(|| {
            Error::cascade(format!("reference (( {} )) is not a scalar", expr.as_str()))
        })?;
        out.push_str(&scalar);
        last = whole.end();
    }
    out.push_str(&s[last..]);
    Ok(Document::String(out))
}

fn resolve<'a>(expr: &str, bindings: &'a Document) -> Result<&'a Document> {
    let segments = valuepath::parse(expr)
        .map_err(|e| Error::cascade_with(format!("invalid reference (( {} ))", expr), e))?;
    valuepath::get(bindings, &segments)
        .ok_or_else(|| Error::cascade(format!("unresolvable reference (( {} ))", expr)))
}

fn scalar_string(value: &Document) -> Option<String> {
    match value {
        Document::String(s) => Some(s.clone()),
        Document::Bool(b) => Some(b.to_string()),
        Document::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Document {
        serde_yaml_ng::from_str(s).unwrap()
    }

    fn rule(path: &str, value: &str) -> ConfigRule {
        ConfigRule {
            name: None,
            file_path: "deploy.yaml".to_string(),
            value_path: path.to_string(),
            value: yaml(value),
        }
    }

    fn localization() -> Substitution {
        Substitution {
            name: Some("image".to_string()),
            file_path: "deploy.yaml".to_string(),
            value_path: "spec.image".to_string(),
            value: Document::String("registry.example/app@sha256:abc".to_string()),
        }
    }

    #[test]
    fn test_empty_rules_is_noop_regardless_of_inputs() {
        let result = configure(
            &[],
            vec![localization()],
            &yaml("replicas: 3"),
            &yaml("defaults: {}"),
            &yaml("type: object"),
            &[],
        )
        .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_empty_config_no_schema_no_template_is_noop() {
        let result = configure(
            &[rule("spec.replicas", "1")],
            Vec::new(),
            &Document::Null,
            &Document::Null,
            &Document::Null,
            &[],
        )
        .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_empty_config_with_required_schema_fails() {
        let schema = yaml("type: object\nrequired: [replicas]");
        let err = configure(
            &[rule("spec.replicas", "(( replicas ))")],
            Vec::new(),
            &Document::Null,
            &yaml("defaults: {}"),
            &schema,
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }), "got: {:?}", err);
    }

    #[test]
    fn test_config_validated_against_schema() {
        let schema = yaml("type: object\nproperties:\n  replicas:\n    type: integer");
        let err = configure(
            &[rule("spec.replicas", "(( replicas ))")],
            Vec::new(),
            &yaml("replicas: lots"),
            &Document::Null,
            &schema,
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }), "got: {:?}", err);
    }

    #[test]
    fn test_reserved_key_collision_fails_before_evaluation() {
        // the unresolvable reference would fail evaluation; the collision
        // must win because it is checked first
        let err = configure(
            &[rule("spec.replicas", "(( no.such.binding ))")],
            Vec::new(),
            &yaml("replicas: 3"),
            &yaml("adjustments: predefined"),
            &Document::Null,
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }), "got: {:?}", err);
        assert!(err.to_string().contains("adjustments"));
    }

    #[test]
    fn test_user_config_resolves_rule_expression() {
        let result = configure(
            &[rule("spec.replicas", "(( replicas ))")],
            Vec::new(),
            &yaml("replicas: 3"),
            &Document::Null,
            &Document::Null,
            &[],
        )
        .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].value_path, "spec.replicas");
        assert_eq!(result[0].value, Document::from(3));
    }

    #[test]
    fn test_localizations_come_first_then_rules() {
        let result = configure(
            &[rule("spec.replicas", "2")],
            vec![localization()],
            &yaml("replicas: 3"),
            &Document::Null,
            &Document::Null,
            &[],
        )
        .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].value_path, "spec.image");
        assert_eq!(result[1].value_path, "spec.replicas");
    }

    #[test]
    fn test_override_by_later_source() {
        // template default < stub < user config
        let template = yaml("defaults:\n  tag: template\n");
        let stub = yaml("defaults:\n  tag: stub\n");
        let rules = [rule("spec.tag", "(( defaults.tag ))")];

        let from_stub = configure(&rules, Vec::new(), &Document::Null, &template, &Document::Null, &[stub.clone()]).unwrap();
        assert_eq!(from_stub[0].value, Document::from("stub"));

        let user = yaml("defaults:\n  tag: user\n");
        let from_user = configure(&rules, Vec::new(), &user, &template, &Document::Null, &[stub]).unwrap();
        assert_eq!(from_user[0].value, Document::from("user"));
    }

    #[test]
    fn test_utilities_placeholder_is_injected() {
        let result = configure(
            &[rule("spec.note", "(( utilities ))")],
            Vec::new(),
            &yaml("replicas: 3"),
            &Document::Null,
            &Document::Null,
            &[],
        )
        .unwrap();
        assert_eq!(result[0].value, Document::from(""));
    }

    #[test]
    fn test_embedded_expression_stringifies() {
        let result = configure(
            &[rule("spec.image", "(( image.repo )):(( image.tag ))")],
            Vec::new(),
            &yaml("image:\n  repo: registry.example/app\n  tag: 1.2.3\n"),
            &Document::Null,
            &Document::Null,
            &[],
        )
        .unwrap();
        assert_eq!(result[0].value, Document::from("registry.example/app:1.2.3"));
    }

    #[test]
    fn test_unresolvable_reference_is_cascade_error() {
        let err = configure(
            &[rule("spec.replicas", "(( missing ))")],
            Vec::new(),
            &yaml("replicas: 3"),
            &Document::Null,
            &Document::Null,
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Cascade { .. }), "got: {:?}", err);
    }

    #[test]
    fn test_evaluate_with_values_for_deploy_template() {
        let spec = yaml("interval: 5m\npath: (( env.path ))\n");
        let values = yaml("env:\n  path: ./production\n");
        let evaluated = evaluate_with_values(&spec, &values).unwrap();
        assert_eq!(evaluated["path"], Document::from("./production"));
        assert_eq!(evaluated["interval"], Document::from("5m"));
    }
}
