//! Layered document merging
//!
//! The cascade evaluates expressions against a flat merge of its sources
//! (template document, stub value-sets, user configuration), later sources
//! overriding earlier ones. Mappings merge key-wise and recursively; scalars
//! and sequences are replaced wholesale by the overriding source.

use crate::document::Document;

/// Merge `source` into `target`, with `source` taking precedence
pub fn overlay(target: &mut Document, source: &Document) {
    match (target, source) {
        (Document::Mapping(target_map), Document::Mapping(source_map)) => {
            for (key, source_value) in source_map {
                match target_map.get_mut(key) {
                    Some(target_value) => overlay(target_value, source_value),
                    None => {
                        target_map.insert(key.clone(), source_value.clone());
                    }
                }
            }
        }
        // a null overlay never erases concrete values
        (_, Document::Null) => {}
        (target, source) => *target = source.clone(),
    }
}

/// Merge an ordered list of layers into one document, later layers winning
pub fn layered(layers: &[&Document]) -> Document {
    let mut merged = Document::Null;
    for layer in layers {
        if merged.is_null() {
            merged = (*layer).clone();
        } else {
            overlay(&mut merged, layer);
        }
    }
    merged
}
