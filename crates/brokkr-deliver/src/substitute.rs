//! Substitution application
//!
//! All edits are grouped per target file so each file is read and written
//! exactly once. The file's encoding is probed (JSON first, YAML fallback)
//! and remembered, every entry for the file is spliced in list order, and
//! the patched document is written back in its original format. Failures
//! identify the offending entry, the file, and the stage that failed; no
//! entry is ever silently skipped.

use crate::package::Substitution;
use crate::stage::{canonicalize_rel, StagingTree};
use brokkr_core::document::{decode_auto, encode, DocFormat};
use brokkr_core::{valuepath, Document, Error, Result, SubstitutionStage};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::debug;

struct LoadedFile {
    doc: Document,
    format: DocFormat,
    /// Index of the last entry touching this file, reported on write failure
    last_index: usize,
}

/// Apply the final substitution list to the staging tree
pub fn apply(substitutions: &[Substitution], tree: &StagingTree) -> Result<()> {
    let mut files: HashMap<String, LoadedFile> = HashMap::new();
    let mut touch_order: Vec<String> = Vec::new();

    for (index, substitution) in substitutions.iter().enumerate() {
        let key = canonicalize_rel(&substitution.file_path).map_err(|e| {
            Error::substitution(
                index,
                &substitution.file_path,
                SubstitutionStage::PathResolution,
                e.to_string(),
            )
        })?;

        let loaded = match files.entry(key.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let data = tree.read(&key).map_err(|e| {
                    Error::substitution(index, &key, SubstitutionStage::Read, e.to_string())
                })?;
                let (doc, format) = decode_auto(&data).map_err(|e| {
                    Error::substitution(index, &key, SubstitutionStage::Parse, e.to_string())
                })?;
                touch_order.push(key.clone());
                entry.insert(LoadedFile {
                    doc,
                    format,
                    last_index: index,
                })
            }
        };
        loaded.last_index = index;

        let segments = valuepath::parse(&substitution.value_path).map_err(|e| {
            Error::substitution(index, &key, SubstitutionStage::PathResolution, e.to_string())
        })?;
        valuepath::set(&mut loaded.doc, &segments, substitution.value.clone()).map_err(|e| {
            Error::substitution(index, &key, SubstitutionStage::PathResolution, e.to_string())
        })?;
    }

    for key in touch_order {
        let Some(loaded) = files.get(&key) else {
            continue;
        };
        let data = encode(&loaded.doc, loaded.format).map_err(|e| {
            Error::substitution(loaded.last_index, &key, SubstitutionStage::Write, e.to_string())
        })?;
        tree.write(&key, &data).map_err(|e| {
            Error::substitution(loaded.last_index, &key, SubstitutionStage::Write, e.to_string())
        })?;
        debug!("wrote {} ({:?})", key, loaded.format);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn substitution(file: &str, path: &str, value: Document) -> Substitution {
        Substitution {
            name: None,
            file_path: file.to_string(),
            value_path: path.to_string(),
            value,
        }
    }

    fn staged(files: &[(&str, &str)]) -> StagingTree {
        let tree = StagingTree::create().unwrap();
        for (path, content) in files {
            tree.write(path, content.as_bytes()).unwrap();
        }
        tree
    }

    #[test]
    fn test_applies_in_order_later_entry_wins() {
        let tree = staged(&[("deploy.yaml", "spec:\n  replicas: 1\n  name: app\n")]);
        let subs = vec![
            substitution("deploy.yaml", "spec.replicas", Document::from(2)),
            substitution("deploy.yaml", "spec.replicas", Document::from(5)),
        ];
        apply(&subs, &tree).unwrap();

        let (doc, format) = decode_auto(&tree.read("deploy.yaml").unwrap()).unwrap();
        assert_eq!(format, DocFormat::Yaml);
        assert_eq!(doc["spec"]["replicas"], Document::from(5));
        assert_eq!(doc["spec"]["name"], Document::from("app"));
    }

    #[test]
    fn test_localization_example_end_to_end() {
        let tree = staged(&[(
            "deploy.yaml",
            "spec:\n  template:\n    containers:\n      - image: registry.example/app:latest\n        name: app\n",
        )]);
        let subs = vec![substitution(
            "deploy.yaml",
            "spec.template.containers[0].image",
            Document::from("registry.example/app@sha256:abc"),
        )];
        apply(&subs, &tree).unwrap();

        let (doc, _) = decode_auto(&tree.read("deploy.yaml").unwrap()).unwrap();
        assert_eq!(
            doc["spec"]["template"]["containers"][0]["image"],
            Document::from("registry.example/app@sha256:abc")
        );
        assert_eq!(
            doc["spec"]["template"]["containers"][0]["name"],
            Document::from("app")
        );
    }

    #[test]
    fn test_json_file_stays_json() {
        let tree = staged(&[("config.json", r#"{"spec":{"replicas":1}}"#)]);
        let subs = vec![substitution("config.json", "spec.replicas", Document::from(4))];
        apply(&subs, &tree).unwrap();

        let raw = tree.read("config.json").unwrap();
        let (doc, format) = decode_auto(&raw).unwrap();
        assert_eq!(format, DocFormat::Json);
        assert_eq!(doc["spec"]["replicas"], Document::from(4));
    }

    #[test]
    fn test_same_file_edits_share_one_read_and_write() {
        // equivalent target keys must collapse into a single load
        let tree = staged(&[("manifests/deploy.yaml", "spec:\n  a: 1\n  b: 2\n")]);
        let subs = vec![
            substitution("manifests/deploy.yaml", "spec.a", Document::from(10)),
            substitution("./manifests//deploy.yaml", "spec.b", Document::from(20)),
        ];
        apply(&subs, &tree).unwrap();

        let (doc, _) = decode_auto(&tree.read("manifests/deploy.yaml").unwrap()).unwrap();
        assert_eq!(doc["spec"]["a"], Document::from(10));
        assert_eq!(doc["spec"]["b"], Document::from(20));
    }

    #[test]
    fn test_missing_file_reports_entry_and_stage() {
        let tree = staged(&[]);
        let subs = vec![
            substitution("present.yaml", "a", Document::from(1)),
            substitution("absent.yaml", "a", Document::from(1)),
        ];
        tree.write("present.yaml", b"a: 0\n").unwrap();

        let err = apply(&subs, &tree).unwrap_err();
        match err {
            Error::Substitution { index, file, stage, .. } => {
                assert_eq!(index, 1);
                assert_eq!(file, "absent.yaml");
                assert_eq!(stage, SubstitutionStage::Read);
            }
            other => panic!("expected substitution error, got: {:?}", other),
        }
    }

    #[test]
    fn test_unparsable_file_reports_parse_stage() {
        let tree = staged(&[("broken.yaml", ":::\n  invalid: [[[yaml")]);
        let subs = vec![substitution("broken.yaml", "a", Document::from(1))];
        let err = apply(&subs, &tree).unwrap_err();
        assert!(
            matches!(err, Error::Substitution { stage: SubstitutionStage::Parse, .. }),
            "got: {:?}",
            err
        );
    }

    #[test]
    fn test_bad_path_reports_path_stage() {
        let tree = staged(&[("deploy.yaml", "spec: scalar\n")]);
        let subs = vec![substitution("deploy.yaml", "spec.replicas", Document::from(1))];
        let err = apply(&subs, &tree).unwrap_err();
        assert!(
            matches!(err, Error::Substitution { stage: SubstitutionStage::PathResolution, index: 0, .. }),
            "got: {:?}",
            err
        );
    }
}
