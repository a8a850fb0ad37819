//! End-to-end pipeline tests over a staged template tree
//!
//! Covers the localize -> cascade -> substitute -> publish sequence without
//! a registry: the descriptor and template archive are built in-process.

use async_trait::async_trait;
use brokkr_core::document::{decode_auto, DocFormat};
use brokkr_core::{Document, Result};
use brokkr_deliver::publish::CONTENT_TYPE_YAML;
use brokkr_deliver::{
    apply, configure, localize, parse_package, publish_tree, ObjectStore, StagingTree,
};
use brokkr_registry::types::ComponentDescriptor;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

const DESCRIPTOR: &str = r#"
name: acme.org/podinfo
version: 6.3.5
resources:
  - name: app-image
    type: ociImage
    access:
      type: ociArtifact
      imageReference: registry.example/app@sha256:abc
"#;

const PACKAGE: &str = r#"
templateResource:
  name: deploy-templates
localizationRules:
  - resourceName: app-image
    filePath: deploy.yaml
    valuePath: spec.template.containers[0].image
configRules:
  - name: replicas
    filePath: deploy.yaml
    valuePath: spec.replicas
    value: (( replicas ))
configScheme:
  type: object
  properties:
    replicas:
      type: integer
      minimum: 1
"#;

const DEPLOY: &str = "spec:\n  replicas: 1\n  template:\n    containers:\n      - image: registry.example/app:latest\n        name: app\n";

/// In-memory object store capturing uploaded content
struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
        }
    }

    fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&format!("{}/{}", bucket, key))
            .cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
        content_type: &str,
    ) -> Result<()> {
        assert_eq!(content_type, CONTENT_TYPE_YAML);
        let data = std::fs::read(local_path)?;
        self.objects
            .lock()
            .unwrap()
            .insert(format!("{}/{}", bucket, key), data);
        Ok(())
    }
}

fn staged_template() -> StagingTree {
    let tree = StagingTree::create().unwrap();
    let mut builder = tar::Builder::new(Vec::new());
    for (path, content) in [
        ("deploy.yaml", DEPLOY),
        ("manifests/service.yaml", "kind: Service\n"),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, content.as_bytes())
            .unwrap();
    }
    let archive = builder.into_inner().unwrap();
    tree.extract_archive(&archive).unwrap();
    tree
}

#[tokio::test]
async fn test_full_pipeline_localize_cascade_substitute_publish() {
    let descriptor: ComponentDescriptor = serde_yaml_ng::from_str(DESCRIPTOR).unwrap();
    let package = parse_package(PACKAGE.as_bytes()).unwrap();
    let tree = staged_template();

    let localizations = localize(&package.localization_rules, &descriptor).unwrap();
    let config: Document = serde_yaml_ng::from_str("replicas: 3\n").unwrap();
    let substitutions = configure(
        &package.config_rules,
        localizations,
        &config,
        &package.config_template,
        &package.config_scheme,
        &[],
    )
    .unwrap();

    // localization entry first, config rule appended
    assert_eq!(substitutions.len(), 2);
    assert_eq!(
        substitutions[0].value,
        Document::String("registry.example/app@sha256:abc".to_string())
    );

    apply(&substitutions, &tree).unwrap();

    let store = MemoryStore::new();
    let published = publish_tree(&store, "podinfo.default", &tree).await.unwrap();
    assert_eq!(published, 2);

    let deploy = store.object("podinfo.default", "deploy.yaml").unwrap();
    let (doc, format) = decode_auto(&deploy).unwrap();
    assert_eq!(format, DocFormat::Yaml);
    assert_eq!(
        doc["spec"]["template"]["containers"][0]["image"],
        Document::from("registry.example/app@sha256:abc")
    );
    assert_eq!(doc["spec"]["replicas"], Document::from(3));
    // untouched fields survive
    assert_eq!(
        doc["spec"]["template"]["containers"][0]["name"],
        Document::from("app")
    );
    // untouched files survive byte-for-byte
    assert_eq!(
        store.object("podinfo.default", "manifests/service.yaml").unwrap(),
        b"kind: Service\n".to_vec()
    );
}

#[tokio::test]
async fn test_pipeline_rejects_config_violating_schema() {
    let package = parse_package(PACKAGE.as_bytes()).unwrap();
    let config: Document = serde_yaml_ng::from_str("replicas: 0\n").unwrap();

    let err = configure(
        &package.config_rules,
        Vec::new(),
        &config,
        &package.config_template,
        &package.config_scheme,
        &[],
    )
    .unwrap_err();
    assert!(matches!(err, brokkr_core::Error::Validation { .. }));
}
