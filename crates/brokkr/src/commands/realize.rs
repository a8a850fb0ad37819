//! `brokkr realize` - execute one full resolve-to-publish run

use crate::cli::RealizeArgs;
use crate::config::{self, RealizeConfig};
use anyhow::Result;
use brokkr_deliver::{DirObjectStore, LocalManifestApi, ObjectStore, Runner, S3ObjectStore};
use brokkr_registry::FileSecretStore;
use camino::Utf8Path;
use std::sync::Arc;
use tracing::debug;

pub async fn run(args: RealizeArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let config = config::load(config_path)?;
    debug!(
        "realizing {}/{} from {}",
        config.request.namespace, config.request.name, config.request.component.endpoint
    );

    let secrets = Arc::new(FileSecretStore::new(config.secrets_dir.as_std_path()));
    let store = object_store(&config).await?;
    let deployments = Arc::new(LocalManifestApi::new(config.manifest_dir.as_std_path()));

    let runner = Runner::new(secrets, store, deployments);
    let report = runner.execute(&config.request).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("component:  {}:{}", report.component, report.version);
        if let Some(verified) = report.verified {
            match (verified, &report.verification_reason) {
                (true, _) => println!("signature:  verified"),
                (false, Some(reason)) => println!("signature:  UNVERIFIED ({})", reason),
                (false, None) => println!("signature:  UNVERIFIED"),
            }
        }
        println!("bucket:     {}", report.bucket);
        println!("published:  {} files", report.published_files);
        if let Some(downstream) = &report.downstream {
            println!("downstream: {}", downstream);
        }
    }

    Ok(())
}

async fn object_store(config: &RealizeConfig) -> Result<Arc<dyn ObjectStore>> {
    if let Some(s3) = &config.storage.s3 {
        let store = S3ObjectStore::connect(&s3.region, s3.endpoint.as_deref()).await?;
        return Ok(Arc::new(store));
    }

    let dir = config
        .storage
        .dir
        .clone()
        .unwrap_or_else(|| camino::Utf8PathBuf::from("./objects"));
    Ok(Arc::new(DirObjectStore::new(dir.as_std_path())))
}
