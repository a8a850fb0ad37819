//! `brokkr verify` - resolve a component version and verify its signature

use crate::cli::VerifyArgs;
use crate::config;
use anyhow::{bail, Context, Result};
use brokkr_registry::credentials::resolve_for_endpoint;
use brokkr_registry::secrets::SecretStore;
use brokkr_registry::{verify_signature, ComponentResolver, FileSecretStore};
use camino::Utf8Path;

pub async fn run(args: VerifyArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let config = config::load(config_path)?;
    let request = &config.request;

    let Some(verify) = &request.verify else {
        bail!("run configuration has no verify block");
    };

    let secrets = FileSecretStore::new(config.secrets_dir.as_std_path());
    let credentials = resolve_for_endpoint(
        &secrets,
        &request.component.endpoint,
        request.component.credentials_secret.as_deref(),
    )
    .await?;

    let resolver = ComponentResolver::new(&request.component.endpoint, credentials)?;
    let cv = resolver
        .lookup(&request.component.name, &request.component.version)
        .await
        .context("component resolution failed")?;

    let key_secret = secrets.get(&verify.public_key_secret).await?;
    let outcome = verify_signature(cv.descriptor(), &resolver, &verify.signature, &key_secret).await?;

    if args.json {
        println!(
            "{}",
            serde_json::json!({
                "component": cv.name(),
                "version": cv.version(),
                "digest": outcome.digest,
                "verified": outcome.verified,
                "reason": outcome.reason,
            })
        );
    } else {
        println!("component: {}:{}", cv.name(), cv.version());
        println!("digest:    {}", outcome.digest);
        if outcome.verified {
            println!("signature: verified");
        } else {
            println!(
                "signature: UNVERIFIED ({})",
                outcome.reason.as_deref().unwrap_or("no reason recorded")
            );
        }
    }

    if !outcome.verified {
        bail!("component {}:{} is unverified", cv.name(), cv.version());
    }

    Ok(())
}
