//! Hashes command - inspect and clear hash manifests

use crate::cache::{format_bytes, CacheNamespace};
use crate::cli::args::{HashesAction, HashesArgs};
use crate::config::Config;
use crate::error::{GateError, GateResult};
use crate::gateway::Gateway;
use crate::ui::{self, UiContext};

pub async fn execute(args: HashesArgs, config: &Config) -> GateResult<()> {
    let gateway = Gateway::from_config(config);

    match args.action {
        HashesAction::Show { namespace, sample } => show(&gateway, config, namespace, sample).await,
        HashesAction::Clear { yes } => clear(&gateway, yes).await,
    }
}

/// Namespace from the argument, else from the persisted manifest
async fn target_namespace(
    gateway: &Gateway,
    config: &Config,
    namespace: Option<String>,
) -> GateResult<CacheNamespace> {
    if let Some(name) = namespace {
        return CacheNamespace::new(name);
    }
    match gateway.resolver().persisted().await? {
        Some(manifest) => manifest.namespace(config.cache.namespace_key),
        None => Err(GateError::NamespaceUninitialized),
    }
}

async fn show(
    gateway: &Gateway,
    config: &Config,
    namespace: Option<String>,
    sample: usize,
) -> GateResult<()> {
    let ctx = UiContext::detect();
    let namespace = target_namespace(gateway, config, namespace).await?;
    let hashes = gateway.hashes();
    let index = hashes.load_for(&namespace).await?;

    ui::section(&ctx, &format!("Hash manifest for {}", namespace));
    ui::key_value(&ctx, "Algorithm", &index.algorithm().to_string());
    ui::key_value(&ctx, "Records", &index.len().to_string());
    ui::key_value(
        &ctx,
        "Disk file",
        &hashes.disk_path(&namespace).display().to_string(),
    );
    ui::key_value(&ctx, "Disk usage", &format_bytes(hashes.disk_size().await?));

    for (path, digest) in index.sample(sample) {
        ui::remark(&ctx, &format!("{}  {}", digest, path));
    }
    Ok(())
}

async fn clear(gateway: &Gateway, yes: bool) -> GateResult<()> {
    let ctx = UiContext::detect().with_auto_yes(yes);
    if !ui::confirm(&ctx, "Remove all cached hash manifests?", false).await? {
        ui::step_info(&ctx, "Nothing removed");
        return Ok(());
    }

    gateway.hashes().clear_memory().await;
    gateway.hashes().clear_disk().await?;
    ui::step_ok(&ctx, "Hash manifests cleared");
    Ok(())
}
