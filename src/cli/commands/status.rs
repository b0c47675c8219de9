//! Status command - persisted manifest, cache usage and origin reachability

use crate::cache::format_bytes;
use crate::cli::args::{OutputFormat, StatusArgs};
use crate::config::{Config, ConfigManager};
use crate::error::GateResult;
use crate::gateway::Gateway;
use crate::ui::{self, UiContext};
use crate::version::{NetworkProbe, TcpProbe};
use std::time::Duration;

pub async fn execute(args: StatusArgs, config: &Config) -> GateResult<()> {
    let gateway = Gateway::from_config(config);
    let status = gateway.status().await?;

    if args.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let ctx = UiContext::detect();
    ui::intro(&ctx, "bundlegate status");

    ui::section(&ctx, "Origin");
    ui::key_value(&ctx, "Base URL", &config.origin.base_url);
    let reachable = TcpProbe::for_url(&config.origin.base_url, Duration::from_secs(2))
        .is_reachable()
        .await;
    ui::key_value_status(
        &ctx,
        "Reachable",
        if reachable { "yes" } else { "no" },
        reachable,
    );

    ui::section(&ctx, "Manifest");
    match status.persisted {
        Some(ref manifest) => {
            ui::key_value(&ctx, "Version", &manifest.version);
            match manifest.namespace(config.cache.namespace_key) {
                Ok(ns) => ui::key_value(&ctx, "Namespace", ns.as_str()),
                Err(e) => ui::step_warn(&ctx, &format!("Unusable namespace: {}", e)),
            }
            if manifest.force_update() {
                ui::step_warn(&ctx, "App update required");
            } else if gateway.app_update_available().await? {
                ui::step_info(&ctx, "Newer app version available");
            }
        }
        None => ui::step_warn_hint(&ctx, "No persisted manifest", "Run: bundlegate resolve"),
    }

    ui::section(&ctx, "Storage");
    ui::key_value(
        &ctx,
        "Resource cache",
        &ConfigManager::cache_root(config).display().to_string(),
    );
    ui::key_value(&ctx, "Namespaces", &status.namespaces.len().to_string());
    ui::key_value(&ctx, "Resources", &format_bytes(status.total_bytes));
    ui::key_value(&ctx, "Hash manifests", &format_bytes(status.hash_disk_bytes));

    Ok(())
}
