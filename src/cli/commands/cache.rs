//! Cache command - inspect and clear the resource cache

use crate::cache::{format_bytes, CacheNamespace};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::GateResult;
use crate::gateway::{Gateway, NamespaceUsage};
use crate::ui::{self, UiContext};
use console::style;

pub async fn execute(args: CacheArgs, config: &Config) -> GateResult<()> {
    let gateway = Gateway::from_config(config);

    match args.action {
        CacheAction::List { format } => list_namespaces(&gateway, format).await,
        CacheAction::Size => show_size(&gateway).await,
        CacheAction::Evict { namespace } => evict(&gateway, &namespace).await,
        CacheAction::Clear { yes } => clear_all(&gateway, yes).await,
    }
}

async fn list_namespaces(gateway: &Gateway, format: OutputFormat) -> GateResult<()> {
    let status = gateway.status().await?;

    if status.namespaces.is_empty() && format != OutputFormat::Json {
        println!("No cached namespaces.");
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_table(&status.namespaces, status.total_bytes),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status.namespaces)?),
        OutputFormat::Plain => {
            for usage in &status.namespaces {
                println!("{}", usage.namespace);
            }
        }
    }

    Ok(())
}

fn print_table(namespaces: &[NamespaceUsage], total: u64) {
    println!("{:<40} {:<12} {:<8}", "NAMESPACE", "SIZE", "ACTIVE");
    println!("{}", "-".repeat(60));

    for usage in namespaces {
        let active = if usage.active {
            style("yes").green().to_string()
        } else {
            style("no").dim().to_string()
        };
        println!(
            "{:<40} {:<12} {:<8}",
            usage.namespace.as_str(),
            format_bytes(usage.bytes),
            active
        );
    }

    println!();
    println!(
        "Total: {} namespace(s), {}",
        namespaces.len(),
        format_bytes(total)
    );
}

async fn show_size(gateway: &Gateway) -> GateResult<()> {
    let ctx = UiContext::detect();
    let status = gateway.status().await?;

    ui::key_value(&ctx, "Resources", &format_bytes(status.total_bytes));
    ui::key_value(&ctx, "Hash manifests", &format_bytes(status.hash_disk_bytes));
    ui::key_value(&ctx, "Namespaces", &status.namespaces.len().to_string());
    Ok(())
}

async fn evict(gateway: &Gateway, namespace: &str) -> GateResult<()> {
    let ctx = UiContext::detect();
    let namespace = CacheNamespace::new(namespace)?;

    if gateway.evict(&namespace).await? {
        ui::step_ok(&ctx, &format!("Evicted {}", namespace));
    } else {
        ui::step_warn(&ctx, &format!("Namespace {} is not cached", namespace));
    }
    Ok(())
}

async fn clear_all(gateway: &Gateway, yes: bool) -> GateResult<()> {
    let ctx = UiContext::detect().with_auto_yes(yes);
    let status = gateway.status().await?;

    let prompt = format!(
        "Remove {} namespace(s) ({}) and the persisted manifest?",
        status.namespaces.len(),
        format_bytes(status.total_bytes + status.hash_disk_bytes)
    );
    if !ui::confirm(&ctx, &prompt, false).await? {
        ui::step_info(&ctx, "Nothing removed");
        return Ok(());
    }

    gateway.clear_all_caches().await?;
    ui::step_ok(&ctx, "All caches cleared");
    Ok(())
}
