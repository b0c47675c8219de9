//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{GateError, GateResult};
use crate::ui::{self, UiContext};
use serde::de::DeserializeOwned;

const VALID_KEYS: &[&str] = &[
    "general.log_format",
    "general.audit_log",
    "origin.base_url",
    "origin.user_agent",
    "origin.request_timeout_secs",
    "origin.hash_timeout_secs",
    "origin.default_charset",
    "origin.intercept_prefixes",
    "origin.headers.<name>",
    "api.api_name",
    "api.success_code",
    "api.timeout_secs",
    "api.channel_no",
    "api.app_version",
    "api.device_code",
    "api.term_ip",
    "api.oper_no",
    "cache.root",
    "cache.hash_root",
    "cache.namespace_key",
    "cache.worker_threads",
    "cache.max_body_mb",
    "integrity.algorithm",
    "integrity.require_listed",
];

pub async fn execute(args: ConfigArgs, manager: &ConfigManager, config: &Config) -> GateResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => {
            let ctx = UiContext::detect();
            let mut updated = config.clone();
            if let Err(e) = apply(&mut updated, &key, &value) {
                ui::step_error_detail(&ctx, "Cannot set key", &e.to_string());
                ui::remark(&ctx, "Valid keys:");
                for key in VALID_KEYS {
                    eprintln!("  {}", key);
                }
                return Err(e);
            }
            manager.save(&updated).await?;
            ui::step_ok(&ctx, &format!("Set {} = {}", key, value));
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> GateResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> GateResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());
    Ok(())
}

/// Apply one dotted `key = value` assignment to `config`
fn apply(config: &mut Config, key: &str, value: &str) -> GateResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "log_format"] => match value {
            "text" | "json" => config.general.log_format = value.to_string(),
            _ => return Err(GateError::User(format!("Invalid log format: {}. Use text/json", value))),
        },
        ["general", "audit_log"] => config.general.audit_log = parse_bool(value)?,

        ["origin", "base_url"] => config.origin.base_url = value.to_string(),
        ["origin", "user_agent"] => config.origin.user_agent = value.to_string(),
        ["origin", "request_timeout_secs"] => config.origin.request_timeout_secs = parse_num(value)?,
        ["origin", "hash_timeout_secs"] => config.origin.hash_timeout_secs = parse_num(value)?,
        ["origin", "default_charset"] => config.origin.default_charset = value.to_string(),
        ["origin", "intercept_prefixes"] => config.origin.intercept_prefixes = parse_list(value),
        ["origin", "headers", name] if !name.is_empty() => {
            if value.is_empty() {
                config.origin.headers.remove(*name);
            } else {
                config.origin.headers.insert(name.to_string(), value.to_string());
            }
        }

        ["api", "api_name"] => config.api.api_name = value.to_string(),
        ["api", "success_code"] => config.api.success_code = value.to_string(),
        ["api", "timeout_secs"] => config.api.timeout_secs = parse_num(value)?,
        ["api", "channel_no"] => config.api.channel_no = value.to_string(),
        ["api", "app_version"] => config.api.app_version = value.to_string(),
        ["api", "device_code"] => config.api.device_code = value.to_string(),
        ["api", "term_ip"] => config.api.term_ip = value.to_string(),
        ["api", "oper_no"] => config.api.oper_no = value.to_string(),

        ["cache", "root"] => config.cache.root = parse_path(value),
        ["cache", "hash_root"] => config.cache.hash_root = parse_path(value),
        ["cache", "namespace_key"] => config.cache.namespace_key = parse_enum(value)?,
        ["cache", "worker_threads"] => config.cache.worker_threads = parse_num(value)?,
        ["cache", "max_body_mb"] => config.cache.max_body_mb = parse_num(value)?,

        ["integrity", "algorithm"] => config.integrity.algorithm = parse_enum(value)?,
        ["integrity", "require_listed"] => config.integrity.require_listed = parse_bool(value)?,

        _ => return Err(GateError::User(format!("Unknown config key: {}", key))),
    }

    Ok(())
}

fn parse_bool(value: &str) -> GateResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(GateError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_num<T: std::str::FromStr>(value: &str) -> GateResult<T> {
    value
        .parse()
        .map_err(|_| GateError::User(format!("Invalid number: {}", value)))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Empty value resets the override to the platform default
fn parse_path(value: &str) -> Option<std::path::PathBuf> {
    (!value.is_empty()).then(|| value.into())
}

/// Parse a unit enum by its serde name
fn parse_enum<T: DeserializeOwned>(value: &str) -> GateResult<T> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| GateError::User(format!("Invalid value: {}", value)))
}
