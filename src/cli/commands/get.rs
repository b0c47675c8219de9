//! Get command - serve one resource path through the gateway

use crate::cli::args::{GetArgs, OutputFormat};
use crate::config::Config;
use crate::error::{GateError, GateResult};
use crate::gateway::Gateway;
use crate::origin::InterceptResponse;
use crate::ui::{self, UiContext};
use serde::Serialize;
use tokio::fs;
use tracing::warn;

#[derive(Serialize)]
struct ResponseSummary<'a> {
    status: u16,
    reason: &'a str,
    mime_type: &'a str,
    charset: &'a str,
    bytes: usize,
    headers: &'a [(String, String)],
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a crate::origin::ErrorDetail>,
}

pub async fn execute(args: GetArgs, config: &Config) -> GateResult<()> {
    let gateway = Gateway::from_config(config);

    // A failed resolve still leaves the persisted manifest to fall back on
    if !args.offline {
        if let Err(e) = gateway.initialize().await {
            warn!("Version resolution failed: {}", e);
        }
    }

    let response = gateway.intercept(&args.path, args.query.as_deref()).await;

    if let Some(ref output) = args.output {
        if response.is_success() {
            fs::write(output, &response.body)
                .await
                .map_err(|e| GateError::io(format!("writing {}", output.display()), e))?;
        }
    }

    match args.format {
        OutputFormat::Json => {
            let summary = ResponseSummary {
                status: response.status,
                reason: response.reason,
                mime_type: &response.mime_type,
                charset: &response.charset,
                bytes: response.body.len(),
                headers: &response.headers,
                error: response.error.as_ref(),
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Plain => println!("{} {}", response.status, response.reason),
        OutputFormat::Table => print_table(&response),
    }

    match response.error {
        None => Ok(()),
        Some(detail) => Err(GateError::User(format!(
            "HTTP {} {}: {}",
            response.status, response.reason, detail.message
        ))),
    }
}

fn print_table(response: &InterceptResponse) {
    let ctx = UiContext::detect();
    ui::key_value_status(
        &ctx,
        "Status",
        &format!("{} {}", response.status, response.reason),
        response.is_success(),
    );
    ui::key_value(
        &ctx,
        "Content-Type",
        &format!("{}; charset={}", response.mime_type, response.charset),
    );
    ui::key_value(&ctx, "Bytes", &response.body.len().to_string());
    for name in ["X-Cache", "X-Integrity", "X-Resource-Path", "X-Error-Kind"] {
        if let Some(value) = response.header(name) {
            ui::key_value(&ctx, name, value);
        }
    }
}
