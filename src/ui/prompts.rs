//! Confirmation prompt with non-interactive fallback

use super::context::UiContext;
use crate::error::{GateError, GateResult};

/// Ask for confirmation
///
/// Auto-yes contexts approve immediately; other non-interactive contexts
/// return `default` without prompting.
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> GateResult<bool> {
    if ctx.auto_yes() {
        println!("  {} (auto-approved)", message);
        return Ok(true);
    }
    if !ctx.is_interactive() {
        return Ok(default);
    }

    // cliclack blocks on stdin
    let message = message.to_string();
    tokio::task::spawn_blocking(move || {
        cliclack::confirm(&message)
            .initial_value(default)
            .interact()
    })
    .await
    .map_err(|e| GateError::User(format!("Prompt task failed: {}", e)))?
    .map_err(|e| GateError::User(format!("Prompt failed: {}", e)))
}
