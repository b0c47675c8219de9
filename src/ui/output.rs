//! Line-oriented CLI output
//!
//! Fancy contexts render through cliclack; everything else gets bracketed
//! plain-text markers that stay greppable in CI logs.

use super::context::UiContext;
use console::style;

#[derive(Debug, Clone, Copy)]
enum Level {
    Ok,
    Warn,
    Fail,
    Info,
}

impl Level {
    fn marker(self) -> console::StyledObject<&'static str> {
        match self {
            Self::Ok => style("[OK]").green(),
            Self::Warn => style("[WARN]").yellow(),
            Self::Fail => style("[FAIL]").red(),
            Self::Info => style("[INFO]").cyan(),
        }
    }
}

fn emit(ctx: &UiContext, level: Level, message: &str) {
    if ctx.use_fancy_output() {
        let _ = match level {
            Level::Ok => cliclack::log::success(message),
            Level::Warn => cliclack::log::warning(message),
            Level::Fail => cliclack::log::error(message),
            Level::Info => cliclack::log::info(message),
        };
    } else {
        println!("  {} {}", level.marker(), message);
    }
}

pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        cliclack::intro(style(title).cyan().bold()).ok();
    } else {
        println!("{}", style(title).cyan().bold());
    }
}

pub fn outro_success(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).green().bold()).ok();
    } else {
        println!("{} {}", Level::Ok.marker(), message);
    }
}

pub fn section(ctx: &UiContext, title: &str) {
    println!();
    if ctx.use_fancy_output() {
        cliclack::log::info(style(title).bold()).ok();
    } else {
        println!("{}", style(title).bold());
    }
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    emit(ctx, Level::Ok, message);
}

pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    emit(ctx, Level::Ok, &format!("{} ({})", message, style(detail).dim()));
}

pub fn step_warn(ctx: &UiContext, message: &str) {
    emit(ctx, Level::Warn, message);
}

pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    emit(ctx, Level::Warn, &format!("{} - {}", message, style(hint).dim()));
}

pub fn step_error_detail(ctx: &UiContext, message: &str, detail: &str) {
    emit(ctx, Level::Fail, &format!("{}: {}", message, style(detail).red()));
}

pub fn step_info(ctx: &UiContext, message: &str) {
    emit(ctx, Level::Info, message);
}

/// Dimmed hint line
pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::remark(message).ok();
    } else {
        println!("  {}", style(message).dim());
    }
}

pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.use_fancy_output() {
        println!("  {}: {}", style(key).dim(), value);
    } else {
        println!("  {}: {}", key, value);
    }
}

/// Key-value pair colored by whether the value is healthy
pub fn key_value_status(ctx: &UiContext, key: &str, value: &str, healthy: bool) {
    if ctx.use_fancy_output() {
        let value = if healthy {
            style(value).green()
        } else {
            style(value).yellow()
        };
        println!("  {}: {}", style(key).dim(), value);
    } else {
        let level = if healthy { Level::Ok } else { Level::Warn };
        println!("  {} {}: {}", level.marker(), key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_output_does_not_panic() {
        let ctx = UiContext::non_interactive();
        intro(&ctx, "bundlegate");
        section(&ctx, "Cache");
        step_ok(&ctx, "activated");
        step_warn_hint(&ctx, "no manifest", "run: bundlegate resolve");
        step_error_detail(&ctx, "fetch failed", "timeout");
        key_value_status(&ctx, "integrity", "VALID", true);
        outro_success(&ctx, "done");
    }
}
