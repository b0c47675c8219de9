//! Terminal output for the CLI
//!
//! Uses `cliclack` when attached to an interactive terminal and falls back
//! to plain bracketed lines in CI or when piped.

mod context;
mod output;
mod prompts;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, outro_success, remark, section, step_error_detail,
    step_info, step_ok, step_ok_detail, step_warn, step_warn_hint,
};
pub use prompts::confirm;
