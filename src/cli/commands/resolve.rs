//! Resolve command - query the version API and activate the namespace

use crate::cli::args::{OutputFormat, ResolveArgs};
use crate::config::Config;
use crate::error::GateResult;
use crate::gateway::Gateway;
use crate::ui::{self, UiContext};
use crate::version::ResolveOrigin;

pub async fn execute(args: ResolveArgs, config: &Config) -> GateResult<()> {
    let gateway = Gateway::from_config(config);
    let init = gateway.initialize().await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&init)?),
        OutputFormat::Plain => println!("{}", init.namespace),
        OutputFormat::Table => {
            let ctx = UiContext::detect();
            ui::intro(&ctx, "Resource version");
            ui::key_value(&ctx, "Version", &init.manifest.version);
            ui::key_value(&ctx, "Namespace", init.namespace.as_str());
            ui::key_value_status(
                &ctx,
                "Source",
                &init.origin.to_string(),
                init.origin == ResolveOrigin::Fresh,
            );
            if init.manifest.force_update() {
                ui::step_warn(&ctx, "Manifest requires an app update");
            } else if init.manifest.app_update_available(&config.api.app_version) {
                ui::step_info(&ctx, "A newer app version is available");
            }
            ui::outro_success(&ctx, "Namespace activated");
        }
    }

    Ok(())
}
