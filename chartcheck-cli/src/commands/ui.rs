//! `chartcheck ui` command handler

use tracing::info;

use chartcheck_core::HarnessConfig;
use chartcheck_engine::verify_enterprise_ui_deployment;

use crate::cli::UiArgs;
use crate::error::CliError;
use crate::output::OutputWriter;

const DEFAULT_SCENARIO: &str = "enterprise-ui-test";

/// Execute the `ui` command. Output uses the deployment report rendering.
pub async fn execute(
    args: UiArgs,
    config: HarnessConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let name = args.name.unwrap_or_else(|| DEFAULT_SCENARIO.to_owned());
    info!(scenario = %name, image = %config.images.ui, "deploying enterprise ui");
    let report = verify_enterprise_ui_deployment(&config, &name).await?;
    writer.render(&report)?;
    Ok(())
}
