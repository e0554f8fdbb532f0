//! `chartcheck status` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use chartcheck_core::HarnessConfig;
use chartcheck_engine::services::SYSTEM_STATUS_SERVICES;
use chartcheck_engine::suite::cli_env_for_url;
use chartcheck_engine::system_status::verify_engine_system_status;

use crate::cli::StatusArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `status` command.
pub async fn execute(
    args: StatusArgs,
    config: HarnessConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let services = services_or_default(args.services);
    let env = cli_env_for_url(&args.url, &config.cli.user, &config.cli.password);

    info!(url = %args.url, services = ?services, "checking system status");
    let output = verify_engine_system_status(&services, &env, &config.wait).await?;

    writer.render(&StatusReport {
        url: args.url,
        services,
        output,
    })?;
    Ok(())
}

fn services_or_default(services: Vec<String>) -> Vec<String> {
    if services.is_empty() {
        SYSTEM_STATUS_SERVICES
            .iter()
            .map(|s| (*s).to_owned())
            .collect()
    } else {
        services
    }
}

/// Result of a passing `system status` check.
#[derive(Serialize)]
pub struct StatusReport {
    pub url: String,
    pub services: Vec<String>,
    /// Raw `anchore-cli system status` output.
    pub output: String,
}

impl Render for StatusReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "System status: {}", self.url)?;
        for service in &self.services {
            writeln!(w, "  {service:<16} up")?;
        }
        Ok(())
    }
}
