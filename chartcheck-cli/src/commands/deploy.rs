//! `chartcheck deploy` command handler

use std::io::Write;

use tracing::info;

use chartcheck_core::HarnessConfig;
use chartcheck_engine::{DeploymentReport, Edition, verify_chart_deployment};

use crate::cli::DeployArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `deploy` command.
pub async fn execute(
    args: DeployArgs,
    mut config: HarnessConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let edition = Edition::from(args.edition);
    if args.short {
        config.suite.short = true;
    }
    let name = args
        .name
        .unwrap_or_else(|| edition.default_test_name().to_owned());

    info!(edition = %edition, scenario = %name, chart = %config.chart.path, "deploying chart");
    let report = verify_chart_deployment(&config, &name, edition).await?;
    writer.render(&report)?;
    Ok(())
}

impl Render for DeploymentReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "Scenario: {}", self.scenario)?;
        writeln!(w, "  Namespace: {}", self.namespace)?;
        writeln!(w, "  Release:   {}", self.release)?;
        writeln!(w, "  Services:")?;
        for service in &self.services {
            writeln!(w, "    - {service}")?;
        }
        if self.system_status_checked {
            writeln!(w, "  System status: all services up")?;
        }
        match &self.tox_log {
            Some(path) => writeln!(w, "  Tox suite: passed (log: {})", path.display())?,
            None => writeln!(w, "  Tox suite: skipped")?,
        }
        if self.persisted {
            writeln!(w, "  Resources kept (--persist-chart)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn report() -> DeploymentReport {
        DeploymentReport {
            scenario: "engine-test".to_owned(),
            namespace: "engine-test-a1b2c3".to_owned(),
            release: "engine-test-d4e5f6".to_owned(),
            services: vec![
                "engine-test-d4e5f6-anchore-engine-api".to_owned(),
                "engine-test-d4e5f6-anchore-engine-catalog".to_owned(),
            ],
            system_status_checked: true,
            tox_log: Some(PathBuf::from("./engine_tests.log")),
            persisted: false,
        }
    }

    #[test]
    fn test_render_deployment_report() {
        let mut buffer = Vec::new();
        report().render_text(&mut buffer).expect("render should succeed");
        let output = String::from_utf8(buffer).expect("valid UTF-8");

        assert!(output.contains("Namespace: engine-test-a1b2c3"));
        assert!(output.contains("- engine-test-d4e5f6-anchore-engine-catalog"));
        assert!(output.contains("Tox suite: passed (log: ./engine_tests.log)"));
        assert!(!output.contains("Resources kept"));
    }

    #[test]
    fn test_render_short_persisted_report() {
        let mut short = report();
        short.tox_log = None;
        short.persisted = true;

        let mut buffer = Vec::new();
        short.render_text(&mut buffer).expect("render should succeed");
        let output = String::from_utf8(buffer).expect("valid UTF-8");

        assert!(output.contains("Tox suite: skipped"));
        assert!(output.contains("Resources kept"));
    }
}
