//! `chartcheck drive` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use chartcheck_core::HarnessConfig;
use chartcheck_engine::driver::{AnchoreCli, CliContext, Driver, LedgerSummary, Suite};

use crate::cli::DriveArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `drive` command.
///
/// Recorded check failures are reported and then turned into
/// [`CliError::DriverFailures`] so the exit code reflects them.
pub async fn execute(
    args: DriveArgs,
    config: HarnessConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let suite = Suite::from(args.suite);
    let runner = AnchoreCli::new(config.cli.exec_prefix.clone());
    let root = CliContext::from_config(&config.cli, args.url.clone());
    let mut driver = Driver::new(runner, root, config.driver.clone());

    info!(url = %args.url, suite = suite.as_str(), "running anchore-cli checks");
    let summary = driver.run(suite).await;
    let failed = summary.failed();

    writer.render(&DriveReport {
        api_url: args.url,
        suite: suite.as_str().to_owned(),
        summary,
    })?;

    if failed > 0 {
        return Err(CliError::DriverFailures(failed));
    }
    Ok(())
}

#[derive(Serialize)]
pub struct DriveReport {
    pub api_url: String,
    pub suite: String,
    #[serde(flatten)]
    pub summary: LedgerSummary,
}

impl Render for DriveReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "Driver: {} ({})", self.api_url, self.suite)?;
        let sections = [
            ("Positive Tests Passed", &self.summary.positive.pass),
            ("Positive Tests Failed", &self.summary.positive.fail),
            ("Negative Tests Passed", &self.summary.negative.pass),
            ("Negative Tests Failed", &self.summary.negative.fail),
        ];
        for (title, entries) in sections {
            if entries.is_empty() {
                continue;
            }
            writeln!(w, "  {title}:")?;
            for entry in entries {
                writeln!(w, "    {entry}")?;
            }
        }
        writeln!(
            w,
            "  Totals: {} passed, {} failed",
            self.summary.positive_passed + self.summary.negative_passed,
            self.summary.failed()
        )?;
        Ok(())
    }
}
