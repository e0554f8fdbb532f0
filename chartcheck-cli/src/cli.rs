//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no side effects or I/O. Global image and chart flags
//! are applied on top of the loaded configuration by [`Cli::apply_overrides`].

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use chartcheck_core::HarnessConfig;
use chartcheck_engine::driver::Suite;
use chartcheck_engine::Edition;

/// chartcheck -- deploy the scanning-engine chart and verify it end to end.
///
/// Use `chartcheck <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "chartcheck", version, about, long_about = None)]
pub struct Cli {
    /// Path to the chartcheck.toml configuration file.
    #[arg(short, long, default_value = "chartcheck.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Engine image to deploy.
    #[arg(long, global = true)]
    pub engine_img: Option<String>,

    /// Enterprise image to deploy.
    #[arg(long, global = true)]
    pub enterprise_img: Option<String>,

    /// Enterprise UI image to deploy.
    #[arg(long, global = true)]
    pub ui_img: Option<String>,

    /// Path to the chart under test.
    #[arg(long, global = true)]
    pub engine_chart_path: Option<String>,

    /// Keep namespaces and releases after the run.
    #[arg(long, global = true)]
    pub persist_chart: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Apply command-line overrides; these win over file and environment.
    pub fn apply_overrides(&self, config: &mut HarnessConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(image) = &self.engine_img {
            config.images.engine = image.clone();
        }
        if let Some(image) = &self.enterprise_img {
            config.images.enterprise = image.clone();
        }
        if let Some(image) = &self.ui_img {
            config.images.ui = image.clone();
        }
        if let Some(path) = &self.engine_chart_path {
            config.chart.path = path.clone();
        }
        if self.persist_chart {
            config.chart.persist = true;
        }
    }
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install the chart and verify every engine service.
    Deploy(DeployArgs),

    /// Install the chart with the enterprise UI and check its landing page.
    Ui(UiArgs),

    /// Wait until `anchore-cli system status` reports every service up.
    Status(StatusArgs),

    /// Run the built-in anchore-cli checks against a running API.
    Drive(DriveArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- deploy ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EditionArg {
    Engine,
    Enterprise,
}

impl From<EditionArg> for Edition {
    fn from(arg: EditionArg) -> Self {
        match arg {
            EditionArg::Engine => Edition::Engine,
            EditionArg::Enterprise => Edition::Enterprise,
        }
    }
}

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Chart edition to deploy.
    pub edition: EditionArg,

    /// Scenario name used as namespace and release prefix.
    #[arg(long)]
    pub name: Option<String>,

    /// Skip the tox suite.
    #[arg(long)]
    pub short: bool,
}

// ---- ui ----

#[derive(Args, Debug)]
pub struct UiArgs {
    /// Scenario name used as namespace and release prefix.
    #[arg(long)]
    pub name: Option<String>,
}

// ---- status ----

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Engine API URL, e.g. http://localhost:8228/v1.
    #[arg(long)]
    pub url: String,

    /// Services that must report up (default: every engine service).
    #[arg(long, value_delimiter = ',')]
    pub services: Vec<String>,
}

// ---- drive ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SuiteArg {
    All,
    Account,
    Image,
    System,
}

impl From<SuiteArg> for Suite {
    fn from(arg: SuiteArg) -> Self {
        match arg {
            SuiteArg::All => Suite::All,
            SuiteArg::Account => Suite::Account,
            SuiteArg::Image => Suite::Image,
            SuiteArg::System => Suite::System,
        }
    }
}

#[derive(Args, Debug)]
pub struct DriveArgs {
    /// Engine API URL.
    #[arg(long, default_value = "http://localhost:8228/v1")]
    pub url: String,

    /// Which checks to run.
    #[arg(default_value = "all")]
    pub suite: SuiteArg,
}

// ---- config ----

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + flags + defaults).
    Show {
        /// Show only one section (general, images, chart, cluster, wait, cli, suite, driver).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_deploy_engine() {
        let cli = Cli::try_parse_from(["chartcheck", "deploy", "engine"]).expect("parse succeeded");
        match cli.command {
            Commands::Deploy(args) => {
                assert_eq!(args.edition, EditionArg::Engine);
                assert!(args.name.is_none());
                assert!(!args.short, "short should default to false");
            }
            _ => panic!("expected Deploy command"),
        }
    }

    #[test]
    fn test_cli_parse_deploy_enterprise_short_named() {
        let cli = Cli::try_parse_from([
            "chartcheck",
            "deploy",
            "enterprise",
            "--name",
            "nightly",
            "--short",
        ])
        .expect("parse succeeded");
        match cli.command {
            Commands::Deploy(args) => {
                assert_eq!(Edition::from(args.edition), Edition::Enterprise);
                assert_eq!(args.name.as_deref(), Some("nightly"));
                assert!(args.short);
            }
            _ => panic!("expected Deploy command"),
        }
    }

    #[test]
    fn test_cli_parse_deploy_requires_edition() {
        assert!(Cli::try_parse_from(["chartcheck", "deploy"]).is_err());
        assert!(Cli::try_parse_from(["chartcheck", "deploy", "community"]).is_err());
    }

    #[test]
    fn test_cli_parse_ui() {
        let cli = Cli::try_parse_from(["chartcheck", "ui"]).expect("parse succeeded");
        assert!(matches!(cli.command, Commands::Ui(UiArgs { name: None })));
    }

    #[test]
    fn test_cli_parse_status_services() {
        let cli = Cli::try_parse_from([
            "chartcheck",
            "status",
            "--url",
            "http://localhost:8228/v1",
            "--services",
            "catalog,apiext",
        ])
        .expect("parse succeeded");
        match cli.command {
            Commands::Status(args) => {
                assert_eq!(args.url, "http://localhost:8228/v1");
                assert_eq!(args.services, vec!["catalog", "apiext"]);
            }
            _ => panic!("expected Status command"),
        }
    }

    #[test]
    fn test_cli_parse_status_requires_url() {
        assert!(Cli::try_parse_from(["chartcheck", "status"]).is_err());
    }

    #[test]
    fn test_cli_parse_drive_defaults() {
        let cli = Cli::try_parse_from(["chartcheck", "drive"]).expect("parse succeeded");
        match cli.command {
            Commands::Drive(args) => {
                assert_eq!(args.url, "http://localhost:8228/v1");
                assert_eq!(Suite::from(args.suite), Suite::All);
            }
            _ => panic!("expected Drive command"),
        }
    }

    #[test]
    fn test_cli_parse_drive_suite() {
        let cli = Cli::try_parse_from(["chartcheck", "drive", "image"]).expect("parse succeeded");
        match cli.command {
            Commands::Drive(args) => assert_eq!(args.suite, SuiteArg::Image),
            _ => panic!("expected Drive command"),
        }
    }

    #[test]
    fn test_cli_parse_config_show_section() {
        let cli = Cli::try_parse_from(["chartcheck", "config", "show", "--section", "wait"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Config(config_args) => match config_args.action {
                ConfigAction::Show { section } => assert_eq!(section.as_deref(), Some("wait")),
                _ => panic!("expected Show action"),
            },
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn test_cli_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "chartcheck",
            "deploy",
            "engine",
            "--engine-img",
            "docker.io/anchore/anchore-engine:dev",
            "--persist-chart",
            "--output",
            "json",
        ])
        .expect("parse succeeded");
        assert_eq!(cli.engine_img.as_deref(), Some("docker.io/anchore/anchore-engine:dev"));
        assert!(cli.persist_chart);
        assert!(matches!(cli.output, OutputFormat::Json));
    }

    #[test]
    fn test_overrides_win_over_config() {
        let cli = Cli::try_parse_from([
            "chartcheck",
            "--log-level",
            "debug",
            "--ui-img",
            "ui:dev",
            "--engine-chart-path",
            "/charts/anchore-engine",
            "--persist-chart",
            "ui",
        ])
        .expect("parse succeeded");
        let mut config = HarnessConfig::default();
        let engine_before = config.images.engine.clone();
        cli.apply_overrides(&mut config);

        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.images.ui, "ui:dev");
        assert_eq!(config.images.engine, engine_before);
        assert_eq!(config.chart.path, "/charts/anchore-engine");
        assert!(config.chart.persist);
    }

    #[test]
    fn test_cli_parse_custom_config_path() {
        let cli = Cli::try_parse_from(["chartcheck", "-c", "/custom/chartcheck.toml", "ui"])
            .expect("parse succeeded");
        assert_eq!(cli.config, PathBuf::from("/custom/chartcheck.toml"));
    }

    #[test]
    fn test_cli_parse_missing_command_fails() {
        assert!(Cli::try_parse_from(["chartcheck"]).is_err());
    }

    #[test]
    fn test_cli_verify_command_structure() {
        let cmd = Cli::command();
        assert_eq!(cmd.get_name(), "chartcheck");

        let subcommands: Vec<_> = cmd.get_subcommands().map(|s| s.get_name()).collect();
        for expected in ["deploy", "ui", "status", "drive", "config"] {
            assert!(
                subcommands.contains(&expected),
                "should have '{expected}' subcommand"
            );
        }
    }
}
