//! Command handlers -- one module per subcommand

pub mod config;
pub mod deploy;
pub mod drive;
pub mod status;
pub mod ui;
