//! Briefcheck CLI library
//!
//! Argument parsing, configuration layering, logging setup and report output
//! for the `briefcheck` binary.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod logging;
mod output;
mod runner;

pub use commands::{Cli, ColorArg, Commands, ConfigArgs, HarnessOverrides, ListArgs, RunArgs};
pub use config::{resolve_harness_config, resolve_with_env, CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{
    format_duration, render_listing, render_suite_text, OutputFormat, ProgressReporter,
    ScenarioListing,
};
pub use runner::{select, SuiteRunner, SUITE_NAME};
