//! Log subscriber setup.
//!
//! Logs go to stderr so stdout stays clean for reports. `RUST_LOG` wins over
//! the level picked from `-v`/`-q`.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{CliConfig, Verbosity};
use crate::error::{CliError, CliResult};

/// Default filter directive for a verbosity
#[must_use]
pub const fn default_directive(verbosity: Verbosity) -> &'static str {
    match verbosity {
        Verbosity::Quiet => "error",
        Verbosity::Normal => "warn",
        Verbosity::Verbose => "briefcheck=info,warn",
        Verbosity::Debug => "briefcheck=debug,info",
    }
}

/// Install the global subscriber
pub fn init(config: &CliConfig) -> CliResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config.verbosity)));

    let json = config
        .log_json
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text = (!config.log_json).then(|| {
        fmt::layer()
            .with_ansi(config.color.should_color())
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .try_init()
        .map_err(|e| CliError::config(format!("cannot install log subscriber: {e}")))
}
