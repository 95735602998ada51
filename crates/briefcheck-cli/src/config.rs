//! CLI configuration
//!
//! Two layers: how the CLI itself talks ([`CliConfig`]) and the harness
//! configuration it hands to the library, resolved file, then environment,
//! then flags.

use serde::{Deserialize, Serialize};
use std::path::Path;

use briefcheck::{ColorScheme, HarnessConfig, HarnessError};

use crate::commands::HarnessOverrides;
use crate::error::{CliError, CliResult};

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - failures only
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - scenario progress in the log
    Verbose,
    /// Debug - every action and wait
    Debug,
}

impl Verbosity {
    /// From the `-q` flag and `-v` count
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => console::Term::stderr().features().colors_supported(),
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
    /// JSON log lines
    pub log_json: bool,
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }

    /// Set JSON logging
    #[must_use]
    pub const fn with_log_json(mut self, log_json: bool) -> Self {
        self.log_json = log_json;
        self
    }
}

/// Resolve the harness configuration: file (or defaults), environment, flags
pub fn resolve_harness_config(
    path: Option<&Path>,
    overrides: &HarnessOverrides,
) -> CliResult<HarnessConfig> {
    resolve_with_env(path, overrides, |name| std::env::var(name).ok())
}

/// [`resolve_harness_config`] with an explicit variable source
pub fn resolve_with_env(
    path: Option<&Path>,
    overrides: &HarnessOverrides,
    var: impl Fn(&str) -> Option<String>,
) -> CliResult<HarnessConfig> {
    let base = match path {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };
    let config = apply_overrides(base.with_overrides_from(var), overrides);
    config.validate().map_err(|e| match e {
        HarnessError::Config { message } => CliError::Config { message },
        other => other.into(),
    })?;
    Ok(config)
}

fn apply_overrides(mut config: HarnessConfig, overrides: &HarnessOverrides) -> HarnessConfig {
    if let Some(url) = &overrides.base_url {
        config.base_url.clone_from(url);
    }
    if overrides.headed {
        config.headless = false;
    }
    if overrides.dark {
        config.color_scheme = Some(ColorScheme::Dark);
    }
    if overrides.no_sandbox {
        config.sandbox = false;
    }
    if let Some(dir) = &overrides.evidence_dir {
        config.evidence_dir.clone_from(dir);
    }
    if let Some(concurrency) = overrides.concurrency {
        config.concurrency = concurrency;
    }
    config
}
