//! Result and error types for briefcheck.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that can occur while driving a scenario
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A locator matched zero or several elements where exactly one was required
    #[error("Could not resolve {locator}: expected exactly one match, found {found}")]
    Resolution {
        /// Locator description
        locator: String,
        /// Number of matching elements
        found: usize,
    },

    /// A wait condition was not satisfied within its bound
    #[error("Timed out after {ms}ms waiting for {condition}")]
    Timeout {
        /// Condition description
        condition: String,
        /// Bound in milliseconds
        ms: u64,
        /// Last observation before giving up
        last_observation: String,
    },

    /// An expected route mock was never hit, so its traffic went elsewhere
    #[error("Route mock {pattern} was never hit")]
    MockMiss {
        /// Route pattern description
        pattern: String,
        /// Passthrough URLs that look like they were meant for this route
        near_misses: Vec<String>,
    },

    /// Evidence capture failed
    #[error("Evidence capture '{name}' failed: {message}")]
    Capture {
        /// Checkpoint name
        name: String,
        /// Error message
        message: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Low-level driver failure
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Scenario assertion failed
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Scenario body panicked
    #[error("Scenario panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

/// Coarse error classification carried in scenario reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Zero or ambiguous element matches
    Resolution,
    /// Bounded wait expired
    Timeout,
    /// Expected mock never intercepted anything
    MockMiss,
    /// Screenshot could not be taken or written
    Capture,
    /// Failed assertion
    Assertion,
    /// Panic inside the scenario body
    Panic,
    /// Browser, driver, IO or configuration trouble
    Infrastructure,
}

impl HarnessError {
    /// Build a driver error from anything printable
    pub fn driver(message: impl std::fmt::Display) -> Self {
        Self::Driver {
            message: message.to_string(),
        }
    }

    /// Build an assertion failure
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            message: message.into(),
        }
    }

    /// Build a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Classification used by reports and exit codes
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Resolution { .. } => ErrorKind::Resolution,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::MockMiss { .. } => ErrorKind::MockMiss,
            Self::Capture { .. } => ErrorKind::Capture,
            Self::AssertionFailed { .. } => ErrorKind::Assertion,
            Self::Panicked { .. } => ErrorKind::Panic,
            Self::BrowserLaunch { .. }
            | Self::Navigation { .. }
            | Self::Driver { .. }
            | Self::Config { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Yaml(_) => ErrorKind::Infrastructure,
        }
    }

    /// Whether this is a bounded-wait expiry
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
