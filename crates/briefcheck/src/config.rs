//! Harness configuration.
//!
//! Loaded from YAML, then overridden by environment variables, then by the
//! caller (the CLI applies its flags last). Every field has a default so an
//! empty file is valid.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::locator::Selector;
use crate::result::{HarnessError, HarnessResult};
use crate::session::{ColorScheme, SessionOptions, Viewport};
use crate::vocabulary::Control;
use crate::wait::LatencyClass;

/// Default application under test
pub const DEFAULT_BASE_URL: &str = "http://localhost:5173";

/// Default evidence directory
pub const DEFAULT_EVIDENCE_DIR: &str = "target/briefcheck/evidence";

/// Wait bounds per latency class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutPolicy {
    /// Fast UI transitions
    pub ui_ms: u64,
    /// Login, OTP and redirects after auth calls
    pub auth_ms: u64,
    /// Initial page and route loads
    pub page_load_ms: u64,
    /// AI-assisted revision
    pub ai_revision_ms: u64,
    /// Interval between condition evaluations
    pub poll_interval_ms: u64,
    /// Quiet window for network idle
    pub network_idle_window_ms: u64,
    /// Requests tolerated while still counting as idle
    pub network_idle_max_inflight: usize,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            ui_ms: 5_000,
            auth_ms: 10_000,
            page_load_ms: 30_000,
            ai_revision_ms: 60_000,
            poll_interval_ms: 100,
            network_idle_window_ms: 500,
            network_idle_max_inflight: 0,
        }
    }
}

impl TimeoutPolicy {
    /// Bound for a latency class
    #[must_use]
    pub const fn bound(&self, class: LatencyClass) -> Duration {
        Duration::from_millis(match class {
            LatencyClass::Ui => self.ui_ms,
            LatencyClass::Auth => self.auth_ms,
            LatencyClass::PageLoad => self.page_load_ms,
            LatencyClass::AiRevision => self.ai_revision_ms,
        })
    }

    /// Poll interval
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Same policy with every bound scaled to `ms` (tests and smoke runs)
    #[must_use]
    pub const fn uniform(ms: u64, poll_interval_ms: u64) -> Self {
        Self {
            ui_ms: ms,
            auth_ms: ms,
            page_load_ms: ms,
            ai_revision_ms: ms,
            poll_interval_ms,
            network_idle_window_ms: poll_interval_ms,
            network_idle_max_inflight: 0,
        }
    }
}

/// Top-level harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Application base URL
    pub base_url: String,
    /// Run browsers headless
    pub headless: bool,
    /// Fixed viewport for every session
    pub viewport: Option<Viewport>,
    /// Emulated color scheme for every session
    pub color_scheme: Option<ColorScheme>,
    /// Chromium executable
    pub chromium_path: Option<String>,
    /// Keep the Chromium sandbox on
    pub sandbox: bool,
    /// Where evidence is written
    pub evidence_dir: PathBuf,
    /// Scenarios run at once
    pub concurrency: usize,
    /// Wait bounds
    pub timeouts: TimeoutPolicy,
    /// Selector overrides per control
    pub vocabulary: HashMap<Control, Selector>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            headless: true,
            viewport: None,
            color_scheme: None,
            chromium_path: None,
            sandbox: true,
            evidence_dir: PathBuf::from(DEFAULT_EVIDENCE_DIR),
            concurrency: 1,
            timeouts: TimeoutPolicy::default(),
            vocabulary: HashMap::new(),
        }
    }
}

impl HarnessConfig {
    /// Parse YAML
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&text)
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> HarnessResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Apply `BRIEFCHECK_*` and `CHROMIUM_PATH` environment overrides
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source
    #[must_use]
    pub fn with_overrides_from(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = var("BRIEFCHECK_BASE_URL").filter(|v| !v.is_empty()) {
            self.base_url = url;
        }
        if let Some(flag) = var("BRIEFCHECK_HEADLESS") {
            self.headless = !matches!(flag.to_lowercase().as_str(), "0" | "false" | "no");
        }
        if let Some(dir) = var("BRIEFCHECK_EVIDENCE_DIR").filter(|v| !v.is_empty()) {
            self.evidence_dir = PathBuf::from(dir);
        }
        if let Some(path) = var("CHROMIUM_PATH").filter(|v| !v.is_empty()) {
            self.chromium_path = Some(path);
        }
        self
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> HarnessResult<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(HarnessError::config(format!(
                "base_url must be http(s), got {:?}",
                self.base_url
            )));
        }
        if self.concurrency == 0 {
            return Err(HarnessError::config("concurrency must be at least 1"));
        }
        if self.timeouts.poll_interval_ms == 0 {
            return Err(HarnessError::config("timeouts.poll_interval_ms must be positive"));
        }
        Ok(())
    }

    /// Session options every scenario starts from
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            headless: self.headless,
            viewport: self.viewport,
            color_scheme: self.color_scheme,
            base_url: Some(self.base_url.clone()),
            chromium_path: self.chromium_path.clone(),
            sandbox: self.sandbox,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::locator::TextMatch;

    #[test]
    fn test_empty_yaml_is_default() {
        let config = HarnessConfig::from_yaml("{}").unwrap();
        assert_eq!(config, HarnessConfig::default());
        assert_eq!(config.timeouts.bound(LatencyClass::Ui), Duration::from_secs(5));
        assert_eq!(config.timeouts.bound(LatencyClass::Auth), Duration::from_secs(10));
        assert_eq!(config.timeouts.bound(LatencyClass::AiRevision), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = "base_url: http://staging.test
color_scheme: dark
viewport:
  width: 375
  height: 667
timeouts:
  ai_revision_ms: 20000
";
        let config = HarnessConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.base_url, "http://staging.test");
        assert_eq!(config.color_scheme, Some(ColorScheme::Dark));
        assert_eq!(config.viewport, Some(Viewport::mobile()));
        assert_eq!(config.timeouts.ai_revision_ms, 20_000);
        assert_eq!(config.timeouts.ui_ms, 5_000);
    }

    #[test]
    fn test_vocabulary_override_yaml() {
        let yaml = "vocabulary:
  next:
    by: role
    role: button
    name:
      kind: exact
      value: Next
";
        let config = HarnessConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.vocabulary.get(&Control::Next),
            Some(&Selector::role("button", TextMatch::exact("Next")))
        );
    }

    #[test]
    fn test_validation() {
        assert!(HarnessConfig::from_yaml("base_url: localhost:5173").is_err());
        assert!(HarnessConfig::from_yaml("concurrency: 0").is_err());
        assert!(HarnessConfig::from_yaml("timeouts:\n  poll_interval_ms: 0").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("BRIEFCHECK_BASE_URL", "http://ci.test:8080"),
            ("BRIEFCHECK_HEADLESS", "false"),
            ("CHROMIUM_PATH", "/usr/bin/chromium"),
        ]
        .into_iter()
        .collect();
        let config = HarnessConfig::default()
            .with_overrides_from(|name| vars.get(name).map(|v| (*v).to_string()));
        assert_eq!(config.base_url, "http://ci.test:8080");
        assert!(!config.headless);
        assert_eq!(config.chromium_path.as_deref(), Some("/usr/bin/chromium"));
        assert_eq!(config.evidence_dir, PathBuf::from(DEFAULT_EVIDENCE_DIR));
    }

    #[test]
    fn test_session_options_carry_base_url() {
        let opts = HarnessConfig::default().session_options();
        assert_eq!(opts.base_url.as_deref(), Some(DEFAULT_BASE_URL));
        assert!(opts.headless);
    }

    #[test]
    fn test_yaml_roundtrip_keeps_overrides() {
        let mut config = HarnessConfig::default();
        config.vocabulary.insert(Control::Save, Selector::test_id("save"));
        let back = HarnessConfig::from_yaml(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
