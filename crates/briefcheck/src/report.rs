//! Scenario and suite reports.
//!
//! Reports serialize to JSON for machines and render as a one-line summary
//! or JUnit XML for CI dashboards.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::evidence::Evidence;
use crate::navigator::StepRecord;
use crate::result::{ErrorKind, HarnessError, HarnessResult};

/// Scenario outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Body completed and every expected route was hit
    Passed,
    /// Anything else
    Failed,
}

impl Outcome {
    /// Check if passing
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Result of one scenario run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// Session used, absent when acquisition failed
    pub session_id: Option<String>,
    /// Pass or fail
    pub outcome: Outcome,
    /// Classification of the failure
    pub error_kind: Option<ErrorKind>,
    /// Failure message
    pub error: Option<String>,
    /// Failure evidence could not be taken
    pub capture_error: Option<String>,
    /// Secondary findings, e.g. route mocks that were never hit
    pub diagnostics: Vec<String>,
    /// Evidence written
    pub evidence: Vec<Evidence>,
    /// Steps entered
    pub steps: Vec<StepRecord>,
    /// Wall time
    pub duration_ms: u64,
    /// Session teardown failed
    pub release_error: Option<String>,
}

impl ScenarioReport {
    /// Empty passing report
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            session_id: None,
            outcome: Outcome::Passed,
            error_kind: None,
            error: None,
            capture_error: None,
            diagnostics: Vec::new(),
            evidence: Vec::new(),
            steps: Vec::new(),
            duration_ms: 0,
            release_error: None,
        }
    }

    /// Mark failed with `error`
    pub fn fail(&mut self, error: &HarnessError) {
        self.outcome = Outcome::Failed;
        self.error_kind = Some(error.kind());
        self.error = Some(error.to_string());
    }

    /// Set duration
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    /// Check if passed
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.outcome.is_passed()
    }
}

/// Reports of one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Suite name
    pub name: String,
    /// Scenario reports in catalog order
    pub scenarios: Vec<ScenarioReport>,
}

impl SuiteReport {
    /// Suite from reports
    #[must_use]
    pub fn new(name: impl Into<String>, scenarios: Vec<ScenarioReport>) -> Self {
        Self {
            name: name.into(),
            scenarios,
        }
    }

    /// Number passed
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.scenarios.iter().filter(|s| s.passed()).count()
    }

    /// Number failed
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.scenarios.len() - self.passed_count()
    }

    /// Check if every scenario passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.scenarios.iter().all(ScenarioReport::passed)
    }

    /// Sum of scenario durations
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        Duration::from_millis(self.scenarios.iter().map(|s| s.duration_ms).sum())
    }

    /// Failed scenarios
    #[must_use]
    pub fn failures(&self) -> Vec<&ScenarioReport> {
        self.scenarios.iter().filter(|s| !s.passed()).collect()
    }

    /// One line summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: {}/{} passed in {:.1}s",
            self.name,
            self.passed_count(),
            self.scenarios.len(),
            self.total_duration().as_secs_f64()
        )
    }

    /// Pretty JSON
    pub fn to_json(&self) -> HarnessResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render JUnit XML content
    #[must_use]
    pub fn render_junit(&self) -> String {
        let mut xml = String::new();
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<testsuite name="{}" tests="{}" failures="{}" time="{:.3}">"#,
            escape_xml(&self.name),
            self.scenarios.len(),
            self.failed_count(),
            self.total_duration().as_secs_f64()
        ));
        xml.push('\n');

        for scenario in &self.scenarios {
            xml.push_str(&format!(
                r#"  <testcase name="{}" time="{:.3}">"#,
                escape_xml(&scenario.name),
                scenario.duration_ms as f64 / 1000.0
            ));
            xml.push('\n');
            if let Some(error) = &scenario.error {
                let kind = scenario
                    .error_kind
                    .map(|k| format!("{k:?}"))
                    .unwrap_or_default();
                let mut body = error.clone();
                for extra in scenario.capture_error.iter().chain(&scenario.diagnostics) {
                    body.push('\n');
                    body.push_str(extra);
                }
                xml.push_str(&format!(
                    r#"    <failure type="{}" message="{}">{}</failure>"#,
                    kind,
                    escape_xml(error),
                    escape_xml(&body)
                ));
                xml.push('\n');
            }
            xml.push_str("  </testcase>\n");
        }

        xml.push_str("</testsuite>\n");
        xml
    }

    /// Write JUnit XML
    pub fn write_junit(&self, path: &Path) -> HarnessResult<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, self.render_junit())?;
        Ok(())
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn failed(name: &str) -> ScenarioReport {
        let mut report = ScenarioReport::new(name).with_duration(Duration::from_millis(1500));
        report.fail(&HarnessError::Timeout {
            condition: "role=heading[name~\"Briefing Revisado\"] to be visible".into(),
            ms: 60_000,
            last_observation: "no match".into(),
        });
        report.capture_error = Some("Evidence capture 'final' failed: target closed".into());
        report
    }

    #[test]
    fn test_counts_and_summary() {
        let suite = SuiteReport::new(
            "briefcheck",
            vec![
                ScenarioReport::new("identity-bypass").with_duration(Duration::from_millis(500)),
                failed("briefing-wizard-text"),
            ],
        );
        assert_eq!(suite.passed_count(), 1);
        assert_eq!(suite.failed_count(), 1);
        assert!(!suite.all_passed());
        assert_eq!(suite.summary(), "briefcheck: 1/2 passed in 2.0s");
        assert_eq!(suite.failures()[0].name, "briefing-wizard-text");
    }

    #[test]
    fn test_junit_escapes_and_reports_both_failures() {
        let xml = SuiteReport::new("suite", vec![failed("wizard")]).render_junit();
        assert!(xml.contains(r#"<testsuite name="suite" tests="1" failures="1""#));
        assert!(xml.contains(r#"type="Timeout""#));
        assert!(xml.contains("name~&quot;Briefing Revisado&quot;"));
        assert!(xml.contains("target closed"));
    }

    #[test]
    fn test_json_shape() {
        let rendered = SuiteReport::new("s", vec![failed("w")]).to_json().unwrap();
        let json: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(json["scenarios"][0]["outcome"], "failed");
        assert_eq!(json["scenarios"][0]["error_kind"], "timeout");
    }

    #[test]
    fn test_write_junit_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/junit.xml");
        SuiteReport::new("s", vec![ScenarioReport::new("a")]).write_junit(&path).unwrap();
        assert!(std::fs::read_to_string(path).unwrap().contains("testcase name=\"a\""));
    }
}
