//! Output formatting and progress reporting

use clap::ValueEnum;
use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;

use briefcheck::{Scenario, ScenarioReport, SuiteReport};

/// Output format for reports and listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON output
    Json,
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioListing {
    /// Scenario name
    pub name: String,
    /// One line description
    pub description: String,
}

impl ScenarioListing {
    /// Listing for a scenario
    #[must_use]
    pub fn of(scenario: &dyn Scenario) -> Self {
        Self {
            name: scenario.name().to_string(),
            description: scenario.description().to_string(),
        }
    }
}

/// Render the catalog listing
pub fn render_listing(
    listings: &[ScenarioListing],
    format: OutputFormat,
) -> serde_json::Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(listings),
        OutputFormat::Text => {
            let width = listings.iter().map(|l| l.name.len()).max().unwrap_or(0);
            let mut out = String::new();
            for listing in listings {
                let _ = writeln!(out, "{:width$}  {}", listing.name, listing.description);
            }
            Ok(out)
        }
    }
}

/// Render a suite as text: one block per scenario, then the summary line
#[must_use]
pub fn render_suite_text(suite: &SuiteReport, use_color: bool) -> String {
    let mut out = String::new();
    for scenario in &suite.scenarios {
        render_scenario_text(&mut out, scenario, use_color);
    }
    let _ = writeln!(out, "{}", suite.summary());
    out
}

fn render_scenario_text(out: &mut String, report: &ScenarioReport, use_color: bool) {
    let status = match (report.passed(), use_color) {
        (true, true) => style("PASS").green().bold().to_string(),
        (false, true) => style("FAIL").red().bold().to_string(),
        (true, false) => "PASS".to_string(),
        (false, false) => "FAIL".to_string(),
    };
    let _ = writeln!(
        out,
        "{status} {} ({})",
        report.name,
        format_duration(Duration::from_millis(report.duration_ms))
    );
    if let Some(error) = &report.error {
        let _ = writeln!(out, "     error: {error}");
    }
    if let Some(capture) = &report.capture_error {
        let _ = writeln!(out, "     capture: {capture}");
    }
    for diagnostic in &report.diagnostics {
        let _ = writeln!(out, "     note: {diagnostic}");
    }
    if let Some(release) = &report.release_error {
        let _ = writeln!(out, "     release: {release}");
    }
    for evidence in &report.evidence {
        let _ = writeln!(out, "     evidence: {}", evidence.path.display());
    }
}

/// Human duration, e.g. `850ms`, `12.3s`
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    if duration < Duration::from_secs(1) {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

/// Progress reporter for scenario execution
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Start a progress bar over `total` scenarios
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Increment progress
    pub fn increment(&self, delta: u64) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(delta);
        }
    }

    /// Update progress message
    pub fn set_message(&self, message: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(message.to_string());
        }
    }

    /// Clear the progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_and_clear();
        }
    }

    /// Report one finished scenario
    pub fn scenario_finished(&self, report: &ScenarioReport) {
        let line = format!(
            "{} ({})",
            report.name,
            format_duration(Duration::from_millis(report.duration_ms))
        );
        if report.passed() {
            self.success(&line);
        } else {
            self.failure(&format!(
                "{line}: {}",
                report.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };

        self.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };

        self.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };

        self.write_line(&format!("{prefix} {message}"));
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }

        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };

        self.write_line(&styled);
    }

    /// Print the run summary
    pub fn summary(&self, passed: usize, failed: usize, duration: Duration) {
        if self.quiet && failed == 0 {
            return;
        }

        let total = passed + failed;
        let elapsed = format_duration(duration);
        let line = if self.use_color {
            let status = if failed > 0 {
                Style::new().red().bold().apply_to("FAILED")
            } else {
                Style::new().green().bold().apply_to("PASSED")
            };
            format!("{status} {total} scenarios in {elapsed} ({passed} passed, {failed} failed)")
        } else {
            let status = if failed > 0 { "FAILED" } else { "PASSED" };
            format!("{status} {total} scenarios in {elapsed} ({passed} passed, {failed} failed)")
        };
        self.write_line(&line);
    }

    fn write_line(&self, line: &str) {
        match &self.progress_bar {
            Some(pb) if !pb.is_finished() => pb.println(line),
            _ => {
                let _ = self.term.write_line(line);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use briefcheck::HarnessError;

    fn passed(name: &str, ms: u64) -> ScenarioReport {
        ScenarioReport::new(name).with_duration(Duration::from_millis(ms))
    }

    fn failed(name: &str) -> ScenarioReport {
        let mut report = passed(name, 1500);
        report.fail(&HarnessError::assertion("export button missing"));
        report.diagnostics.push("Route mock **/api/user/settings was never hit".to_string());
        report
    }

    mod format_tests {
        use super::*;

        #[test]
        fn test_default_format() {
            assert_eq!(OutputFormat::default(), OutputFormat::Text);
        }

        #[test]
        fn test_format_duration() {
            assert_eq!(format_duration(Duration::from_millis(850)), "850ms");
            assert_eq!(format_duration(Duration::from_millis(12_340)), "12.3s");
        }

        #[test]
        fn test_listing_text_aligns_names() {
            let listings = vec![
                ScenarioListing {
                    name: "a".to_string(),
                    description: "first".to_string(),
                },
                ScenarioListing {
                    name: "longer".to_string(),
                    description: "second".to_string(),
                },
            ];
            let text = render_listing(&listings, OutputFormat::Text).unwrap();
            assert_eq!(text, "a       first\nlonger  second\n");
        }

        #[test]
        fn test_listing_json() {
            let listings = vec![ScenarioListing::of(&briefcheck::scenarios::IdentityBypass)];
            let json = render_listing(&listings, OutputFormat::Json).unwrap();
            let parsed: Vec<ScenarioListing> = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed[0].name, "identity-bypass");
        }

        #[test]
        fn test_suite_text() {
            let suite = SuiteReport::new(
                "briefcheck",
                vec![passed("settings-panel", 900), failed("briefing-export")],
            );
            let text = render_suite_text(&suite, false);
            assert!(text.contains("PASS settings-panel (900ms)"));
            assert!(text.contains("FAIL briefing-export (1.5s)"));
            assert!(text.contains("error: Assertion failed: export button missing"));
            assert!(text.contains("note: Route mock **/api/user/settings was never hit"));
            assert!(text.ends_with("briefcheck: 1/2 passed in 2.4s\n"));
        }
    }

    mod progress_reporter_tests {
        use super::*;

        #[test]
        fn test_new_reporter() {
            let reporter = ProgressReporter::new(true, false);
            assert!(reporter.use_color);
            assert!(!reporter.quiet);
        }

        #[test]
        fn test_progress_lifecycle() {
            let mut reporter = ProgressReporter::new(false, false);
            reporter.start_progress(2, "Starting...");
            reporter.set_message("settings-panel");
            reporter.scenario_finished(&passed("settings-panel", 10));
            reporter.increment(1);
            reporter.scenario_finished(&failed("briefing-export"));
            reporter.increment(1);
            reporter.finish();
            reporter.summary(1, 1, Duration::from_secs(2));
        }

        #[test]
        fn test_quiet_mode_has_no_progress_bar() {
            let mut reporter = ProgressReporter::new(false, true);
            reporter.start_progress(10, "Running");
            assert!(reporter.progress_bar.is_none());
            reporter.success("hidden");
            reporter.warning("hidden");
            reporter.header("hidden");
            reporter.failure("shown");
        }
    }
}
