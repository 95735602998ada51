//! Suite runner: selection, progress and the suite report

use std::sync::Arc;
use std::time::Instant;

use briefcheck::{
    scenarios, BlockingRunner, HarnessConfig, Scenario, ScenarioRunner, SessionLauncher,
    SuiteReport,
};

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;

/// Suite name used in reports
pub const SUITE_NAME: &str = "briefcheck";

/// Resolve names against the catalog; empty means everything
///
/// Keeps catalog order and drops duplicates. Every unknown name is reported
/// at once.
pub fn select(names: &[String]) -> CliResult<Vec<Arc<dyn Scenario>>> {
    let catalog = scenarios::all();
    if names.is_empty() {
        return Ok(catalog);
    }

    let unknown: Vec<&str> = names
        .iter()
        .map(String::as_str)
        .filter(|name| !catalog.iter().any(|s| s.name() == *name))
        .collect();
    if !unknown.is_empty() {
        return Err(CliError::invalid_argument(format!(
            "unknown scenario(s) {}; known: {}",
            unknown.join(", "),
            scenarios::names().join(", ")
        )));
    }

    Ok(catalog
        .into_iter()
        .filter(|s| names.iter().any(|n| n == s.name()))
        .collect())
}

/// Runs a selection of scenarios with progress output
#[derive(Debug)]
pub struct SuiteRunner {
    runner: BlockingRunner,
    reporter: ProgressReporter,
    concurrency: usize,
}

impl SuiteRunner {
    /// Runner over `launcher`, configured from `harness`
    pub fn new(
        config: &CliConfig,
        harness: &HarnessConfig,
        launcher: Arc<dyn SessionLauncher>,
    ) -> CliResult<Self> {
        let runner = BlockingRunner::new(ScenarioRunner::from_config(harness, launcher))?;
        let reporter =
            ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
        Ok(Self {
            runner,
            reporter,
            concurrency: harness.concurrency.max(1),
        })
    }

    /// Run `selection`, `concurrency` at a time; the report keeps catalog order
    pub fn run(&mut self, selection: &[Arc<dyn Scenario>]) -> SuiteReport {
        let started = Instant::now();
        self.reporter.header("Running scenarios");
        self.reporter
            .start_progress(selection.len() as u64, "Starting...");

        let reporter = &self.reporter;
        let reports = self
            .runner
            .run_all_with(selection, self.concurrency, |report| {
                reporter.scenario_finished(report);
                reporter.set_message(&report.name);
                reporter.increment(1);
            });
        self.reporter.finish();

        let suite = SuiteReport::new(SUITE_NAME, reports);
        self.reporter
            .summary(suite.passed_count(), suite.failed_count(), started.elapsed());
        suite
    }
}
