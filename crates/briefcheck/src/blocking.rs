//! Blocking adapter for callers without an async runtime.
//!
//! This is the only place the harness blocks; everything it wraps is async.
//! Do not call it from inside a Tokio runtime.

use std::sync::Arc;

use crate::report::ScenarioReport;
use crate::result::HarnessResult;
use crate::scenario::{Scenario, ScenarioRunner};

/// A [`ScenarioRunner`] with its own multi-threaded runtime
#[derive(Debug)]
pub struct BlockingRunner {
    runtime: tokio::runtime::Runtime,
    runner: ScenarioRunner,
}

impl BlockingRunner {
    /// Build the runtime and wrap `runner`
    pub fn new(runner: ScenarioRunner) -> HarnessResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("briefcheck")
            .build()?;
        Ok(Self { runtime, runner })
    }

    /// The wrapped runner
    #[must_use]
    pub const fn runner(&self) -> &ScenarioRunner {
        &self.runner
    }

    /// Run one scenario to completion
    pub fn run(&self, scenario: &dyn Scenario) -> ScenarioReport {
        self.runtime.block_on(self.runner.run(scenario))
    }

    /// Run scenarios with bounded concurrency
    pub fn run_all(
        &self,
        scenarios: &[Arc<dyn Scenario>],
        concurrency: usize,
    ) -> Vec<ScenarioReport> {
        self.runtime
            .block_on(self.runner.run_all(scenarios, concurrency))
    }

    /// Run scenarios with bounded concurrency, calling `on_finished` as each completes
    pub fn run_all_with(
        &self,
        scenarios: &[Arc<dyn Scenario>],
        concurrency: usize,
        on_finished: impl FnMut(&ScenarioReport),
    ) -> Vec<ScenarioReport> {
        self.runtime
            .block_on(self.runner.run_all_with(scenarios, concurrency, on_finished))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockLauncher};
    use crate::scenario::ScenarioContext;
    use async_trait::async_trait;

    struct Blank;

    #[async_trait]
    impl Scenario for Blank {
        fn name(&self) -> &str {
            "blank"
        }
        fn description(&self) -> &str {
            "opens about:blank"
        }
        async fn run(&self, ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
            ctx.goto("about:blank").await
        }
    }

    #[test]
    fn test_blocking_run_from_sync_code() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = Arc::new(MockLauncher::new(MockDriver::new));
        let blocking =
            BlockingRunner::new(ScenarioRunner::new(launcher.clone(), dir.path())).unwrap();
        let report = blocking.run(&Blank);
        assert!(report.passed());
        let reports = blocking.run_all(&[Arc::new(Blank) as Arc<dyn Scenario>, Arc::new(Blank)], 2);
        assert_eq!(reports.len(), 2);
        assert_eq!(blocking.runner().manager().released_sessions(), 3);
        assert!(launcher.launched()[0].1.was_called("navigate:about:blank"));
    }
}
