//! Scenario runner.
//!
//! A [`Scenario`] is an async body run against a fresh [`Session`] through a
//! [`ScenarioContext`]. The [`ScenarioRunner`] owns the lifecycle around it:
//!
//! 1. acquire a session with the scenario's options
//! 2. run the body, catching panics
//! 3. turn unmet route expectations into a failure or a diagnostic
//! 4. on failure, take best-effort failure evidence
//! 5. release the session, on every path, exactly once
//!
//! Nothing is retried.

use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, info_span, warn, Instrument};

use crate::config::{HarnessConfig, TimeoutPolicy};
use crate::evidence::{CaptureTarget, Evidence, EvidenceKind, EvidenceStore};
use crate::identity::{seed_identity, InjectedIdentity};
use crate::locator::Locator;
use crate::navigator::{Step, StepTracker, WizardNavigator};
use crate::network::{RouteMock, UrlPattern};
use crate::report::ScenarioReport;
use crate::result::{HarnessError, HarnessResult};
use crate::session::{Session, SessionLauncher, SessionManager, SessionOptions};
use crate::vocabulary::{Control, Vocabulary};
use crate::wait::{
    unconditioned_wait, wait_for, LatencyClass, WaitCondition, WaitOptions, WaitOutcome,
};

/// Name of the evidence the runner takes when a scenario fails
pub const FAILURE_CHECKPOINT: &str = "final";

/// An end-to-end scenario
#[async_trait]
pub trait Scenario: Send + Sync {
    /// Stable name, used for selection and evidence paths
    fn name(&self) -> &str;

    /// One line description
    fn description(&self) -> &str;

    /// Adjust the session options the runner starts from
    fn session_options(&self, base: SessionOptions) -> SessionOptions {
        base
    }

    /// Scenario body
    async fn run(&self, ctx: &mut ScenarioContext<'_>) -> HarnessResult<()>;
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Everything a scenario body may touch
#[derive(Debug)]
pub struct ScenarioContext<'a> {
    scenario: String,
    session: &'a Session,
    vocabulary: &'a Vocabulary,
    timeouts: &'a TimeoutPolicy,
    evidence: &'a EvidenceStore,
    steps: StepTracker,
    captured: Vec<Evidence>,
}

impl<'a> ScenarioContext<'a> {
    /// Context for one run of `scenario` on `session`
    #[must_use]
    pub fn new(
        scenario: &str,
        session: &'a Session,
        vocabulary: &'a Vocabulary,
        timeouts: &'a TimeoutPolicy,
        evidence: &'a EvidenceStore,
    ) -> Self {
        Self {
            scenario: scenario.to_string(),
            session,
            vocabulary,
            timeouts,
            evidence,
            steps: StepTracker::new(),
            captured: Vec::new(),
        }
    }

    /// The session
    #[must_use]
    pub const fn session(&self) -> &'a Session {
        self.session
    }

    /// Timeout policy in force
    #[must_use]
    pub const fn timeouts(&self) -> &TimeoutPolicy {
        self.timeouts
    }

    /// Navigator over the session
    #[must_use]
    pub const fn nav(&self) -> WizardNavigator<'a> {
        WizardNavigator::new(self.session, self.vocabulary)
    }

    /// Strict locator for a control
    pub fn control(&self, control: Control) -> HarnessResult<Locator> {
        self.vocabulary.locator(control)
    }

    /// Steps entered so far
    #[must_use]
    pub const fn steps(&self) -> &StepTracker {
        &self.steps
    }

    /// Evidence taken so far
    #[must_use]
    pub fn evidence(&self) -> &[Evidence] {
        &self.captured
    }

    // -------------------------------------------------------------------------
    // Waiting
    // -------------------------------------------------------------------------

    /// Wait for a condition bounded by a latency class
    pub async fn wait(
        &self,
        condition: WaitCondition,
        class: LatencyClass,
    ) -> HarnessResult<WaitOutcome> {
        wait_for(
            self.session.driver(),
            &condition,
            WaitOptions::for_class(self.timeouts, class),
        )
        .await
    }

    /// Wait until the element is visible
    pub async fn expect_visible(
        &self,
        locator: &Locator,
        class: LatencyClass,
    ) -> HarnessResult<()> {
        self.wait(WaitCondition::visible(locator.clone()), class).await.map(drop)
    }

    /// Wait until the element is visible and enabled
    pub async fn expect_enabled(
        &self,
        locator: &Locator,
        class: LatencyClass,
    ) -> HarnessResult<()> {
        self.wait(WaitCondition::enabled(locator.clone()), class).await.map(drop)
    }

    /// Wait until the element is gone or not rendered
    pub async fn expect_hidden(&self, locator: &Locator, class: LatencyClass) -> HarnessResult<()> {
        self.wait(WaitCondition::hidden(locator.clone()), class).await.map(drop)
    }

    /// Wait until the URL matches
    pub async fn expect_url(&self, pattern: UrlPattern, class: LatencyClass) -> HarnessResult<()> {
        self.wait(WaitCondition::url(pattern), class).await.map(drop)
    }

    /// Wait for network quiescence per the policy
    pub async fn network_idle(&self, class: LatencyClass) -> HarnessResult<()> {
        self.wait(WaitCondition::network_idle(self.timeouts), class)
            .await
            .map(drop)
    }

    /// Wait for a control to be visible and return its locator
    pub async fn visible(&self, control: Control, class: LatencyClass) -> HarnessResult<Locator> {
        let locator = self.control(control)?;
        self.expect_visible(&locator, class).await?;
        Ok(locator)
    }

    /// Wait for the element to be enabled, then click it
    pub async fn click_when_enabled(
        &self,
        locator: &Locator,
        class: LatencyClass,
    ) -> HarnessResult<()> {
        self.expect_enabled(locator, class).await?;
        self.nav().click(locator).await
    }

    /// Wait for a control to be enabled, then click it
    pub async fn click_control(&self, control: Control, class: LatencyClass) -> HarnessResult<()> {
        self.click_when_enabled(&self.control(control)?, class).await
    }

    /// Wait for a control to be enabled, then fill it
    pub async fn fill_control(
        &self,
        control: Control,
        text: &str,
        class: LatencyClass,
    ) -> HarnessResult<()> {
        let locator = self.control(control)?;
        self.expect_enabled(&locator, class).await?;
        self.nav().fill(&locator, text).await
    }

    /// Wait for a step's marker, then record the step
    pub async fn enter_step(&mut self, step: Step, class: LatencyClass) -> HarnessResult<()> {
        let marker = self.control(step.marker())?;
        self.expect_visible(&marker, class).await?;
        self.steps.enter(step);
        info!(step = %step, "step entered");
        Ok(())
    }

    /// Sleep with no observable signal; see [`unconditioned_wait`]
    pub async fn unconditioned_wait(&self, duration: Duration, justification: &str) {
        unconditioned_wait(duration, justification).await;
    }

    // -------------------------------------------------------------------------
    // Session setup
    // -------------------------------------------------------------------------

    /// Register a route mock on the session
    pub async fn mock(&self, route: RouteMock) -> HarnessResult<()> {
        self.session.mock(route).await
    }

    /// Seed a client-side identity; takes effect on the next navigation
    pub async fn seed_identity(&self, identity: &InjectedIdentity) -> HarnessResult<()> {
        seed_identity(self.session, identity).await
    }

    /// Navigate to a path or URL
    pub async fn goto(&self, target: &str) -> HarnessResult<()> {
        self.session.goto(target).await
    }

    /// Reload the page
    pub async fn reload(&self) -> HarnessResult<()> {
        self.session.reload().await
    }

    // -------------------------------------------------------------------------
    // Evidence
    // -------------------------------------------------------------------------

    /// Full page checkpoint
    pub async fn checkpoint(&mut self, name: &str) -> HarnessResult<()> {
        self.capture(name, CaptureTarget::FullPage).await
    }

    /// Element checkpoint
    pub async fn checkpoint_element(&mut self, name: &str, locator: Locator) -> HarnessResult<()> {
        self.capture(name, CaptureTarget::Element(locator)).await
    }

    async fn capture(&mut self, name: &str, target: CaptureTarget) -> HarnessResult<()> {
        let evidence = self
            .evidence
            .capture(self.session, &self.scenario, name, &target, EvidenceKind::Checkpoint)
            .await?;
        self.captured.push(evidence);
        Ok(())
    }

    async fn capture_failure(&mut self) -> HarnessResult<()> {
        let evidence = self
            .evidence
            .capture(
                self.session,
                &self.scenario,
                FAILURE_CHECKPOINT,
                &CaptureTarget::FullPage,
                EvidenceKind::Failure,
            )
            .await?;
        self.captured.push(evidence);
        Ok(())
    }
}

// =============================================================================
// RUNNER
// =============================================================================

/// Runs scenarios, each on its own session
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    manager: Arc<SessionManager>,
    evidence: Arc<EvidenceStore>,
    vocabulary: Arc<Vocabulary>,
    base_options: SessionOptions,
    timeouts: TimeoutPolicy,
}

impl ScenarioRunner {
    /// Runner with default vocabulary, options and timeouts
    #[must_use]
    pub fn new(launcher: Arc<dyn SessionLauncher>, evidence_dir: impl Into<PathBuf>) -> Self {
        Self {
            manager: Arc::new(SessionManager::new(launcher)),
            evidence: Arc::new(EvidenceStore::new(evidence_dir)),
            vocabulary: Arc::new(Vocabulary::default()),
            base_options: SessionOptions::default(),
            timeouts: TimeoutPolicy::default(),
        }
    }

    /// Runner configured from a [`HarnessConfig`]
    #[must_use]
    pub fn from_config(config: &HarnessConfig, launcher: Arc<dyn SessionLauncher>) -> Self {
        Self::new(launcher, config.evidence_dir.clone())
            .with_vocabulary(Vocabulary::pt_br().with_overrides(&config.vocabulary))
            .with_base_options(config.session_options())
            .with_timeouts(config.timeouts)
    }

    /// Set vocabulary
    #[must_use]
    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = Arc::new(vocabulary);
        self
    }

    /// Set the options every scenario starts from
    #[must_use]
    pub fn with_base_options(mut self, options: SessionOptions) -> Self {
        self.base_options = options;
        self
    }

    /// Set timeouts
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: TimeoutPolicy) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Session manager
    #[must_use]
    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    /// Evidence store
    #[must_use]
    pub fn evidence(&self) -> &EvidenceStore {
        &self.evidence
    }

    /// Run one scenario to a report; never panics, always releases
    pub async fn run(&self, scenario: &dyn Scenario) -> ScenarioReport {
        let started = Instant::now();
        let mut report = ScenarioReport::new(scenario.name());
        self.evidence.begin_run(scenario.name());
        let options = scenario.session_options(self.base_options.clone());
        let session = match self.manager.acquire(options).await {
            Ok(session) => session,
            Err(e) => {
                warn!(scenario = scenario.name(), error = %e, "session acquisition failed");
                report.fail(&e);
                return report.with_duration(started.elapsed());
            }
        };
        report.session_id = Some(session.id().to_string());

        let span = info_span!("scenario", name = scenario.name(), session = session.id());
        self.drive(scenario, &session, &mut report)
            .instrument(span.clone())
            .await;
        if let Err(e) = self.manager.release(session).instrument(span).await {
            report.release_error = Some(e.to_string());
        }
        report.with_duration(started.elapsed())
    }

    async fn drive(&self, scenario: &dyn Scenario, session: &Session, report: &mut ScenarioReport) {
        let mut ctx = ScenarioContext::new(
            scenario.name(),
            session,
            &self.vocabulary,
            &self.timeouts,
            &self.evidence,
        );
        info!(description = scenario.description(), "scenario started");

        let mut result = AssertUnwindSafe(scenario.run(&mut ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(HarnessError::Panicked {
                    message: panic_message(payload.as_ref()),
                })
            });

        let mut unmet = session.unmet_route_expectations();
        for miss in &unmet {
            warn!(miss = %miss, "expected route mock never hit");
            report.diagnostics.push(describe_miss(miss));
        }
        if result.is_ok() && !unmet.is_empty() {
            result = Err(unmet.remove(0));
        }

        match &result {
            Ok(()) => info!("scenario passed"),
            Err(e) => {
                warn!(kind = ?e.kind(), error = %e, "scenario failed");
                report.fail(e);
                if let Err(capture) = ctx.capture_failure().await {
                    report.capture_error = Some(capture.to_string());
                }
            }
        }
        report.steps = ctx.steps.records().to_vec();
        report.evidence = ctx.captured;
    }

    /// Run scenarios with at most `concurrency` at once; reports keep input order
    pub async fn run_all(
        &self,
        scenarios: &[Arc<dyn Scenario>],
        concurrency: usize,
    ) -> Vec<ScenarioReport> {
        self.run_all_with(scenarios, concurrency, |_| {}).await
    }

    /// [`run_all`](Self::run_all), calling `on_finished` as each scenario completes
    ///
    /// A slow scenario never holds back the ones queued behind it; only the
    /// returned reports are put back in input order.
    pub async fn run_all_with(
        &self,
        scenarios: &[Arc<dyn Scenario>],
        concurrency: usize,
        mut on_finished: impl FnMut(&ScenarioReport),
    ) -> Vec<ScenarioReport> {
        let runs = scenarios
            .iter()
            .enumerate()
            .map(|(index, scenario)| async move { (index, self.run(scenario.as_ref()).await) });
        let mut completed =
            std::pin::pin!(futures::stream::iter(runs).buffer_unordered(concurrency.max(1)));

        let mut reports = Vec::with_capacity(scenarios.len());
        while let Some((index, report)) = completed.next().await {
            on_finished(&report);
            reports.push((index, report));
        }
        reports.sort_by_key(|(index, _)| *index);
        reports.into_iter().map(|(_, report)| report).collect()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn describe_miss(miss: &HarnessError) -> String {
    match miss {
        HarnessError::MockMiss {
            pattern,
            near_misses,
        } if !near_misses.is_empty() => format!(
            "route mock {pattern} was never hit; similar requests reached the backend: {}",
            near_misses.join(", ")
        ),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::mock::{Effect, MockDriver, MockElement, MockLauncher, MockRequest};
    use crate::network::MockResponse;
    use crate::report::Outcome;
    use crate::result::ErrorKind;

    fn page() -> MockDriver {
        MockDriver::new()
            .with_element(MockElement::text("ok", "pronto"))
            .on_load(
                "/",
                vec![
                    MockRequest::get("/api/v2/user/settings").send(),
                    Effect::After(2, vec![Effect::Mount("ok".into())]),
                ],
            )
    }

    fn runner(launcher: MockLauncher, dir: &std::path::Path) -> ScenarioRunner {
        ScenarioRunner::new(Arc::new(launcher), dir)
            .with_base_options(SessionOptions::default().with_base_url("http://app.test"))
            .with_timeouts(TimeoutPolicy::uniform(200, 1))
    }

    struct Passing;

    #[async_trait]
    impl Scenario for Passing {
        fn name(&self) -> &str {
            "passing"
        }
        fn description(&self) -> &str {
            "waits for the page and takes a checkpoint"
        }
        async fn run(&self, ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
            ctx.goto("/").await?;
            ctx.expect_visible(&Locator::text("pronto"), LatencyClass::Ui).await?;
            ctx.checkpoint("home").await
        }
    }

    struct Panicking;

    #[async_trait]
    impl Scenario for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }
        fn description(&self) -> &str {
            "panics mid-body"
        }
        async fn run(&self, ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
            ctx.goto("/").await?;
            panic!("selector table corrupted");
        }
    }

    struct TimingOut;

    #[async_trait]
    impl Scenario for TimingOut {
        fn name(&self) -> &str {
            "timing-out"
        }
        fn description(&self) -> &str {
            "waits for something that never appears"
        }
        async fn run(&self, ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
            ctx.goto("/").await?;
            ctx.visible(Control::RevisedHeading, LatencyClass::AiRevision).await?;
            Ok(())
        }
    }

    struct ExpectsSettings {
        fail_body: bool,
    }

    #[async_trait]
    impl Scenario for ExpectsSettings {
        fn name(&self) -> &str {
            "expects-settings"
        }
        fn description(&self) -> &str {
            "mocks a route the page never calls"
        }
        async fn run(&self, ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
            let settings = UrlPattern::glob("**/api/user/settings");
            ctx.mock(RouteMock::new(settings, MockResponse::new()).expect_hit()).await?;
            ctx.goto("/").await?;
            ctx.network_idle(LatencyClass::PageLoad).await?;
            if self.fail_body {
                return Err(HarnessError::assertion("settings panel missing"));
            }
            Ok(())
        }
    }

    mod lifecycle_tests {
        use super::*;

        #[tokio::test]
        async fn test_pass_releases_once_and_keeps_evidence() {
            let dir = tempfile::tempdir().unwrap();
            let launcher = MockLauncher::new(page);
            let runner = runner(launcher, dir.path());
            let report = runner.run(&Passing).await;
            assert_eq!(report.outcome, Outcome::Passed, "{report:?}");
            assert_eq!(report.evidence.len(), 1);
            assert!(report.evidence[0].path.ends_with("passing/home.png"));
            assert_eq!(runner.manager().live_sessions(), 0);
            assert_eq!(runner.manager().released_sessions(), 1);
        }

        #[tokio::test]
        async fn test_rerun_on_same_runner_rewrites_evidence() {
            let dir = tempfile::tempdir().unwrap();
            let runner = runner(MockLauncher::new(page), dir.path());
            let first = runner.run(&Passing).await;
            let second = runner.run(&Passing).await;
            assert_eq!(first.outcome, Outcome::Passed, "{first:?}");
            assert_eq!(second.outcome, Outcome::Passed, "{second:?}");
            assert_eq!(second.evidence[0].path, first.evidence[0].path);
            assert_eq!(runner.manager().released_sessions(), 2);
        }

        #[tokio::test]
        async fn test_run_all_reports_completion_as_it_happens() {
            let dir = tempfile::tempdir().unwrap();
            let runner = runner(MockLauncher::new(page), dir.path());
            let selection: Vec<Arc<dyn Scenario>> = vec![Arc::new(TimingOut), Arc::new(Passing)];
            let mut finished = Vec::new();
            let reports = runner
                .run_all_with(&selection, 2, |report| finished.push(report.name.clone()))
                .await;
            assert_eq!(finished, vec!["passing", "timing-out"]);
            let order: Vec<&str> = reports.iter().map(|r| r.name.as_str()).collect();
            assert_eq!(order, vec!["timing-out", "passing"]);
        }

        #[tokio::test]
        async fn test_panic_is_reported_and_session_released() {
            let dir = tempfile::tempdir().unwrap();
            let launcher = Arc::new(MockLauncher::new(page));
            let runner = ScenarioRunner::new(launcher.clone(), dir.path());
            let report = runner.run(&Panicking).await;
            assert_eq!(report.error_kind, Some(ErrorKind::Panic));
            assert!(report.error.as_deref().unwrap().contains("selector table corrupted"));
            let (_, driver) = launcher.launched().remove(0);
            assert_eq!(driver.close_count(), 1);
            assert_eq!(runner.manager().live_sessions(), 0);
        }

        #[tokio::test]
        async fn test_timeout_takes_failure_evidence() {
            let dir = tempfile::tempdir().unwrap();
            let runner = runner(MockLauncher::new(page), dir.path());
            let report = runner.run(&TimingOut).await;
            assert_eq!(report.error_kind, Some(ErrorKind::Timeout));
            assert!(report.capture_error.is_none());
            assert!(report.evidence[0].path.ends_with("timing-out/final.failure.png"));
        }

        #[tokio::test]
        async fn test_capture_failure_does_not_mask_scenario_failure() {
            let dir = tempfile::tempdir().unwrap();
            let launcher = MockLauncher::new(|| {
                let driver = page();
                driver.set_fail_screenshots(true);
                driver
            });
            let runner = runner(launcher, dir.path());
            let report = runner.run(&TimingOut).await;
            assert_eq!(report.error_kind, Some(ErrorKind::Timeout));
            assert!(report.capture_error.as_deref().unwrap().contains("final"));
            assert_eq!(runner.manager().released_sessions(), 1);
        }

        #[tokio::test]
        async fn test_launch_failure_reports_without_session() {
            let dir = tempfile::tempdir().unwrap();
            let runner = runner(MockLauncher::failing("chromium not found"), dir.path());
            let report = runner.run(&Passing).await;
            assert_eq!(report.error_kind, Some(ErrorKind::Infrastructure));
            assert!(report.session_id.is_none());
            assert_eq!(runner.manager().released_sessions(), 0);
        }
    }

    mod mock_miss_tests {
        use super::*;

        #[tokio::test]
        async fn test_unhit_route_fails_passing_body() {
            let dir = tempfile::tempdir().unwrap();
            let runner = runner(MockLauncher::new(page), dir.path());
            let report = runner.run(&ExpectsSettings { fail_body: false }).await;
            assert_eq!(report.error_kind, Some(ErrorKind::MockMiss));
            assert!(report.diagnostics[0].contains("/api/v2/user/settings"));
        }

        #[tokio::test]
        async fn test_unhit_route_is_diagnostic_on_failed_body() {
            let dir = tempfile::tempdir().unwrap();
            let runner = runner(MockLauncher::new(page), dir.path());
            let report = runner.run(&ExpectsSettings { fail_body: true }).await;
            assert_eq!(report.error_kind, Some(ErrorKind::Assertion));
            assert_eq!(report.diagnostics.len(), 1);
            assert!(report.diagnostics[0].contains("* **/api/user/settings"));
        }
    }

    mod concurrency_tests {
        use super::*;

        #[tokio::test]
        async fn test_run_all_keeps_order_and_isolates_sessions() {
            let dir = tempfile::tempdir().unwrap();
            let launcher = Arc::new(MockLauncher::new(page));
            let runner = ScenarioRunner::new(launcher.clone(), dir.path())
                .with_timeouts(TimeoutPolicy::uniform(200, 1));
            let scenarios: Vec<Arc<dyn Scenario>> =
                vec![Arc::new(Passing), Arc::new(Panicking), Arc::new(TimingOut)];
            let reports = runner.run_all(&scenarios, 3).await;
            let names: Vec<&str> = reports.iter().map(|r| r.name.as_str()).collect();
            assert_eq!(names, vec!["passing", "panicking", "timing-out"]);
            assert!(reports[0].passed());
            let ids: std::collections::HashSet<_> =
                reports.iter().map(|r| r.session_id.clone()).collect();
            assert_eq!(ids.len(), 3);
            assert_eq!(runner.manager().live_sessions(), 0);
            assert!(launcher.launched().iter().all(|(_, d)| d.close_count() == 1));
        }
    }
}
