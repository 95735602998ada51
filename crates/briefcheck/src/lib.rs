//! Briefcheck: end-to-end verification harness for multi-step briefing wizards
//!
//! Drives a web application's briefing wizard through a browser over CDP,
//! gating every action on an observed UI or network state and capturing
//! screenshots as evidence.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  BRIEFCHECK Architecture                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Scenario   │    │ Session    │    │ Chromium   │            │
//! │   │ Runner     │───►│ Manager    │───►│ (CDP) or   │            │
//! │   │            │    │            │    │ MockDriver │            │
//! │   └─────┬──────┘    └─────┬──────┘    └────────────┘            │
//! │         │                 │                                      │
//! │   ┌─────▼──────┐    ┌─────▼──────┐    ┌────────────┐            │
//! │   │ Navigator  │    │ Routes /   │    │ Evidence   │            │
//! │   │ + Waits    │    │ Identity   │    │ Store      │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use briefcheck::{mock::{MockDriver, MockLauncher}, scenarios, ScenarioRunner};
//!
//! # async fn demo() {
//! let launcher = Arc::new(MockLauncher::new(MockDriver::new));
//! let runner = ScenarioRunner::new(launcher, "target/evidence");
//! let reports = runner.run_all(&scenarios::all(), 2).await;
//! assert_eq!(reports.len(), scenarios::names().len());
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

mod blocking;
#[cfg(feature = "browser")]
mod browser;
mod config;
mod driver;
mod evidence;
mod identity;
mod locator;
mod navigator;
mod network;
mod report;
mod result;
mod scenario;
mod session;
mod vocabulary;
mod wait;

/// Scriptable in-memory page standing in for a browser.
///
/// Used by the crate's own tests and by anyone testing scenarios offline.
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod mock;

/// The scenario catalog
pub mod scenarios;

pub use blocking::BlockingRunner;
#[cfg(feature = "browser")]
pub use browser::{ChromiumDriver, ChromiumLauncher};
pub use config::{HarnessConfig, TimeoutPolicy, DEFAULT_BASE_URL, DEFAULT_EVIDENCE_DIR};
pub use driver::{BrowserCookie, ElementSnapshot, HarnessDriver, ScreenshotTarget};
pub use evidence::{slugify, CaptureTarget, Evidence, EvidenceKind, EvidenceStore};
pub use identity::{
    seed_identity, AuthCookie, AuthFixture, InjectedIdentity, TokenBundle, AUTH_COOKIE_NAME,
    AUTH_TOKEN_ENV, IDENTITY_STORAGE_KEY,
};
pub use locator::{Locator, Probe, Resolved, Scope, Selector, TextMatch};
pub use navigator::{Step, StepRecord, StepTracker, WizardNavigator};
pub use network::{
    HttpMethod, InterceptedRequest, MockResponse, Responder, RouteMock, RouteTable,
    SharedRouteTable, UrlPattern,
};
pub use report::{Outcome, ScenarioReport, SuiteReport};
pub use result::{ErrorKind, HarnessError, HarnessResult};
pub use scenario::{Scenario, ScenarioContext, ScenarioRunner, FAILURE_CHECKPOINT};
pub use session::{ColorScheme, Session, SessionLauncher, SessionManager, SessionOptions, Viewport};
pub use vocabulary::{Control, Vocabulary};
pub use wait::{
    unconditioned_wait, wait_for, LatencyClass, WaitCondition, WaitOptions, WaitOutcome,
};
