//! Synchronization engine.
//!
//! Every asynchronous effect of the application is observed through exactly
//! one [`WaitCondition`], evaluated by [`wait_for`] until it holds or its bound
//! expires. A condition that is "not yet" keeps polling; a driver failure or an
//! ambiguous locator ends the wait at once, so a broken scenario never burns
//! its whole timeout.
//!
//! Fixed sleeps are not a synchronization tool here. The one escape hatch,
//! [`unconditioned_wait`], demands a justification and logs a warning.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::TimeoutPolicy;
use crate::driver::HarnessDriver;
use crate::locator::{Locator, Probe, Scope};
use crate::network::UrlPattern;
use crate::result::{HarnessError, HarnessResult};

// =============================================================================
// LATENCY CLASSES
// =============================================================================

/// Kind of backend effect a wait is gated on; selects the bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyClass {
    /// Client-side transitions, dialogs, tabs
    Ui,
    /// Login, OTP and the redirects that follow
    Auth,
    /// Route and page loads
    PageLoad,
    /// AI-assisted text revision
    AiRevision,
}

impl fmt::Display for LatencyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ui => "ui",
            Self::Auth => "auth",
            Self::PageLoad => "page-load",
            Self::AiRevision => "ai-revision",
        })
    }
}

// =============================================================================
// CONDITIONS
// =============================================================================

/// A predicate over rendered or network state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    /// Addressed element attached with a non-empty, rendered box
    Visible(Locator),
    /// Addressed element visible and not disabled
    Enabled(Locator),
    /// Addressed element detached or not rendered
    Hidden(Locator),
    /// Current URL matches
    Url(UrlPattern),
    /// In-flight requests at or below `max_inflight` for `quiet_window`
    NetworkIdle {
        /// Requests tolerated
        max_inflight: usize,
        /// Debounce window
        quiet_window: Duration,
    },
}

impl WaitCondition {
    /// Visible condition
    #[must_use]
    pub fn visible(locator: impl Into<Locator>) -> Self {
        Self::Visible(locator.into())
    }

    /// Enabled condition
    #[must_use]
    pub fn enabled(locator: impl Into<Locator>) -> Self {
        Self::Enabled(locator.into())
    }

    /// Hidden condition
    #[must_use]
    pub fn hidden(locator: impl Into<Locator>) -> Self {
        Self::Hidden(locator.into())
    }

    /// URL condition
    #[must_use]
    pub const fn url(pattern: UrlPattern) -> Self {
        Self::Url(pattern)
    }

    /// Network idle with the policy's window and tolerance
    #[must_use]
    pub const fn network_idle(policy: &TimeoutPolicy) -> Self {
        Self::NetworkIdle {
            max_inflight: policy.network_idle_max_inflight,
            quiet_window: Duration::from_millis(policy.network_idle_window_ms),
        }
    }

    async fn evaluate(
        &self,
        driver: &dyn HarnessDriver,
        quiet_since: &mut Option<Instant>,
    ) -> HarnessResult<Readiness> {
        match self {
            Self::Visible(locator) => Ok(match probe_strict(locator, driver).await? {
                Some(element) if element.is_visible() => Readiness::Ready,
                Some(_) => Readiness::Pending("attached but not rendered".to_string()),
                None => Readiness::Pending("no match".to_string()),
            }),
            Self::Enabled(locator) => Ok(match probe_strict(locator, driver).await? {
                Some(element) if element.is_enabled() => Readiness::Ready,
                Some(element) if element.is_visible() => {
                    Readiness::Pending("visible but disabled".to_string())
                }
                Some(_) => Readiness::Pending("attached but not rendered".to_string()),
                None => Readiness::Pending("no match".to_string()),
            }),
            Self::Hidden(locator) => {
                let matches = driver.query_all(locator.selector()).await?;
                let still_visible = match locator.scope() {
                    Scope::Strict => matches.iter().filter(|e| e.is_visible()).count(),
                    Scope::First | Scope::Nth(_) => match locator.classify(matches) {
                        Probe::Found(resolved) if resolved.element.is_visible() => 1,
                        _ => 0,
                    },
                };
                Ok(if still_visible == 0 {
                    Readiness::Ready
                } else {
                    Readiness::Pending(format!("{still_visible} still visible"))
                })
            }
            Self::Url(pattern) => {
                let url = driver.current_url().await?;
                Ok(if pattern.matches(&url) {
                    Readiness::Ready
                } else {
                    Readiness::Pending(format!("url={url}"))
                })
            }
            Self::NetworkIdle {
                max_inflight,
                quiet_window,
            } => {
                let inflight = driver.inflight_requests().await?;
                if inflight > *max_inflight {
                    *quiet_since = None;
                    return Ok(Readiness::Pending(format!("{inflight} requests in flight")));
                }
                let since = *quiet_since.get_or_insert_with(Instant::now);
                Ok(if since.elapsed() >= *quiet_window {
                    Readiness::Ready
                } else {
                    Readiness::Pending(format!("quiet for {}ms", since.elapsed().as_millis()))
                })
            }
        }
    }
}

async fn probe_strict(
    locator: &Locator,
    driver: &dyn HarnessDriver,
) -> HarnessResult<Option<crate::driver::ElementSnapshot>> {
    match locator.probe(driver).await? {
        Probe::Found(resolved) => Ok(Some(resolved.element)),
        Probe::Missing => Ok(None),
        Probe::Ambiguous(found) => Err(HarnessError::Resolution {
            locator: locator.to_string(),
            found,
        }),
    }
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Visible(locator) => write!(f, "{locator} to be visible"),
            Self::Enabled(locator) => write!(f, "{locator} to be enabled"),
            Self::Hidden(locator) => write!(f, "{locator} to be hidden"),
            Self::Url(pattern) => write!(f, "url to match {pattern}"),
            Self::NetworkIdle {
                max_inflight,
                quiet_window,
            } => write!(
                f,
                "network idle (<= {max_inflight} in flight for {}ms)",
                quiet_window.as_millis()
            ),
        }
    }
}

/// Result of one evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
enum Readiness {
    Ready,
    Pending(String),
}

// =============================================================================
// WAITING
// =============================================================================

/// Bound and cadence of a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Give up after this long
    pub timeout: Duration,
    /// Pause between evaluations
    pub poll_interval: Duration,
}

impl WaitOptions {
    /// Create options
    #[must_use]
    pub const fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Options for a latency class under a policy
    #[must_use]
    pub const fn for_class(policy: &TimeoutPolicy, class: LatencyClass) -> Self {
        Self::new(policy.bound(class), policy.poll_interval())
    }
}

/// A satisfied wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitOutcome {
    /// Condition description
    pub condition: String,
    /// Time until satisfied
    pub elapsed: Duration,
    /// Evaluations performed
    pub polls: u32,
}

/// Poll `condition` until it holds or `options.timeout` expires.
///
/// Each evaluation is itself bounded by the time left, so a hung driver call
/// still ends in [`HarnessError::Timeout`] rather than a hang.
pub async fn wait_for(
    driver: &dyn HarnessDriver,
    condition: &WaitCondition,
    options: WaitOptions,
) -> HarnessResult<WaitOutcome> {
    let start = Instant::now();
    let deadline = start + options.timeout;
    let mut quiet_since = None;
    let mut polls = 0u32;
    let mut last_observation = String::from("never evaluated");
    debug!(condition = %condition, timeout_ms = options.timeout.as_millis() as u64, "waiting");

    loop {
        polls += 1;
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, condition.evaluate(driver, &mut quiet_since)).await
        {
            Err(_) => {
                last_observation = "evaluation still running at deadline".to_string();
                break;
            }
            Ok(Err(e)) => return Err(e),
            Ok(Ok(Readiness::Ready)) => {
                let elapsed = start.elapsed();
                info!(
                    condition = %condition,
                    elapsed_ms = elapsed.as_millis() as u64,
                    polls,
                    "wait satisfied"
                );
                return Ok(WaitOutcome {
                    condition: condition.to_string(),
                    elapsed,
                    polls,
                });
            }
            Ok(Ok(Readiness::Pending(observation))) => last_observation = observation,
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        tokio::time::sleep(options.poll_interval.min(remaining)).await;
    }

    let ms = options.timeout.as_millis() as u64;
    warn!(condition = %condition, ms, last = %last_observation, "wait timed out");
    Err(HarnessError::Timeout {
        condition: condition.to_string(),
        ms,
        last_observation,
    })
}

/// Sleep without observing anything.
///
/// Only for effects with no observable signal; `justification` is logged.
pub async fn unconditioned_wait(duration: Duration, justification: &str) {
    warn!(
        ms = duration.as_millis() as u64,
        justification, "unconditioned wait"
    );
    tokio::time::sleep(duration).await;
}
