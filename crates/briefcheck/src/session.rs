//! Browser session lifecycle.
//!
//! A [`Session`] is one isolated browser context used by exactly one scenario.
//! [`SessionManager::acquire`] is the only way to create one and
//! [`SessionManager::release`] consumes it, so a session cannot be released
//! twice. Only launchers spawn or terminate browser processes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::driver::HarnessDriver;
use crate::network::{lock_routes, RouteMock, RouteTable, SharedRouteTable};
use crate::result::{HarnessError, HarnessResult};

/// Preferred color scheme emulated for the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    /// `prefers-color-scheme: light`
    Light,
    /// `prefers-color-scheme: dark`
    Dark,
}

impl ColorScheme {
    /// CSS media feature value
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

/// Fixed viewport size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in CSS pixels
    pub width: u32,
    /// Height in CSS pixels
    pub height: u32,
}

impl Viewport {
    /// Create a viewport
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Small phone layout
    #[must_use]
    pub const fn mobile() -> Self {
        Self::new(375, 667)
    }
}

/// Options for acquiring a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Run without a visible window
    pub headless: bool,
    /// Fixed viewport
    pub viewport: Option<Viewport>,
    /// Emulated color scheme
    pub color_scheme: Option<ColorScheme>,
    /// Base URL relative paths are resolved against
    pub base_url: Option<String>,
    /// Chromium executable
    pub chromium_path: Option<String>,
    /// Keep the Chromium sandbox on
    pub sandbox: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: None,
            color_scheme: None,
            base_url: None,
            chromium_path: None,
            sandbox: true,
        }
    }
}

impl SessionOptions {
    /// Create default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set viewport
    #[must_use]
    pub const fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    /// Set color scheme
    #[must_use]
    pub const fn with_color_scheme(mut self, scheme: ColorScheme) -> Self {
        self.color_scheme = Some(scheme);
        self
    }

    /// Set base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set chromium executable
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable the sandbox (containers)
    #[must_use]
    pub const fn without_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Resolve a path or absolute URL against the base URL
    #[must_use]
    pub fn resolve_url(&self, target: &str) -> String {
        if target.contains("://") || target.starts_with("about:") {
            return target.to_string();
        }
        match &self.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                if target.starts_with('/') {
                    format!("{base}{target}")
                } else {
                    format!("{base}/{target}")
                }
            }
            None => target.to_string(),
        }
    }
}

/// Starts a browser and hands back a driver for its single page
#[async_trait]
pub trait SessionLauncher: Send + Sync + fmt::Debug {
    /// Launch a fresh, isolated browser context
    async fn launch(&self, options: &SessionOptions) -> HarnessResult<Arc<dyn HarnessDriver>>;
}

/// One isolated browser context
pub struct Session {
    id: String,
    options: SessionOptions,
    driver: Arc<dyn HarnessDriver>,
    routes: SharedRouteTable,
    interception_installed: AtomicBool,
    released: bool,
}

impl Session {
    fn new(id: String, options: SessionOptions, driver: Arc<dyn HarnessDriver>) -> Self {
        Self {
            id,
            options,
            driver,
            routes: RouteTable::shared(),
            interception_installed: AtomicBool::new(false),
            released: false,
        }
    }

    /// Session id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Options the session was acquired with
    #[must_use]
    pub const fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Underlying driver
    #[must_use]
    pub fn driver(&self) -> &dyn HarnessDriver {
        self.driver.as_ref()
    }

    /// This session's route table
    #[must_use]
    pub fn routes(&self) -> SharedRouteTable {
        Arc::clone(&self.routes)
    }

    /// Navigate to a path (resolved against the base URL) or absolute URL
    pub async fn goto(&self, target: &str) -> HarnessResult<()> {
        let url = self.options.resolve_url(target);
        debug!(session = %self.id, %url, "navigate");
        self.driver.navigate(&url).await
    }

    /// Reload the current page
    pub async fn reload(&self) -> HarnessResult<()> {
        debug!(session = %self.id, "reload");
        self.driver.reload().await
    }

    /// Current URL
    pub async fn current_url(&self) -> HarnessResult<String> {
        self.driver.current_url().await
    }

    /// Register a route mock; interception is switched on with the first one
    pub async fn mock(&self, route: RouteMock) -> HarnessResult<()> {
        info!(
            session = %self.id,
            route = %route,
            expect_hit = route.expect_hit,
            "route mock registered"
        );
        lock_routes(&self.routes).register(route);
        if !self.interception_installed.swap(true, Ordering::SeqCst) {
            if let Err(e) = self.driver.install_routes(self.routes()).await {
                self.interception_installed.store(false, Ordering::SeqCst);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Expected route mocks that were never hit
    #[must_use]
    pub fn unmet_route_expectations(&self) -> Vec<HarnessError> {
        lock_routes(&self.routes).unmet_expectations()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("options", &self.options)
            .field("driver", &self.driver)
            .finish_non_exhaustive()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.released {
            warn!(session = %self.id, "session dropped without release; browser may leak");
        }
    }
}

/// Acquires and releases sessions, tracking how many are live
#[derive(Debug)]
pub struct SessionManager {
    launcher: Arc<dyn SessionLauncher>,
    live: AtomicUsize,
    released: AtomicUsize,
}

impl SessionManager {
    /// Manager over a launcher
    #[must_use]
    pub fn new(launcher: Arc<dyn SessionLauncher>) -> Self {
        Self {
            launcher,
            live: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    /// Launch a fresh session with no residual state
    pub async fn acquire(&self, options: SessionOptions) -> HarnessResult<Session> {
        let driver = self.launcher.launch(&options).await?;
        let id = format!("session-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
        self.live.fetch_add(1, Ordering::SeqCst);
        info!(session = %id, headless = options.headless, "session acquired");
        Ok(Session::new(id, options, driver))
    }

    /// Tear a session down; the session is consumed whatever the outcome
    pub async fn release(&self, mut session: Session) -> HarnessResult<()> {
        session.released = true;
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.released.fetch_add(1, Ordering::SeqCst);
        let result = session.driver.close().await;
        match &result {
            Ok(()) => info!(session = %session.id, "session released"),
            Err(e) => warn!(session = %session.id, error = %e, "session release failed"),
        }
        result
    }

    /// Sessions acquired and not yet released
    #[must_use]
    pub fn live_sessions(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Sessions released so far
    #[must_use]
    pub fn released_sessions(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}
