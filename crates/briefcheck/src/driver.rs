//! Browser driver abstraction.
//!
//! Everything above this module talks to a page through [`HarnessDriver`].
//! Implementations:
//!
//! - `ChromiumDriver` (feature `browser`) - real Chromium over CDP
//! - [`crate::mock::MockDriver`] - scriptable in-memory page for tests
//!
//! Drivers act on "the `index`th match of a selector". Resolution and
//! strictness live in [`crate::locator`]; a driver never waits for anything.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::locator::Selector;
use crate::network::SharedRouteTable;
use crate::result::HarnessResult;

/// Rendered state of one element at query time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    /// Lowercase tag name
    pub tag: String,
    /// Normalized, truncated text content
    pub text: String,
    /// Bounding box width in CSS pixels
    pub width: f64,
    /// Bounding box height in CSS pixels
    pub height: f64,
    /// Not `display: none`, `visibility: hidden` or inside `aria-hidden`
    pub visible: bool,
    /// Disabled attribute, `aria-disabled` or disabled fieldset
    pub disabled: bool,
}

impl ElementSnapshot {
    /// Attached, rendered and with a non-empty box
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible && self.width > 0.0 && self.height > 0.0
    }

    /// Visible and not disabled
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.is_visible() && !self.disabled
    }
}

/// What a screenshot covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenshotTarget {
    /// The whole scrollable page
    FullPage,
    /// One element, addressed like an action
    Element {
        /// Selector of the element
        selector: Selector,
        /// Index among the selector's matches
        index: usize,
    },
}

/// A cookie to install before navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserCookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// URL the cookie is scoped to
    pub url: String,
}

/// Page-level operations the harness needs from a browser.
///
/// All methods take `&self`; implementations use interior mutability so a
/// session can share the driver with background tasks.
#[async_trait]
pub trait HarnessDriver: Send + Sync + std::fmt::Debug {
    /// Navigate to an absolute URL and wait for the load event
    async fn navigate(&self, url: &str) -> HarnessResult<()>;

    /// Reload the current page
    async fn reload(&self) -> HarnessResult<()>;

    /// Current URL
    async fn current_url(&self) -> HarnessResult<String>;

    /// Snapshots of every element the selector matches, in document order
    async fn query_all(&self, selector: &Selector) -> HarnessResult<Vec<ElementSnapshot>>;

    /// Click the `index`th match
    async fn click(&self, selector: &Selector, index: usize) -> HarnessResult<()>;

    /// Replace the content of the `index`th match with `text`
    async fn fill(&self, selector: &Selector, index: usize, text: &str) -> HarnessResult<()>;

    /// Pick an option by value or label in the `index`th match
    async fn select_option(&self, selector: &Selector, index: usize, value: &str)
        -> HarnessResult<()>;

    /// Press a key on the focused element
    async fn press_key(&self, key: &str) -> HarnessResult<()>;

    /// Requests issued by the page that have not finished
    async fn inflight_requests(&self) -> HarnessResult<usize>;

    /// Write a key into the page origin's local storage
    async fn set_local_storage(&self, key: &str, value: &str) -> HarnessResult<()>;

    /// Add a cookie to the session's jar
    async fn add_cookie(&self, cookie: &BrowserCookie) -> HarnessResult<()>;

    /// Start consulting `routes` for every outgoing request
    async fn install_routes(&self, routes: SharedRouteTable) -> HarnessResult<()>;

    /// Capture a PNG
    async fn screenshot(&self, target: &ScreenshotTarget) -> HarnessResult<Vec<u8>>;

    /// Tear the page and its browser down
    async fn close(&self) -> HarnessResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(width: f64, visible: bool, disabled: bool) -> ElementSnapshot {
        ElementSnapshot {
            tag: "button".to_string(),
            text: "Próximo".to_string(),
            width,
            height: 20.0,
            visible,
            disabled,
        }
    }

    #[test]
    fn test_zero_size_is_not_visible() {
        assert!(!snapshot(0.0, true, false).is_visible());
        assert!(snapshot(10.0, true, false).is_visible());
    }

    #[test]
    fn test_enabled_requires_visible() {
        assert!(!snapshot(10.0, false, false).is_enabled());
        assert!(!snapshot(10.0, true, true).is_enabled());
        assert!(snapshot(10.0, true, false).is_enabled());
    }
}
