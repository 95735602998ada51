//! Chromium over CDP.
//!
//! One browser process per session, each with its own throwaway profile
//! directory, so sessions share no cookies, storage or cache. Route mocks are
//! served through the Fetch domain; in-flight requests are counted from
//! Network domain events.

#![allow(
    clippy::significant_drop_tightening,
    clippy::missing_errors_doc,
    clippy::items_after_statements
)]

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    MediaFeature, SetDeviceMetricsOverrideParams, SetEmulatedMediaParams,
};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams as FetchEnableParams, EventRequestPaused,
    FulfillRequestParams, HeaderEntry, RequestPattern, RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, EnableParams as NetworkEnableParams, EventLoadingFailed, EventLoadingFinished,
    EventRequestWillBeSent, PostDataEntry,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat,
};
use chromiumoxide::element::Element;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::driver::{BrowserCookie, ElementSnapshot, HarnessDriver, ScreenshotTarget};
use crate::locator::{Selector, TARGET_ATTRIBUTE};
use crate::network::{lock_routes, HttpMethod, InterceptedRequest, SharedRouteTable};
use crate::result::{HarnessError, HarnessResult};
use crate::session::{SessionLauncher, SessionOptions};

fn cdp_error(e: impl std::fmt::Display) -> HarnessError {
    HarnessError::driver(e)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Driver for one Chromium page
#[derive(Debug)]
pub struct ChromiumDriver {
    browser: tokio::sync::Mutex<Browser>,
    page: Page,
    handler: Mutex<Option<JoinHandle<()>>>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
    inflight: Arc<Mutex<HashSet<String>>>,
    profile_dir: PathBuf,
}

impl ChromiumDriver {
    /// Launch a browser and open its single page
    pub async fn launch(options: &SessionOptions) -> HarnessResult<Self> {
        let profile_dir = std::env::temp_dir().join(format!(
            "briefcheck-profile-{}",
            uuid::Uuid::new_v4().simple()
        ));
        let mut builder = BrowserConfig::builder().user_data_dir(&profile_dir);
        if !options.headless {
            builder = builder.with_head();
        }
        if !options.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &options.chromium_path {
            builder = builder.chrome_executable(path);
        }
        if let Some(viewport) = options.viewport {
            builder = builder.window_size(viewport.width, viewport.height);
        }
        let config = builder
            .build()
            .map_err(|message| HarnessError::BrowserLaunch { message })?;

        let (browser, mut handler) =
            Browser::launch(config)
                .await
                .map_err(|e| HarnessError::BrowserLaunch {
                    message: e.to_string(),
                })?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "cdp handler event error");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(HarnessError::BrowserLaunch {
                    message: e.to_string(),
                });
            }
        };

        let driver = Self {
            browser: tokio::sync::Mutex::new(browser),
            page,
            handler: Mutex::new(Some(handler)),
            listeners: Mutex::new(Vec::new()),
            inflight: Arc::new(Mutex::new(HashSet::new())),
            profile_dir,
        };
        if let Err(e) = driver.configure(options).await {
            if let Err(close) = driver.close().await {
                warn!(error = %close, "cleanup after failed launch");
            }
            return Err(e);
        }
        info!(
            headless = options.headless,
            profile = %driver.profile_dir.display(),
            "chromium launched"
        );
        Ok(driver)
    }

    async fn configure(&self, options: &SessionOptions) -> HarnessResult<()> {
        if let Some(viewport) = options.viewport {
            self.page
                .execute(SetDeviceMetricsOverrideParams::new(
                    i64::from(viewport.width),
                    i64::from(viewport.height),
                    1.0,
                    false,
                ))
                .await
                .map_err(cdp_error)?;
        }
        if let Some(scheme) = options.color_scheme {
            let media = SetEmulatedMediaParams::builder()
                .features(vec![MediaFeature::new("prefers-color-scheme", scheme.as_str())])
                .build();
            self.page.execute(media).await.map_err(cdp_error)?;
        }

        self.page
            .execute(NetworkEnableParams::default())
            .await
            .map_err(cdp_error)?;
        let mut sent = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(cdp_error)?;
        let mut finished = self
            .page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(cdp_error)?;
        let mut failed = self
            .page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(cdp_error)?;

        let inflight = Arc::clone(&self.inflight);
        let on_sent = tokio::spawn(async move {
            while let Some(event) = sent.next().await {
                lock(&inflight).insert(event.request_id.inner().clone());
            }
        });
        let inflight = Arc::clone(&self.inflight);
        let on_finished = tokio::spawn(async move {
            while let Some(event) = finished.next().await {
                lock(&inflight).remove(event.request_id.inner());
            }
        });
        let inflight = Arc::clone(&self.inflight);
        let on_failed = tokio::spawn(async move {
            while let Some(event) = failed.next().await {
                lock(&inflight).remove(event.request_id.inner());
            }
        });
        lock(&self.listeners).extend([on_sent, on_finished, on_failed]);
        Ok(())
    }

    async fn eval<T: DeserializeOwned>(&self, expression: &str) -> HarnessResult<T> {
        self.page
            .evaluate(expression)
            .await
            .map_err(cdp_error)?
            .into_value()
            .map_err(cdp_error)
    }

    /// Tag the `index`th match and hand it back as a CDP element
    async fn target(&self, selector: &Selector, index: usize) -> HarnessResult<(Element, String)> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let tagged: bool = self.eval(&selector.to_target_js(index, &token)?).await?;
        if !tagged {
            return Err(HarnessError::driver(format!(
                "no element {selector} at index {index}"
            )));
        }
        let css = format!("[{TARGET_ATTRIBUTE}=\"{token}\"]");
        let element = self.page.find_element(css.as_str()).await.map_err(cdp_error)?;
        Ok((element, css))
    }
}

fn is_context_loss(error: &HarnessError) -> bool {
    let text = error.to_string();
    text.contains("Execution context was destroyed")
        || text.contains("Cannot find context")
        || text.contains("Inspected target navigated")
}

const CLEAR_FIELD_JS: &str = r"(css) => {
  const el = document.querySelector(css);
  if (!el) return false;
  el.focus();
  if (el.isContentEditable) {
    const range = document.createRange();
    range.selectNodeContents(el);
    const sel = window.getSelection();
    sel.removeAllRanges();
    sel.addRange(range);
    document.execCommand('delete');
  } else {
    const proto = el instanceof HTMLTextAreaElement
      ? HTMLTextAreaElement.prototype
      : HTMLInputElement.prototype;
    const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
    setter.call(el, '');
    el.dispatchEvent(new Event('input', { bubbles: true }));
  }
  return true;
}";

const SELECT_OPTION_JS: &str = r"(css, wanted) => {
  const el = document.querySelector(css);
  if (!el || !el.options) return false;
  const opt = Array.from(el.options).find((o) => o.value === wanted || o.label.trim() === wanted);
  if (!opt) return false;
  el.value = opt.value;
  el.dispatchEvent(new Event('input', { bubbles: true }));
  el.dispatchEvent(new Event('change', { bubbles: true }));
  return true;
}";

/// Join the base64 post data entries of a paused request into one body
fn post_body(entries: Option<&[PostDataEntry]>) -> Option<String> {
    let entries = entries?;
    let mut bytes = Vec::new();
    for chunk in entries.iter().filter_map(|entry| entry.bytes.as_ref()) {
        let encoded: &str = chunk.as_ref();
        match base64::engine::general_purpose::STANDARD.decode(encoded) {
            Ok(decoded) => bytes.extend(decoded),
            Err(e) => {
                warn!(error = %e, "undecodable post data entry");
                return None;
            }
        }
    }
    (!bytes.is_empty()).then(|| String::from_utf8_lossy(&bytes).into_owned())
}

async fn answer_paused(
    page: &Page,
    routes: &SharedRouteTable,
    event: &EventRequestPaused,
) -> HarnessResult<()> {
    let request = InterceptedRequest {
        url: event.request.url.clone(),
        method: HttpMethod::parse(&event.request.method),
        body: post_body(event.request.post_data_entries.as_deref()),
    };
    let response = lock_routes(routes).intercept(request);
    let Some(response) = response else {
        page.execute(ContinueRequestParams::new(event.request_id.clone()))
            .await
            .map_err(cdp_error)?;
        return Ok(());
    };

    if response.delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(response.delay_ms)).await;
    }
    let mut headers: Vec<HeaderEntry> = response
        .headers
        .iter()
        .map(|(name, value)| HeaderEntry::new(name.clone(), value.clone()))
        .collect();
    if !response
        .headers
        .keys()
        .any(|name| name.eq_ignore_ascii_case("content-type"))
    {
        headers.push(HeaderEntry::new("Content-Type", response.content_type.clone()));
    }
    let fulfill = FulfillRequestParams::builder()
        .request_id(event.request_id.clone())
        .response_code(i64::from(response.status))
        .response_headers(headers)
        .body(base64::engine::general_purpose::STANDARD.encode(&response.body))
        .build()
        .map_err(HarnessError::driver)?;
    page.execute(fulfill).await.map_err(cdp_error)?;
    Ok(())
}

#[async_trait]
impl HarnessDriver for ChromiumDriver {
    async fn navigate(&self, url: &str) -> HarnessResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| HarnessError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn reload(&self) -> HarnessResult<()> {
        self.page.reload().await.map_err(cdp_error)?;
        Ok(())
    }

    async fn current_url(&self) -> HarnessResult<String> {
        Ok(self
            .page
            .url()
            .await
            .map_err(cdp_error)?
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn query_all(&self, selector: &Selector) -> HarnessResult<Vec<ElementSnapshot>> {
        match self.eval(&selector.to_snapshot_js()?).await {
            Err(e) if is_context_loss(&e) => Ok(Vec::new()),
            other => other,
        }
    }

    async fn click(&self, selector: &Selector, index: usize) -> HarnessResult<()> {
        let (element, _) = self.target(selector, index).await?;
        element.click().await.map_err(cdp_error)?;
        Ok(())
    }

    async fn fill(&self, selector: &Selector, index: usize, text: &str) -> HarnessResult<()> {
        let (element, css) = self.target(selector, index).await?;
        let call = format!(
            "({CLEAR_FIELD_JS})({})",
            serde_json::to_string(&css)?
        );
        let cleared: bool = self.eval(&call).await?;
        if !cleared {
            return Err(HarnessError::driver(format!("{selector} vanished before fill")));
        }
        element.type_str(text).await.map_err(cdp_error)?;
        Ok(())
    }

    async fn select_option(
        &self,
        selector: &Selector,
        index: usize,
        value: &str,
    ) -> HarnessResult<()> {
        let (_, css) = self.target(selector, index).await?;
        let call = format!(
            "({SELECT_OPTION_JS})({}, {})",
            serde_json::to_string(&css)?,
            serde_json::to_string(value)?
        );
        let selected: bool = self.eval(&call).await?;
        if !selected {
            return Err(HarnessError::driver(format!(
                "{selector} has no option {value:?}"
            )));
        }
        Ok(())
    }

    async fn press_key(&self, key: &str) -> HarnessResult<()> {
        let focused = match self.page.find_element("*:focus").await {
            Ok(element) => element,
            Err(_) => self.page.find_element("body").await.map_err(cdp_error)?,
        };
        focused.press_key(key).await.map_err(cdp_error)?;
        Ok(())
    }

    async fn inflight_requests(&self) -> HarnessResult<usize> {
        Ok(lock(&self.inflight).len())
    }

    async fn set_local_storage(&self, key: &str, value: &str) -> HarnessResult<()> {
        let key = serde_json::to_string(key)?;
        let value = serde_json::to_string(value)?;
        let stored: bool = self
            .eval(&format!(
                "(() => {{ try {{ localStorage.setItem({key}, {value}); return true; }} \
                 catch (e) {{ return false; }} }})()"
            ))
            .await?;
        if !stored {
            // No origin yet: seed the first document that has one.
            let script = format!(
                "try {{ if (localStorage.getItem({key}) === null) \
                 localStorage.setItem({key}, {value}); }} catch (e) {{}}"
            );
            self.page
                .execute(AddScriptToEvaluateOnNewDocumentParams::new(script))
                .await
                .map_err(cdp_error)?;
        }
        Ok(())
    }

    async fn add_cookie(&self, cookie: &BrowserCookie) -> HarnessResult<()> {
        let param = CookieParam::builder()
            .name(cookie.name.clone())
            .value(cookie.value.clone())
            .url(cookie.url.clone())
            .build()
            .map_err(HarnessError::driver)?;
        self.page.set_cookie(param).await.map_err(cdp_error)?;
        Ok(())
    }

    async fn install_routes(&self, routes: SharedRouteTable) -> HarnessResult<()> {
        let mut paused = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(cdp_error)?;
        let page = self.page.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                if let Err(e) = answer_paused(&page, &routes, &event).await {
                    warn!(url = %event.request.url, error = %e, "paused request not answered");
                }
            }
        });
        lock(&self.listeners).push(task);

        let pattern = RequestPattern::builder()
            .url_pattern("*")
            .request_stage(RequestStage::Request)
            .build();
        self.page
            .execute(FetchEnableParams::builder().pattern(pattern).build())
            .await
            .map_err(cdp_error)?;
        Ok(())
    }

    async fn screenshot(&self, target: &ScreenshotTarget) -> HarnessResult<Vec<u8>> {
        match target {
            ScreenshotTarget::FullPage => self
                .page
                .screenshot(
                    ScreenshotParams::builder()
                        .format(CaptureScreenshotFormat::Png)
                        .full_page(true)
                        .build(),
                )
                .await
                .map_err(cdp_error),
            ScreenshotTarget::Element { selector, index } => {
                let (element, _) = self.target(selector, *index).await?;
                element
                    .screenshot(CaptureScreenshotFormat::Png)
                    .await
                    .map_err(cdp_error)
            }
        }
    }

    async fn close(&self) -> HarnessResult<()> {
        for task in lock(&self.listeners).drain(..) {
            task.abort();
        }
        let closed = {
            let mut browser = self.browser.lock().await;
            let closed = browser.close().await.map(drop).map_err(cdp_error);
            if let Err(e) = browser.wait().await {
                warn!(error = %e, "waiting for chromium to exit");
            }
            closed
        };
        if let Some(handler) = lock(&self.handler).take() {
            handler.abort();
        }
        if let Err(e) = tokio::fs::remove_dir_all(&self.profile_dir).await {
            debug!(dir = %self.profile_dir.display(), error = %e, "profile directory not removed");
        }
        closed
    }
}

/// Launches one Chromium process per session
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromiumLauncher;

impl ChromiumLauncher {
    /// Create a launcher
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self, options: &SessionOptions) -> HarnessResult<Arc<dyn HarnessDriver>> {
        let driver = ChromiumDriver::launch(options).await?;
        Ok(Arc::new(driver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_loss_detection() {
        assert!(is_context_loss(&HarnessError::driver(
            "Execution context was destroyed, most likely because of a navigation"
        )));
        assert!(!is_context_loss(&HarnessError::driver("ReferenceError: x is not defined")));
    }

    #[test]
    fn test_helper_scripts_are_functions() {
        assert!(CLEAR_FIELD_JS.starts_with("(css) =>"));
        assert!(SELECT_OPTION_JS.starts_with("(css, wanted) =>"));
    }

    mod post_body_tests {
        use super::*;

        fn entry(raw: &str) -> PostDataEntry {
            PostDataEntry::builder()
                .bytes(base64::engine::general_purpose::STANDARD.encode(raw))
                .build()
        }

        #[test]
        fn test_entries_joined_in_order() {
            let entries = vec![entry("{\"email\":"), entry("\"a@b.test\"}")];
            assert_eq!(
                post_body(Some(entries.as_slice())).as_deref(),
                Some("{\"email\":\"a@b.test\"}")
            );
        }

        #[test]
        fn test_no_entries_means_no_body() {
            assert_eq!(post_body(None), None);
            assert_eq!(post_body(Some(&[][..])), None);
            let empty = [PostDataEntry::builder().build()];
            assert_eq!(post_body(Some(&empty[..])), None);
        }

        #[test]
        fn test_invalid_base64_drops_body() {
            let bad = PostDataEntry::builder().bytes("not base64!".to_string()).build();
            assert_eq!(post_body(Some(&[bad][..])), None);
        }
    }
}
