//! Scriptable in-memory page for driving the harness without a browser.
//!
//! A [`MockDriver`] holds a flat list of [`MockElement`]s, reactions that run
//! [`Effect`]s when elements are clicked or filled, per-path page-load effects
//! and a small simulated backend. Time is measured in ticks: every observation
//! (`query_all`, `current_url`, `inflight_requests`) advances the clock by one,
//! so "the revision arrives three polls later" is deterministic.
//!
//! Outgoing requests consult the session's installed route table first, like
//! the CDP driver does; unmocked requests go to the simulated backend and fail
//! like a refused connection when it has no matching endpoint.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::driver::{BrowserCookie, ElementSnapshot, HarnessDriver, ScreenshotTarget};
use crate::locator::Selector;
use crate::network::{
    lock_routes, path_of, HttpMethod, InterceptedRequest, MockResponse, Responder,
    SharedRouteTable,
};
use crate::result::{HarnessError, HarnessResult};
use crate::session::{SessionLauncher, SessionOptions};

/// One element of the simulated page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    /// Unique key used by reactions and effects
    pub key: String,
    /// Tag name
    pub tag: String,
    /// ARIA role
    pub role: Option<String>,
    /// Accessible name
    pub name: String,
    /// Text content
    pub text: String,
    /// Associated label or aria-label
    pub label: Option<String>,
    /// `data-testid`
    pub test_id: Option<String>,
    /// CSS selectors this element answers to, verbatim
    pub css: Vec<String>,
    /// In the DOM
    pub mounted: bool,
    /// Rendered (when mounted)
    pub visible: bool,
    /// Disabled
    pub disabled: bool,
    /// Current input value
    pub value: String,
}

impl MockElement {
    /// Bare element, unmounted
    #[must_use]
    pub fn new(key: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            tag: tag.into(),
            role: None,
            name: String::new(),
            text: String::new(),
            label: None,
            test_id: None,
            css: Vec::new(),
            mounted: false,
            visible: true,
            disabled: false,
            value: String::new(),
        }
    }

    /// A button named by its text
    #[must_use]
    pub fn button(key: impl Into<String>, name: &str) -> Self {
        Self::new(key, "button").with_role("button", name).with_text(name)
    }

    /// A heading
    #[must_use]
    pub fn heading(key: impl Into<String>, text: &str) -> Self {
        Self::new(key, "h2").with_role("heading", text).with_text(text)
    }

    /// A labelled text input
    #[must_use]
    pub fn textbox(key: impl Into<String>, label: &str) -> Self {
        Self::new(key, "input").with_role("textbox", label).with_label(label)
    }

    /// A tab
    #[must_use]
    pub fn tab(key: impl Into<String>, name: &str) -> Self {
        Self::new(key, "button").with_role("tab", name).with_text(name)
    }

    /// A dialog container
    #[must_use]
    pub fn dialog(key: impl Into<String>, name: &str) -> Self {
        Self::new(key, "div").with_role("dialog", name)
    }

    /// Plain text
    #[must_use]
    pub fn text(key: impl Into<String>, text: &str) -> Self {
        Self::new(key, "span").with_text(text)
    }

    /// Set role and accessible name
    #[must_use]
    pub fn with_role(mut self, role: &str, name: &str) -> Self {
        self.role = Some(role.to_string());
        self.name = name.to_string();
        self
    }

    /// Set text content
    #[must_use]
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    /// Set label
    #[must_use]
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Set test id
    #[must_use]
    pub fn with_test_id(mut self, id: &str) -> Self {
        self.test_id = Some(id.to_string());
        self
    }

    /// Answer to a CSS selector
    #[must_use]
    pub fn with_css(mut self, css: &str) -> Self {
        self.css.push(css.to_string());
        self
    }

    /// Start mounted
    #[must_use]
    pub const fn mounted(mut self) -> Self {
        self.mounted = true;
        self
    }

    /// Start hidden by style
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Start disabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Whether a selector matches this element, ignoring mount state
    #[must_use]
    pub fn matches(&self, selector: &Selector) -> bool {
        match selector {
            Selector::Role { role, name } => {
                self.role.as_deref() == Some(role.as_str())
                    && self.visible
                    && name.as_ref().map_or(true, |m| m.matches(&self.name))
            }
            Selector::Text { text } => !self.text.is_empty() && text.matches(&self.text),
            Selector::Label { label } => self.label.as_deref().is_some_and(|l| label.matches(l)),
            Selector::TestId { id } => self.test_id.as_deref() == Some(id.as_str()),
            Selector::Css { css } => self.css.iter().any(|c| c == css),
            Selector::CssWithText { css, text } => {
                self.css.iter().any(|c| c == css) && text.matches(&self.text)
            }
        }
    }

    fn snapshot(&self) -> ElementSnapshot {
        let (width, height) = if self.visible { (120.0, 32.0) } else { (0.0, 0.0) };
        ElementSnapshot {
            tag: self.tag.clone(),
            text: self.text.clone(),
            width,
            height,
            visible: self.visible,
            disabled: self.disabled,
        }
    }
}

/// A request the simulated page sends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRequest {
    /// Method
    pub method: HttpMethod,
    /// Path, joined to the page origin
    pub path: String,
    /// JSON body built from element values: `(json key, element key)`
    pub fields: Vec<(String, String)>,
    /// Effects when the response is 2xx
    pub on_success: Vec<Effect>,
    /// Effects on a non-2xx response or a failed connection
    pub on_failure: Vec<Effect>,
}

impl MockRequest {
    /// GET request
    #[must_use]
    pub fn get(path: &str) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// POST request
    #[must_use]
    pub fn post(path: &str) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    /// PUT request
    #[must_use]
    pub fn put(path: &str) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    fn new(method: HttpMethod, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            fields: Vec::new(),
            on_success: Vec::new(),
            on_failure: Vec::new(),
        }
    }

    /// Add a body field taken from an element's value
    #[must_use]
    pub fn field(mut self, json_key: &str, element_key: &str) -> Self {
        self.fields.push((json_key.to_string(), element_key.to_string()));
        self
    }

    /// Effects on success
    #[must_use]
    pub fn on_success(mut self, effects: Vec<Effect>) -> Self {
        self.on_success = effects;
        self
    }

    /// Effects on failure
    #[must_use]
    pub fn on_failure(mut self, effects: Vec<Effect>) -> Self {
        self.on_failure = effects;
        self
    }

    /// Wrap as an effect
    #[must_use]
    pub fn send(self) -> Effect {
        Effect::Request(Box::new(self))
    }
}

/// A change to the simulated page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Attach an element
    Mount(String),
    /// Detach an element
    Unmount(String),
    /// Make an element rendered
    Show(String),
    /// Hide an element by style
    Hide(String),
    /// Enable an element
    Enable(String),
    /// Disable an element
    Disable(String),
    /// Client-side route change without load effects
    SetUrl(String),
    /// Client-side route change running the path's load effects
    Navigate(String),
    /// Issue a request
    Request(Box<MockRequest>),
    /// Mark requests as started
    BeginRequests(usize),
    /// Mark requests as finished
    EndRequests(usize),
    /// Run effects a number of ticks later
    After(u64, Vec<Effect>),
    /// Branch on a local storage key
    IfStorage {
        /// Storage key
        key: String,
        /// Effects when present
        then: Vec<Effect>,
        /// Effects when absent
        otherwise: Vec<Effect>,
    },
    /// Branch on a cookie
    IfCookie {
        /// Cookie name
        name: String,
        /// Effects when present
        then: Vec<Effect>,
        /// Effects when absent
        otherwise: Vec<Effect>,
    },
}

/// How a simulated request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestFate {
    /// Answered by a session route mock
    Mocked(u16),
    /// Answered by the simulated backend
    Live(u16),
    /// No endpoint; failed like a refused connection
    Refused,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Trigger {
    Click(String),
    Fill(String),
    Press(String),
}

#[derive(Debug, Clone)]
struct LiveEndpoint {
    method: HttpMethod,
    path: String,
    responder: Responder,
    latency: u64,
}

#[derive(Debug)]
struct MockState {
    url: String,
    blueprint: Vec<MockElement>,
    elements: Vec<MockElement>,
    reactions: Vec<(Trigger, Vec<Effect>)>,
    page_loads: HashMap<String, Vec<Effect>>,
    live: Vec<LiveEndpoint>,
    storage: HashMap<String, String>,
    cookies: Vec<BrowserCookie>,
    routes: Option<SharedRouteTable>,
    scheduled: Vec<(u64, Effect)>,
    tick: u64,
    inflight: usize,
    history: Vec<String>,
    requests: Vec<(InterceptedRequest, RequestFate)>,
    closed: usize,
    fail_screenshots: bool,
    viewport: (u32, u32),
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            url: "about:blank".to_string(),
            blueprint: Vec::new(),
            elements: Vec::new(),
            reactions: Vec::new(),
            page_loads: HashMap::new(),
            live: Vec::new(),
            storage: HashMap::new(),
            cookies: Vec::new(),
            routes: None,
            scheduled: Vec::new(),
            tick: 0,
            inflight: 0,
            history: Vec::new(),
            requests: Vec::new(),
            closed: 0,
            fail_screenshots: false,
            viewport: (1280, 720),
        }
    }
}

impl MockState {
    fn origin(&self) -> &str {
        let Some((scheme, rest)) = self.url.split_once("://") else {
            return "";
        };
        let host_len = rest.find('/').unwrap_or(rest.len());
        &self.url[..scheme.len() + 3 + host_len]
    }

    fn advance(&mut self) {
        self.tick += 1;
        loop {
            let tick = self.tick;
            let (due, later): (Vec<_>, Vec<_>) =
                self.scheduled.drain(..).partition(|(at, _)| *at <= tick);
            self.scheduled = later;
            if due.is_empty() {
                break;
            }
            for (_, effect) in due {
                self.apply(effect);
            }
        }
    }

    fn element_mut(&mut self, key: &str) -> Option<&mut MockElement> {
        self.elements.iter_mut().find(|e| e.key == key)
    }

    fn update(&mut self, key: &str, f: impl FnOnce(&mut MockElement)) {
        match self.element_mut(key) {
            Some(element) => f(element),
            None => self.history.push(format!("unknown-element:{key}")),
        }
    }

    fn apply_all(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            self.apply(effect);
        }
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Mount(key) => self.update(&key, |e| e.mounted = true),
            Effect::Unmount(key) => self.update(&key, |e| e.mounted = false),
            Effect::Show(key) => self.update(&key, |e| e.visible = true),
            Effect::Hide(key) => self.update(&key, |e| e.visible = false),
            Effect::Enable(key) => self.update(&key, |e| e.disabled = false),
            Effect::Disable(key) => self.update(&key, |e| e.disabled = true),
            Effect::SetUrl(path) => {
                self.url = format!("{}{path}", self.origin());
            }
            Effect::Navigate(path) => {
                self.url = format!("{}{path}", self.origin());
                self.run_page_load(&path);
            }
            Effect::Request(request) => self.issue(*request),
            Effect::BeginRequests(n) => self.inflight += n,
            Effect::EndRequests(n) => self.inflight = self.inflight.saturating_sub(n),
            Effect::After(ticks, effects) => {
                let at = self.tick + ticks;
                self.scheduled.extend(effects.into_iter().map(|e| (at, e)));
            }
            Effect::IfStorage {
                key,
                then,
                otherwise,
            } => {
                let branch = if self.storage.contains_key(&key) { then } else { otherwise };
                self.apply_all(branch);
            }
            Effect::IfCookie {
                name,
                then,
                otherwise,
            } => {
                let branch = if self.cookies.iter().any(|c| c.name == name) {
                    then
                } else {
                    otherwise
                };
                self.apply_all(branch);
            }
        }
    }

    fn run_page_load(&mut self, path: &str) {
        if let Some(effects) = self.page_loads.get(path).cloned() {
            self.apply_all(effects);
        }
    }

    fn load(&mut self, url: &str) {
        self.url = url.to_string();
        self.elements = self.blueprint.clone();
        self.scheduled.clear();
        self.inflight = 0;
        let path = path_of(url).to_string();
        self.run_page_load(&path);
    }

    fn issue(&mut self, request: MockRequest) {
        let body = (!request.fields.is_empty()).then(|| {
            let object: serde_json::Map<String, serde_json::Value> = request
                .fields
                .iter()
                .map(|(json_key, element_key)| {
                    let value = self
                        .elements
                        .iter()
                        .find(|e| &e.key == element_key)
                        .map(|e| e.value.clone())
                        .unwrap_or_default();
                    (json_key.clone(), serde_json::Value::String(value))
                })
                .collect();
            serde_json::Value::Object(object).to_string()
        });
        let mut intercepted =
            InterceptedRequest::new(request.method, format!("{}{}", self.origin(), request.path));
        intercepted.body = body;

        let mocked = self
            .routes
            .as_ref()
            .and_then(|table| lock_routes(table).intercept(intercepted.clone()));
        let (fate, response, latency) = if let Some(response) = mocked {
            (RequestFate::Mocked(response.status), Some(response), 1)
        } else if let Some(endpoint) = self
            .live
            .iter()
            .find(|l| l.method.matches(&request.method) && l.path == request.path)
        {
            let response = endpoint.responder.respond(&intercepted);
            (RequestFate::Live(response.status), Some(response), endpoint.latency.max(1))
        } else {
            (RequestFate::Refused, None, 1)
        };
        self.history
            .push(format!("request:{} {}", request.method.as_str(), request.path));
        self.requests.push((intercepted, fate));

        let mut effects = vec![Effect::EndRequests(1)];
        if response.as_ref().is_some_and(MockResponse::is_success) {
            effects.extend(request.on_success);
        } else {
            effects.extend(request.on_failure);
        }
        self.inflight += 1;
        self.apply(Effect::After(latency, effects));
    }

    fn react(&mut self, trigger: &Trigger) {
        let effects: Vec<Effect> = self
            .reactions
            .iter()
            .filter(|(t, _)| t == trigger)
            .flat_map(|(_, effects)| effects.clone())
            .collect();
        self.apply_all(effects);
    }

    fn matching(&self, selector: &Selector) -> Vec<&MockElement> {
        self.elements
            .iter()
            .filter(|e| e.mounted && e.matches(selector))
            .collect()
    }

    fn actionable(&self, selector: &Selector, index: usize) -> HarnessResult<String> {
        let element = self
            .matching(selector)
            .into_iter()
            .nth(index)
            .ok_or_else(|| {
                HarnessError::driver(format!("no element {selector} at index {index}"))
            })?;
        if !element.visible || element.disabled {
            return Err(HarnessError::driver(format!(
                "element {} is not actionable (visible={}, disabled={})",
                element.key, element.visible, element.disabled
            )));
        }
        Ok(element.key.clone())
    }
}

/// Scriptable in-memory page; clones share state
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    /// Create an empty page
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an element to the page blueprint
    #[must_use]
    pub fn with_element(self, element: MockElement) -> Self {
        {
            let mut state = self.state();
            state.blueprint.push(element.clone());
            state.elements.push(element);
        }
        self
    }

    /// Run effects when an element is clicked
    #[must_use]
    pub fn on_click(self, key: &str, effects: Vec<Effect>) -> Self {
        self.state()
            .reactions
            .push((Trigger::Click(key.to_string()), effects));
        self
    }

    /// Run effects when an element is filled or an option selected
    #[must_use]
    pub fn on_fill(self, key: &str, effects: Vec<Effect>) -> Self {
        self.state()
            .reactions
            .push((Trigger::Fill(key.to_string()), effects));
        self
    }

    /// Run effects when a key is pressed
    #[must_use]
    pub fn on_press(self, key: &str, effects: Vec<Effect>) -> Self {
        self.state()
            .reactions
            .push((Trigger::Press(key.to_string()), effects));
        self
    }

    /// Run effects whenever a path is loaded (navigation, reload, client route)
    #[must_use]
    pub fn on_load(self, path: &str, effects: Vec<Effect>) -> Self {
        self.state().page_loads.insert(path.to_string(), effects);
        self
    }

    /// Serve a path from the simulated backend, answering after `latency` ticks
    #[must_use]
    pub fn with_endpoint(
        self,
        method: HttpMethod,
        path: &str,
        responder: impl Into<Responder>,
        latency: u64,
    ) -> Self {
        self.state().live.push(LiveEndpoint {
            method,
            path: path.to_string(),
            responder: responder.into(),
            latency,
        });
        self
    }

    /// Set the viewport used for full-page screenshots
    #[must_use]
    pub fn with_viewport(self, width: u32, height: u32) -> Self {
        self.state().viewport = (width.max(1), height.max(1));
        self
    }

    /// Make screenshots fail
    pub fn set_fail_screenshots(&self, fail: bool) {
        self.state().fail_screenshots = fail;
    }

    /// Current URL without advancing the clock
    #[must_use]
    pub fn url(&self) -> String {
        self.state().url.clone()
    }

    /// Call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.state().history.clone()
    }

    /// Check if a call with this prefix was made
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.state().history.iter().any(|c| c.starts_with(prefix))
    }

    /// Times `close` ran
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.state().closed
    }

    /// Local storage value
    #[must_use]
    pub fn local_storage(&self, key: &str) -> Option<String> {
        self.state().storage.get(key).cloned()
    }

    /// Installed cookies
    #[must_use]
    pub fn cookies(&self) -> Vec<BrowserCookie> {
        self.state().cookies.clone()
    }

    /// Requests the page issued and how they ended
    #[must_use]
    pub fn requests(&self) -> Vec<(InterceptedRequest, RequestFate)> {
        self.state().requests.clone()
    }

    /// Current state of an element
    #[must_use]
    pub fn element(&self, key: &str) -> Option<MockElement> {
        self.state().elements.iter().find(|e| e.key == key).cloned()
    }
}

fn render_png(width: u32, height: u32) -> HarnessResult<Vec<u8>> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba([246, 246, 248, 255]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(HarnessError::driver)?;
    Ok(bytes)
}

#[async_trait]
impl HarnessDriver for MockDriver {
    async fn navigate(&self, url: &str) -> HarnessResult<()> {
        let mut state = self.state();
        state.history.push(format!("navigate:{url}"));
        state.load(url);
        Ok(())
    }

    async fn reload(&self) -> HarnessResult<()> {
        let mut state = self.state();
        state.history.push("reload".to_string());
        let url = state.url.clone();
        state.load(&url);
        Ok(())
    }

    async fn current_url(&self) -> HarnessResult<String> {
        let mut state = self.state();
        state.advance();
        Ok(state.url.clone())
    }

    async fn query_all(&self, selector: &Selector) -> HarnessResult<Vec<ElementSnapshot>> {
        let mut state = self.state();
        state.advance();
        Ok(state
            .matching(selector)
            .into_iter()
            .map(MockElement::snapshot)
            .collect())
    }

    async fn click(&self, selector: &Selector, index: usize) -> HarnessResult<()> {
        let mut state = self.state();
        let key = state.actionable(selector, index)?;
        state.history.push(format!("click:{key}"));
        state.react(&Trigger::Click(key));
        Ok(())
    }

    async fn fill(&self, selector: &Selector, index: usize, text: &str) -> HarnessResult<()> {
        let mut state = self.state();
        let key = state.actionable(selector, index)?;
        state.update(&key, |e| e.value = text.to_string());
        state.history.push(format!("fill:{key}={text}"));
        state.react(&Trigger::Fill(key));
        Ok(())
    }

    async fn select_option(
        &self,
        selector: &Selector,
        index: usize,
        value: &str,
    ) -> HarnessResult<()> {
        let mut state = self.state();
        let key = state.actionable(selector, index)?;
        state.update(&key, |e| e.value = value.to_string());
        state.history.push(format!("select:{key}={value}"));
        state.react(&Trigger::Fill(key));
        Ok(())
    }

    async fn press_key(&self, key: &str) -> HarnessResult<()> {
        let mut state = self.state();
        state.history.push(format!("press:{key}"));
        state.react(&Trigger::Press(key.to_string()));
        Ok(())
    }

    async fn inflight_requests(&self) -> HarnessResult<usize> {
        let mut state = self.state();
        state.advance();
        Ok(state.inflight)
    }

    async fn set_local_storage(&self, key: &str, value: &str) -> HarnessResult<()> {
        let mut state = self.state();
        state.history.push(format!("storage:{key}"));
        state.storage.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn add_cookie(&self, cookie: &BrowserCookie) -> HarnessResult<()> {
        let mut state = self.state();
        state.history.push(format!("cookie:{}", cookie.name));
        state.cookies.retain(|c| c.name != cookie.name);
        state.cookies.push(cookie.clone());
        Ok(())
    }

    async fn install_routes(&self, routes: SharedRouteTable) -> HarnessResult<()> {
        let mut state = self.state();
        state.history.push("install-routes".to_string());
        state.routes = Some(routes);
        Ok(())
    }

    async fn screenshot(&self, target: &ScreenshotTarget) -> HarnessResult<Vec<u8>> {
        let (width, height) = {
            let mut state = self.state();
            state.history.push("screenshot".to_string());
            if state.fail_screenshots {
                return Err(HarnessError::driver("screenshot failed: target closed"));
            }
            match target {
                ScreenshotTarget::FullPage => state.viewport,
                ScreenshotTarget::Element { selector, index } => {
                    state.actionable(selector, *index)?;
                    (120, 32)
                }
            }
        };
        render_png(width, height)
    }

    async fn close(&self) -> HarnessResult<()> {
        let mut state = self.state();
        state.history.push("close".to_string());
        state.closed += 1;
        state.routes = None;
        Ok(())
    }
}

/// Launches sessions backed by fresh [`MockDriver`]s from a factory
pub struct MockLauncher {
    factory: Box<dyn Fn() -> MockDriver + Send + Sync>,
    launched: Mutex<Vec<(SessionOptions, MockDriver)>>,
    fail_with: Option<String>,
}

impl MockLauncher {
    /// Launcher producing drivers from `factory`
    pub fn new(factory: impl Fn() -> MockDriver + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            launched: Mutex::new(Vec::new()),
            fail_with: None,
        }
    }

    /// Launcher whose every launch fails
    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::new(MockDriver::new)
        }
    }

    /// Drivers handed out so far, with the options they were launched with
    #[must_use]
    pub fn launched(&self) -> Vec<(SessionOptions, MockDriver)> {
        self.launched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for MockLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLauncher")
            .field("fail_with", &self.fail_with)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionLauncher for MockLauncher {
    async fn launch(&self, options: &SessionOptions) -> HarnessResult<Arc<dyn HarnessDriver>> {
        if let Some(message) = &self.fail_with {
            return Err(HarnessError::BrowserLaunch {
                message: message.clone(),
            });
        }
        let driver = (self.factory)();
        if let Some(viewport) = options.viewport {
            driver.state().viewport = (viewport.width.max(1), viewport.height.max(1));
        }
        self.launched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((options.clone(), driver.clone()));
        Ok(Arc::new(driver))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::network::{RouteMock, RouteTable, UrlPattern};

    const HOME: &str = "http://app.test/";

    fn next() -> Selector {
        Selector::role("button", "Próximo")
    }

    mod element_tests {
        use super::*;

        #[test]
        fn test_role_ignores_hidden() {
            let el = MockElement::button("next", "Próximo").mounted().hidden();
            assert!(!el.matches(&next()));
            assert!(el.matches(&Selector::text("Próximo")));
        }

        #[test]
        fn test_css_is_verbatim() {
            let el = MockElement::new("ed", "div").with_css(".tiptap");
            assert!(el.matches(&Selector::css(".tiptap")));
            assert!(!el.matches(&Selector::css("div")));
        }

        #[test]
        fn test_label_match() {
            let el = MockElement::textbox("email", "Endereço de Email");
            assert!(el.matches(&Selector::label("endereço de email")));
        }
    }

    mod driver_tests {
        use super::*;

        #[tokio::test]
        async fn test_unmounted_elements_are_invisible_to_queries() {
            let driver = MockDriver::new().with_element(MockElement::button("next", "Próximo"));
            assert!(driver.query_all(&next()).await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_click_runs_reactions() {
            let driver = MockDriver::new()
                .with_element(MockElement::button("next", "Próximo").mounted())
                .with_element(MockElement::heading("fin", "Finalização"))
                .on_click("next", vec![Effect::Mount("fin".into())]);
            driver.click(&next(), 0).await.unwrap();
            assert!(driver.element("fin").unwrap().mounted);
            assert!(driver.was_called("click:next"));
        }

        #[tokio::test]
        async fn test_disabled_click_is_rejected() {
            let driver = MockDriver::new()
                .with_element(MockElement::button("next", "Próximo").mounted().disabled());
            let err = driver.click(&next(), 0).await.unwrap_err();
            assert!(err.to_string().contains("not actionable"));
        }

        #[tokio::test]
        async fn test_delayed_effects_follow_ticks() {
            let driver = MockDriver::new()
                .with_element(MockElement::button("next", "Próximo").mounted().disabled())
                .on_load("/", vec![Effect::After(3, vec![Effect::Enable("next".into())])]);
            driver.navigate(HOME).await.unwrap();
            assert!(driver.query_all(&next()).await.unwrap()[0].disabled);
            assert!(driver.query_all(&next()).await.unwrap()[0].disabled);
            assert!(!driver.query_all(&next()).await.unwrap()[0].disabled);
        }

        #[tokio::test]
        async fn test_navigation_resets_page() {
            let driver = MockDriver::new()
                .with_element(MockElement::button("next", "Próximo"))
                .on_load("/a", vec![Effect::Mount("next".into())]);
            driver.navigate("http://app.test/a").await.unwrap();
            assert_eq!(driver.query_all(&next()).await.unwrap().len(), 1);
            driver.navigate("http://app.test/b").await.unwrap();
            assert!(driver.query_all(&next()).await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_request_uses_installed_routes() {
            let driver = MockDriver::new()
                .with_element(MockElement::text("ok", "ok"))
                .with_element(MockElement::text("err", "err"))
                .on_load(
                    "/",
                    vec![MockRequest::get("/api/auth/me")
                        .on_success(vec![Effect::Mount("ok".into())])
                        .on_failure(vec![Effect::Mount("err".into())])
                        .send()],
                );
            let routes = RouteTable::shared();
            lock_routes(&routes)
                .register(RouteMock::new(UrlPattern::glob("**/api/auth/me"), MockResponse::new()));
            driver.install_routes(routes.clone()).await.unwrap();
            driver.navigate(HOME).await.unwrap();
            assert_eq!(driver.inflight_requests().await.unwrap(), 0);
            assert!(driver.element("ok").unwrap().mounted);
            assert_eq!(driver.requests()[0].1, RequestFate::Mocked(200));
            assert_eq!(lock_routes(&routes).hits(&UrlPattern::glob("**/api/auth/me")), 1);
        }

        #[tokio::test]
        async fn test_unserved_request_is_refused() {
            let driver = MockDriver::new()
                .with_element(MockElement::text("err", "err"))
                .on_load(
                    "/",
                    vec![MockRequest::get("/api/auth/me")
                        .on_failure(vec![Effect::Mount("err".into())])
                        .send()],
                );
            driver.navigate(HOME).await.unwrap();
            driver.current_url().await.unwrap();
            assert!(driver.element("err").unwrap().mounted);
            assert_eq!(driver.requests()[0].1, RequestFate::Refused);
        }

        #[tokio::test]
        async fn test_live_endpoint_latency_keeps_request_inflight() {
            let driver = MockDriver::new()
                .with_endpoint(HttpMethod::Get, "/api/slow", MockResponse::new(), 3)
                .on_load("/", vec![MockRequest::get("/api/slow").send()]);
            driver.navigate(HOME).await.unwrap();
            assert_eq!(driver.inflight_requests().await.unwrap(), 1);
            assert_eq!(driver.inflight_requests().await.unwrap(), 1);
            assert_eq!(driver.inflight_requests().await.unwrap(), 0);
        }

        #[tokio::test]
        async fn test_request_body_from_fields() {
            let driver = MockDriver::new()
                .with_element(MockElement::textbox("email", "Email").mounted())
                .with_element(MockElement::button("send", "Enviar").mounted())
                .on_click(
                    "send",
                    vec![MockRequest::post("/api/auth/send-otp").field("email", "email").send()],
                );
            driver.navigate(HOME).await.unwrap();
            driver.fill(&Selector::label("Email"), 0, "a@b.c").await.unwrap();
            driver.click(&Selector::role("button", "Enviar"), 0).await.unwrap();
            let (request, _) = driver.requests().remove(0);
            let body: serde_json::Value = request.body_json().unwrap();
            assert_eq!(body["email"], "a@b.c");
            assert_eq!(request.url, "http://app.test/api/auth/send-otp");
        }

        #[tokio::test]
        async fn test_storage_branch_on_load() {
            let driver = MockDriver::new()
                .with_element(MockElement::new("header", "header").with_css("header"))
                .on_load(
                    "/",
                    vec![Effect::IfStorage {
                        key: "user".into(),
                        then: vec![Effect::Mount("header".into())],
                        otherwise: vec![Effect::SetUrl("/login".into())],
                    }],
                );
            driver.navigate(HOME).await.unwrap();
            assert_eq!(driver.url(), "http://app.test/login");
            driver.set_local_storage("user", "{}").await.unwrap();
            driver.navigate(HOME).await.unwrap();
            assert_eq!(driver.url(), HOME);
            assert!(driver.element("header").unwrap().mounted);
        }

        #[tokio::test]
        async fn test_screenshot_is_png_of_viewport() {
            let driver = MockDriver::new().with_viewport(375, 667);
            let bytes = driver.screenshot(&ScreenshotTarget::FullPage).await.unwrap();
            let decoded = image::load_from_memory(&bytes).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (375, 667));
            driver.set_fail_screenshots(true);
            assert!(driver.screenshot(&ScreenshotTarget::FullPage).await.is_err());
        }
    }

    mod launcher_tests {
        use super::*;
        use crate::session::Viewport;

        #[tokio::test]
        async fn test_launch_applies_viewport() {
            let launcher = MockLauncher::new(MockDriver::new);
            let options = SessionOptions::default().with_viewport(Viewport::new(375, 667));
            let driver = launcher.launch(&options).await.unwrap();
            let png = driver.screenshot(&ScreenshotTarget::FullPage).await.unwrap();
            let decoded = image::load_from_memory(&png).unwrap();
            assert_eq!(decoded.width(), 375);
            assert_eq!(launcher.launched().len(), 1);
        }

        #[tokio::test]
        async fn test_failing_launcher() {
            let launcher = MockLauncher::failing("no chromium");
            let err = launcher.launch(&SessionOptions::default()).await.unwrap_err();
            assert!(matches!(err, HarnessError::BrowserLaunch { .. }));
        }
    }
}
