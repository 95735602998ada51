//! Network request interception.
//!
//! Route mocks short-circuit matching requests with a canned response; every
//! other request passes through to the real backend untouched. Interception
//! itself never fails: a route that should have been hit but was not is
//! surfaced afterwards through [`RouteTable::unmet_expectations`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::result::{HarnessError, HarnessResult};

/// Passthrough requests kept for diagnostics
const PASSTHROUGH_HISTORY: usize = 256;

/// HTTP methods for request matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    /// GET request
    Get,
    /// POST request
    Post,
    /// PUT request
    Put,
    /// DELETE request
    Delete,
    /// PATCH request
    Patch,
    /// HEAD request
    Head,
    /// OPTIONS request
    Options,
    /// Any method
    Any,
}

impl HttpMethod {
    /// Parse from a wire method name; unknown names become `Any`
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "PATCH" => Self::Patch,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            _ => Self::Any,
        }
    }

    /// Convert to string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Any => "*",
        }
    }

    /// Check if this method matches another
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        *self == Self::Any || *other == Self::Any || *self == *other
    }
}

/// A mocked HTTP response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockResponse {
    /// HTTP status code
    pub status: u16,
    /// Extra response headers
    pub headers: HashMap<String, String>,
    /// Response body
    pub body: Vec<u8>,
    /// Content type
    pub content_type: String,
    /// Artificial delay in milliseconds
    pub delay_ms: u64,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: Vec::new(),
            content_type: "application/json".to_string(),
            delay_ms: 0,
        }
    }
}

impl MockResponse {
    /// Create an empty 200 response
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a 200 JSON response
    pub fn json<T: Serialize>(data: &T) -> HarnessResult<Self> {
        Ok(Self {
            body: serde_json::to_vec(data)?,
            ..Self::default()
        })
    }

    /// Create a 200 JSON response from an already built value
    #[must_use]
    pub fn json_value(value: &serde_json::Value) -> Self {
        Self {
            body: value.to_string().into_bytes(),
            ..Self::default()
        }
    }

    /// Create a text response
    #[must_use]
    pub fn text(content: &str) -> Self {
        Self {
            body: content.as_bytes().to_vec(),
            content_type: "text/plain".to_string(),
            ..Self::default()
        }
    }

    /// Create an error response with a `{"error": message}` body
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: serde_json::json!({ "error": message }).to_string().into_bytes(),
            ..Self::default()
        }
    }

    /// Set status code
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    /// Set delay
    #[must_use]
    pub const fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Whether the status is 2xx
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Get body as string
    #[must_use]
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

/// Pattern for matching request URLs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlPattern {
    /// Exact URL match
    Exact(String),
    /// URL path component equality, ignoring origin, query and fragment
    Path(String),
    /// Prefix match
    Prefix(String),
    /// Contains substring
    Contains(String),
    /// Regex match
    Regex(String),
    /// Glob pattern; `**` crosses `/`, `*` does not
    Glob(String),
    /// Match any URL
    Any,
}

impl UrlPattern {
    /// Glob pattern, e.g. `**/api/auth/me`
    #[must_use]
    pub fn glob(pattern: impl Into<String>) -> Self {
        Self::Glob(pattern.into())
    }

    /// Path equality pattern, e.g. `/login`
    #[must_use]
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    /// Check if a URL matches this pattern
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Exact(pattern) => url == pattern,
            Self::Path(path) => path_of(url) == path.as_str(),
            Self::Prefix(pattern) => url.starts_with(pattern.as_str()),
            Self::Contains(pattern) => url.contains(pattern.as_str()),
            Self::Regex(pattern) => regex::Regex::new(pattern)
                .map(|re| re.is_match(url))
                .unwrap_or(false),
            Self::Glob(pattern) => {
                glob_matches(pattern, url) || glob_matches(pattern, strip_query(url))
            }
            Self::Any => true,
        }
    }

    /// The last literal path segment, used to spot near misses
    fn key_segment(&self) -> Option<&str> {
        let text = match self {
            Self::Any | Self::Regex(_) => return None,
            Self::Exact(s)
            | Self::Path(s)
            | Self::Prefix(s)
            | Self::Contains(s)
            | Self::Glob(s) => s.as_str(),
        };
        text.split('/')
            .rev()
            .map(|segment| segment.trim_matches('*'))
            .find(|segment| !segment.is_empty())
    }
}

impl From<&str> for UrlPattern {
    /// Strings containing `*` are globs, anything else a substring
    fn from(pattern: &str) -> Self {
        if pattern.contains('*') {
            Self::Glob(pattern.to_string())
        } else {
            Self::Contains(pattern.to_string())
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(s) | Self::Prefix(s) | Self::Contains(s) | Self::Glob(s) => {
                write!(f, "{s}")
            }
            Self::Path(s) => write!(f, "path {s}"),
            Self::Regex(s) => write!(f, "/{s}/"),
            Self::Any => write!(f, "*"),
        }
    }
}

fn glob_matches(pattern: &str, url: &str) -> bool {
    let mut source = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '*' {
            if chars.peek() == Some(&'*') {
                chars.next();
                source.push_str(".*");
            } else {
                source.push_str("[^/]*");
            }
        } else {
            source.push_str(&regex::escape(&c.to_string()));
        }
    }
    source.push('$');
    regex::Regex::new(&source)
        .map(|re| re.is_match(url))
        .unwrap_or(false)
}

fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

/// Path component of a URL (`/` when the URL has none)
#[must_use]
pub fn path_of(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let rest = strip_query(rest);
    if url.contains("://") {
        rest.find('/').map_or("/", |idx| &rest[idx..])
    } else if rest.is_empty() {
        "/"
    } else {
        rest
    }
}

/// A request seen by the interception layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptedRequest {
    /// Full request URL
    pub url: String,
    /// Request method
    pub method: HttpMethod,
    /// Request body, when the browser exposes one
    pub body: Option<String>,
}

impl InterceptedRequest {
    /// Create a request record
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            body: None,
        }
    }

    /// Attach a body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// URL path component
    #[must_use]
    pub fn path(&self) -> &str {
        path_of(&self.url)
    }

    /// Parse the body as JSON
    pub fn body_json<T: for<'de> Deserialize<'de>>(&self) -> HarnessResult<T> {
        let body = self
            .body
            .as_deref()
            .ok_or_else(|| HarnessError::assertion(format!("{} has no body", self.url)))?;
        Ok(serde_json::from_str(body)?)
    }
}

/// Produces the response for an intercepted request
#[derive(Clone)]
pub enum Responder {
    /// Same response every time
    Static(MockResponse),
    /// Response computed from the request
    Dynamic(Arc<dyn Fn(&InterceptedRequest) -> MockResponse + Send + Sync>),
}

impl Responder {
    /// Wrap a closure
    pub fn from_fn(
        f: impl Fn(&InterceptedRequest) -> MockResponse + Send + Sync + 'static,
    ) -> Self {
        Self::Dynamic(Arc::new(f))
    }

    /// Produce the response for a request
    #[must_use]
    pub fn respond(&self, request: &InterceptedRequest) -> MockResponse {
        match self {
            Self::Static(response) => response.clone(),
            Self::Dynamic(f) => f(request),
        }
    }
}

impl From<MockResponse> for Responder {
    fn from(response: MockResponse) -> Self {
        Self::Static(response)
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(response) => f.debug_tuple("Static").field(&response.status).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// A route mock registered on a session
#[derive(Debug, Clone)]
pub struct RouteMock {
    /// URL pattern
    pub pattern: UrlPattern,
    /// Method filter
    pub method: HttpMethod,
    /// Response producer
    pub responder: Responder,
    /// Whether going unhit should be reported as a mock miss
    pub expect_hit: bool,
    hits: usize,
}

impl RouteMock {
    /// Mock any method on a pattern
    #[must_use]
    pub fn new(pattern: UrlPattern, responder: impl Into<Responder>) -> Self {
        Self {
            pattern,
            method: HttpMethod::Any,
            responder: responder.into(),
            expect_hit: false,
            hits: 0,
        }
    }

    /// Restrict to one method
    #[must_use]
    pub const fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Report a mock miss if the route is never hit
    #[must_use]
    pub const fn expect_hit(mut self) -> Self {
        self.expect_hit = true;
        self
    }

    /// Times the route answered a request
    #[must_use]
    pub const fn hits(&self) -> usize {
        self.hits
    }

    /// Check if the route applies to a request
    #[must_use]
    pub fn matches(&self, request: &InterceptedRequest) -> bool {
        self.method.matches(&request.method) && self.pattern.matches(&request.url)
    }

    fn same_route(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.method == other.method
    }
}

impl fmt::Display for RouteMock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method.as_str(), self.pattern)
    }
}

/// Per-session route mocks plus a record of observed traffic
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<RouteMock>,
    intercepted: Vec<InterceptedRequest>,
    passthrough: Vec<InterceptedRequest>,
}

/// Route table shared between a session and its driver's interception task
pub type SharedRouteTable = Arc<Mutex<RouteTable>>;

/// Lock a shared route table, recovering from a poisoned lock
pub fn lock_routes(table: &SharedRouteTable) -> MutexGuard<'_, RouteTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RouteTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty shared table
    #[must_use]
    pub fn shared() -> SharedRouteTable {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Register a route; re-registering the same pattern and method replaces
    /// the earlier mock in place
    pub fn register(&mut self, route: RouteMock) {
        if let Some(existing) = self.routes.iter_mut().find(|r| r.same_route(&route)) {
            *existing = route;
        } else {
            self.routes.push(route);
        }
    }

    /// Answer a request from the first matching route, or record it as passthrough
    pub fn intercept(&mut self, request: InterceptedRequest) -> Option<MockResponse> {
        let Some(route) = self.routes.iter_mut().find(|r| r.matches(&request)) else {
            if self.passthrough.len() == PASSTHROUGH_HISTORY {
                self.passthrough.remove(0);
            }
            self.passthrough.push(request);
            return None;
        };
        route.hits += 1;
        let response = route.responder.respond(&request);
        tracing::debug!(
            route = %route,
            url = %request.url,
            status = response.status,
            "request fulfilled by route mock"
        );
        self.intercepted.push(request);
        Some(response)
    }

    /// Registered routes in priority order
    #[must_use]
    pub fn routes(&self) -> &[RouteMock] {
        &self.routes
    }

    /// Requests answered by a mock
    #[must_use]
    pub fn intercepted(&self) -> &[InterceptedRequest] {
        &self.intercepted
    }

    /// Requests that went to the real backend
    #[must_use]
    pub fn passthrough(&self) -> &[InterceptedRequest] {
        &self.passthrough
    }

    /// Total hits for every route registered with this pattern
    #[must_use]
    pub fn hits(&self, pattern: &UrlPattern) -> usize {
        self.routes
            .iter()
            .filter(|r| &r.pattern == pattern)
            .map(RouteMock::hits)
            .sum()
    }

    /// Expected routes that never answered anything
    #[must_use]
    pub fn unmet_expectations(&self) -> Vec<HarnessError> {
        self.routes
            .iter()
            .filter(|r| r.expect_hit && r.hits == 0)
            .map(|r| HarnessError::MockMiss {
                pattern: r.to_string(),
                near_misses: self.near_misses(&r.pattern),
            })
            .collect()
    }

    fn near_misses(&self, pattern: &UrlPattern) -> Vec<String> {
        let Some(key) = pattern.key_segment() else {
            return Vec::new();
        };
        self.passthrough
            .iter()
            .filter(|req| req.url.contains(key))
            .map(|req| format!("{} {}", req.method.as_str(), req.url))
            .collect()
    }

    /// Number of registered routes
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no routes are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
