//! Locator abstraction for element selection.
//!
//! Locators are strict: resolving one that matches zero or several elements is
//! a [`HarnessError::Resolution`]. A scenario opts out explicitly with
//! [`Locator::first`] or [`Locator::nth`].
//!
//! Selectors are polymorphic over role+name, text, label, test id and CSS, so
//! the same control can be described whichever way the target page exposes it.
//! Locators never wait; waiting is the job of [`crate::wait`].

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::driver::{ElementSnapshot, HarnessDriver};
use crate::result::{HarnessError, HarnessResult};

/// How a piece of visible text is compared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TextMatch {
    /// Whitespace-normalized equality
    Exact(String),
    /// Case-insensitive substring
    Contains(String),
    /// Case-insensitive regular expression
    Pattern(String),
}

impl TextMatch {
    /// Exact match
    #[must_use]
    pub fn exact(text: impl Into<String>) -> Self {
        Self::Exact(text.into())
    }

    /// Case-insensitive substring match
    #[must_use]
    pub fn contains(text: impl Into<String>) -> Self {
        Self::Contains(text.into())
    }

    /// Case-insensitive regex match
    #[must_use]
    pub fn pattern(regex: impl Into<String>) -> Self {
        Self::Pattern(regex.into())
    }

    /// Check a candidate string
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        let candidate = normalize(candidate);
        match self {
            Self::Exact(expected) => candidate == normalize(expected),
            Self::Contains(needle) => candidate
                .to_lowercase()
                .contains(&normalize(needle).to_lowercase()),
            Self::Pattern(source) => RegexBuilder::new(source)
                .case_insensitive(true)
                .build()
                .map(|re| re.is_match(&candidate))
                .unwrap_or(false),
        }
    }
}

impl From<&str> for TextMatch {
    fn from(text: &str) -> Self {
        Self::Contains(text.to_string())
    }
}

impl From<String> for TextMatch {
    fn from(text: String) -> Self {
        Self::Contains(text)
    }
}

impl fmt::Display for TextMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(text) => write!(f, "={text:?}"),
            Self::Contains(text) => write!(f, "~{text:?}"),
            Self::Pattern(source) => write!(f, "=/{source}/i"),
        }
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Selector {
    /// ARIA role (explicit or implicit) with an optional accessible name
    Role {
        /// Role name, e.g. `button`, `heading`, `textbox`
        role: String,
        /// Accessible name filter
        #[serde(default)]
        name: Option<TextMatch>,
    },
    /// Innermost element whose text matches
    Text {
        /// Text filter
        text: TextMatch,
    },
    /// Form control (or aria-labelled element) by its label
    Label {
        /// Label filter
        label: TextMatch,
    },
    /// `data-testid` attribute
    TestId {
        /// Test id value
        id: String,
    },
    /// CSS selector
    Css {
        /// CSS selector string
        css: String,
    },
    /// CSS selector filtered by text content
    CssWithText {
        /// CSS selector string
        css: String,
        /// Text filter
        text: TextMatch,
    },
}

impl Selector {
    /// Role with accessible name
    #[must_use]
    pub fn role(role: impl Into<String>, name: impl Into<TextMatch>) -> Self {
        Self::Role {
            role: role.into(),
            name: Some(name.into()),
        }
    }

    /// Any element with the role
    #[must_use]
    pub fn role_any(role: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: None,
        }
    }

    /// Text selector
    #[must_use]
    pub fn text(text: impl Into<TextMatch>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Label selector
    #[must_use]
    pub fn label(label: impl Into<TextMatch>) -> Self {
        Self::Label {
            label: label.into(),
        }
    }

    /// Test id selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId { id: id.into() }
    }

    /// CSS selector
    #[must_use]
    pub fn css(css: impl Into<String>) -> Self {
        Self::Css { css: css.into() }
    }

    /// CSS selector with text filter
    #[must_use]
    pub fn css_with_text(css: impl Into<String>, text: impl Into<TextMatch>) -> Self {
        Self::CssWithText {
            css: css.into(),
            text: text.into(),
        }
    }

    /// Expression evaluating to the array of matching DOM elements
    pub fn to_query_js(&self) -> HarnessResult<String> {
        let query = serde_json::to_string(self)?;
        Ok(format!("({QUERY_RUNTIME_JS})({query})"))
    }

    /// Expression evaluating to an array of [`ElementSnapshot`]s
    pub fn to_snapshot_js(&self) -> HarnessResult<String> {
        Ok(format!(
            "(() => {{ const els = {}; return els.map({SNAPSHOT_JS}); }})()",
            self.to_query_js()?
        ))
    }

    /// Expression that tags the `index`th match with `token` and scrolls it
    /// into view, returning whether the element existed
    pub fn to_target_js(&self, index: usize, token: &str) -> HarnessResult<String> {
        Ok(format!(
            "(() => {{ const el = {}[{index}]; if (!el) return false; \
             document.querySelectorAll('[{TARGET_ATTRIBUTE}]') \
             .forEach((t) => t.removeAttribute('{TARGET_ATTRIBUTE}')); \
             el.setAttribute('{TARGET_ATTRIBUTE}', {token:?}); \
             el.scrollIntoView({{ block: 'center', inline: 'center' }}); return true; }})()",
            self.to_query_js()?
        ))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role { role, name: Some(name) } => write!(f, "role={role}[name{name}]"),
            Self::Role { role, name: None } => write!(f, "role={role}"),
            Self::Text { text } => write!(f, "text{text}"),
            Self::Label { label } => write!(f, "label{label}"),
            Self::TestId { id } => write!(f, "testid={id}"),
            Self::Css { css } => write!(f, "css={css}"),
            Self::CssWithText { css, text } => write!(f, "css={css} >> text{text}"),
        }
    }
}

/// Attribute used to hand a resolved element over to native CDP actions
pub const TARGET_ATTRIBUTE: &str = "data-briefcheck-target";

const QUERY_RUNTIME_JS: &str = r#"(query) => {
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
  const textOk = (m, value) => {
    if (!m) return true;
    const v = norm(value);
    if (m.kind === 'exact') return v === norm(m.value);
    if (m.kind === 'contains') return v.toLowerCase().includes(norm(m.value).toLowerCase());
    if (m.kind === 'pattern') {
      try { return new RegExp(m.value, 'i').test(v); } catch (e) { return false; }
    }
    return false;
  };
  const hidden = (el) => {
    if (el.closest('[aria-hidden="true"]')) return true;
    const s = window.getComputedStyle(el);
    return s.display === 'none' || s.visibility === 'hidden';
  };
  const roleOf = (el) => {
    const explicit = el.getAttribute('role');
    if (explicit) return explicit.split(' ')[0];
    const tag = el.tagName.toLowerCase();
    if (tag === 'button') return 'button';
    if (tag === 'a' && el.hasAttribute('href')) return 'link';
    if (/^h[1-6]$/.test(tag)) return 'heading';
    if (tag === 'textarea') return 'textbox';
    if (tag === 'select') return 'combobox';
    if (tag === 'dialog') return 'dialog';
    if (tag === 'input') {
      const t = (el.getAttribute('type') || 'text').toLowerCase();
      if (['button', 'submit', 'reset', 'image'].includes(t)) return 'button';
      if (t === 'checkbox' || t === 'radio') return t;
      const typed = ['text', 'email', 'password', 'search', 'tel', 'url', 'number'];
      if (typed.includes(t)) return 'textbox';
      return null;
    }
    const nestedEditable = el.parentElement && el.parentElement.isContentEditable;
    if (el.isContentEditable && !nestedEditable) return 'textbox';
    return null;
  };
  const labelText = (el) => {
    const parts = [];
    const aria = el.getAttribute('aria-label');
    if (aria) parts.push(aria);
    const by = el.getAttribute('aria-labelledby');
    if (by) {
      by.split(/\s+/).forEach((id) => {
        const n = document.getElementById(id);
        if (n) parts.push(n.textContent);
      });
    }
    if (el.labels) Array.from(el.labels).forEach((l) => parts.push(l.textContent));
    return norm(parts.join(' '));
  };
  const nameOf = (el) => {
    const label = labelText(el);
    if (label) return label;
    const role = roleOf(el);
    if (el.tagName.toLowerCase() === 'input' && role === 'button') return norm(el.value);
    if (role === 'textbox' || role === 'combobox') {
      return norm(el.getAttribute('placeholder') || el.getAttribute('title'));
    }
    return norm(el.textContent || el.getAttribute('title'));
  };
  const all = () => Array.from(document.querySelectorAll('body *'));
  switch (query.by) {
    case 'css': return Array.from(document.querySelectorAll(query.css));
    case 'css_with_text':
      return Array.from(document.querySelectorAll(query.css))
        .filter((el) => textOk(query.text, el.textContent));
    case 'test_id': return all().filter((el) => el.getAttribute('data-testid') === query.id);
    case 'role':
      return all().filter((el) =>
        roleOf(el) === query.role && !hidden(el) && textOk(query.name, nameOf(el)));
    case 'label':
      return all().filter((el) =>
        el.tagName.toLowerCase() !== 'label'
        && labelText(el) !== ''
        && textOk(query.label, labelText(el)));
    case 'text': {
      const skipped = ['script', 'style', 'noscript'];
      const hits = all().filter((el) =>
        !skipped.includes(el.tagName.toLowerCase()) && textOk(query.text, el.textContent));
      return hits.filter((el) => !hits.some((other) => other !== el && el.contains(other)));
    }
  }
  return [];
}"#;

const SNAPSHOT_JS: &str = r#"(el) => {
  const r = el.getBoundingClientRect();
  const s = window.getComputedStyle(el);
  return {
    tag: el.tagName.toLowerCase(),
    text: (el.innerText || el.textContent || '').replace(/\s+/g, ' ').trim().slice(0, 200),
    width: r.width,
    height: r.height,
    visible: s.display !== 'none'
      && s.visibility !== 'hidden'
      && !el.closest('[aria-hidden="true"]'),
    disabled: el.disabled === true
      || el.getAttribute('aria-disabled') === 'true'
      || !!el.closest('fieldset[disabled]')
  };
}"#;

/// Which of the matching elements a locator addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Exactly one match required
    Strict,
    /// First match in document order
    First,
    /// Zero-based index in document order
    Nth(usize),
}

/// Outcome of looking a locator up once, without failing on absence
#[derive(Debug, Clone, PartialEq)]
pub enum Probe {
    /// Nothing addressed by the locator is attached
    Missing,
    /// A strict locator matched several elements
    Ambiguous(usize),
    /// The addressed element
    Found(Resolved),
}

/// A resolved element: its index among the selector's matches and a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// Index among all matches of the selector
    pub index: usize,
    /// State at resolution time
    pub element: ElementSnapshot,
}

/// A strict element locator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    selector: Selector,
    scope: Scope,
}

impl Locator {
    /// Strict locator for a selector
    #[must_use]
    pub const fn new(selector: Selector) -> Self {
        Self {
            selector,
            scope: Scope::Strict,
        }
    }

    /// Locate by role and accessible name
    #[must_use]
    pub fn role(role: impl Into<String>, name: impl Into<TextMatch>) -> Self {
        Self::new(Selector::role(role, name))
    }

    /// Locate by text
    #[must_use]
    pub fn text(text: impl Into<TextMatch>) -> Self {
        Self::new(Selector::text(text))
    }

    /// Locate by label
    #[must_use]
    pub fn label(label: impl Into<TextMatch>) -> Self {
        Self::new(Selector::label(label))
    }

    /// Locate by test id
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::new(Selector::test_id(id))
    }

    /// Locate by CSS
    #[must_use]
    pub fn css(css: impl Into<String>) -> Self {
        Self::new(Selector::css(css))
    }

    /// Address the first match instead of requiring a single one
    #[must_use]
    pub fn first(mut self) -> Self {
        self.scope = Scope::First;
        self
    }

    /// Address the `n`th match (zero-based)
    #[must_use]
    pub fn nth(mut self, n: usize) -> Self {
        self.scope = Scope::Nth(n);
        self
    }

    /// Get the selector
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Get the scope
    #[must_use]
    pub const fn scope(&self) -> Scope {
        self.scope
    }

    /// Whether the locator requires a unique match
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        matches!(self.scope, Scope::Strict)
    }

    /// Classify a set of matches according to the scope
    #[must_use]
    pub fn classify(&self, matches: Vec<ElementSnapshot>) -> Probe {
        let index = match self.scope {
            Scope::Strict if matches.len() > 1 => return Probe::Ambiguous(matches.len()),
            Scope::Strict | Scope::First => 0,
            Scope::Nth(n) => n,
        };
        matches
            .into_iter()
            .nth(index)
            .map_or(Probe::Missing, |element| Probe::Found(Resolved { index, element }))
    }

    /// Look the locator up once
    pub async fn probe(&self, driver: &dyn HarnessDriver) -> HarnessResult<Probe> {
        let matches = driver.query_all(&self.selector).await?;
        Ok(self.classify(matches))
    }

    /// Resolve to exactly the addressed element, failing on absence or ambiguity
    pub async fn resolve(&self, driver: &dyn HarnessDriver) -> HarnessResult<Resolved> {
        match self.probe(driver).await? {
            Probe::Found(resolved) => Ok(resolved),
            Probe::Missing => Err(HarnessError::Resolution {
                locator: self.to_string(),
                found: 0,
            }),
            Probe::Ambiguous(found) => Err(HarnessError::Resolution {
                locator: self.to_string(),
                found,
            }),
        }
    }
}

impl From<Selector> for Locator {
    fn from(selector: Selector) -> Self {
        Self::new(selector)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            Scope::Strict => write!(f, "{}", self.selector),
            Scope::First => write!(f, "{} >> first", self.selector),
            Scope::Nth(n) => write!(f, "{} >> nth={n}", self.selector),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn snapshot(text: &str) -> ElementSnapshot {
        ElementSnapshot {
            tag: "button".to_string(),
            text: text.to_string(),
            width: 80.0,
            height: 24.0,
            visible: true,
            disabled: false,
        }
    }

    mod text_match_tests {
        use super::*;

        #[test]
        fn test_contains_is_case_insensitive() {
            let m = TextMatch::contains("revisar com ia");
            assert!(m.matches("✨ Revisar com IA"));
            assert!(!m.matches("Revisão"));
        }

        #[test]
        fn test_contains_handles_accented_case() {
            assert!(TextMatch::contains("PRÓXIMO").matches("próximo"));
        }

        #[test]
        fn test_exact_normalizes_whitespace() {
            let m = TextMatch::exact("Salvar");
            assert!(m.matches("  Salvar\n"));
            assert!(!m.matches("Salvar Briefing"));
        }

        #[test]
        fn test_pattern_tolerates_missing_diacritics() {
            let m = TextMatch::pattern("Enviar C[oó]digo");
            assert!(m.matches("Enviar Código OTP"));
            assert!(m.matches("enviar codigo de acesso"));
        }

        #[test]
        fn test_invalid_pattern_never_matches() {
            assert!(!TextMatch::pattern("(unclosed").matches("(unclosed"));
        }

        #[test]
        fn test_str_defaults_to_contains() {
            assert_eq!(TextMatch::from("Sugerir"), TextMatch::Contains("Sugerir".into()));
        }
    }

    mod selector_tests {
        use super::*;

        #[test]
        fn test_display_forms() {
            assert_eq!(
                Selector::role("button", TextMatch::exact("Salvar")).to_string(),
                "role=button[name=\"Salvar\"]"
            );
            assert_eq!(Selector::role_any("textbox").to_string(), "role=textbox");
            assert_eq!(Selector::css(".tiptap").to_string(), "css=.tiptap");
            assert_eq!(Selector::test_id("save").to_string(), "testid=save");
        }

        #[test]
        fn test_serialized_shape_for_runtime() {
            let json = serde_json::to_value(Selector::role("heading", "Finalização")).unwrap();
            assert_eq!(json["by"], "role");
            assert_eq!(json["role"], "heading");
            assert_eq!(json["name"]["kind"], "contains");
            assert_eq!(json["name"]["value"], "Finalização");
        }

        #[test]
        fn test_deserializes_from_yaml() {
            let yaml = "by: label\nlabel:\n  kind: exact\n  value: Nome do Briefing\n";
            let selector: Selector = serde_yaml_ng::from_str(yaml).unwrap();
            assert_eq!(selector, Selector::label(TextMatch::exact("Nome do Briefing")));
        }

        #[test]
        fn test_query_js_embeds_selector() {
            let js = Selector::css(".MuiAccordionSummary-root").to_query_js().unwrap();
            assert!(js.contains("\"by\":\"css\""));
            assert!(js.contains(".MuiAccordionSummary-root"));
        }

        #[test]
        fn test_target_js_uses_index_and_token() {
            let js = Selector::text("Sugerir").to_target_js(3, "tok-1").unwrap();
            assert!(js.contains("[3]"));
            assert!(js.contains("\"tok-1\""));
            assert!(js.contains(TARGET_ATTRIBUTE));
        }
    }

    mod scope_tests {
        use super::*;

        #[test]
        fn test_strict_rejects_many() {
            let loc = Locator::role("button", "Sugerir");
            let probe = loc.classify(vec![snapshot("Sugerir"), snapshot("Sugerir")]);
            assert_eq!(probe, Probe::Ambiguous(2));
        }

        #[test]
        fn test_first_accepts_many() {
            let loc = Locator::role("button", "Sugerir").first();
            match loc.classify(vec![snapshot("a"), snapshot("b")]) {
                Probe::Found(resolved) => {
                    assert_eq!(resolved.index, 0);
                    assert_eq!(resolved.element.text, "a");
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        #[test]
        fn test_nth_out_of_range_is_missing() {
            let loc = Locator::css(".MuiAccordionSummary-root").nth(2);
            assert_eq!(loc.classify(vec![snapshot("a")]), Probe::Missing);
        }

        #[test]
        fn test_empty_is_missing() {
            assert_eq!(Locator::text("nada").classify(Vec::new()), Probe::Missing);
        }

        #[test]
        fn test_display_includes_scope() {
            assert_eq!(Locator::css("header").first().to_string(), "css=header >> first");
            assert_eq!(Locator::css("header").nth(1).to_string(), "css=header >> nth=1");
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_contains_ignores_case(
                needle in "[a-zA-Z]{1,12}",
                pre in "[a-z ]{0,8}",
                post in "[a-z ]{0,8}"
            ) {
                let haystack = format!("{pre}{needle}{post}");
                prop_assert!(TextMatch::contains(needle.to_uppercase()).matches(&haystack));
                prop_assert!(TextMatch::contains(needle.to_lowercase()).matches(&haystack));
            }

            #[test]
            fn prop_exact_matches_itself(text in "[a-zA-Z0-9]{1,10}( [a-zA-Z0-9]{1,10}){0,3}") {
                let padded = format!("  {} ", text);
                prop_assert!(TextMatch::exact(text.clone()).matches(&padded));
            }
        }
    }
}
