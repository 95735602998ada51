//! Wizard navigation: steps and strict element actions.
//!
//! [`WizardNavigator`] turns a [`Control`] or [`Locator`] into exactly one
//! element and acts on it. It never waits: whatever made the element ready
//! must already have been observed through [`crate::wait`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::debug;

use crate::locator::Locator;
use crate::result::HarnessResult;
use crate::session::Session;
use crate::vocabulary::{Control, Vocabulary};

// =============================================================================
// STEPS
// =============================================================================

/// A named position in the application's workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Authenticated landing page
    Landing,
    /// Signup form
    Signup,
    /// Login form, email not yet submitted
    Login,
    /// Email submitted, OTP requested
    OtpPending,
    /// Wizard edit step, free text mode
    WizardEditText,
    /// Wizard edit step, sections mode
    WizardEditSections,
    /// Wizard review step, revision not requested yet
    WizardReview,
    /// Revision arrived and is editable
    WizardRevised,
    /// Finalize step
    WizardFinalize,
    /// Save dialog open
    SaveDialog,
    /// Briefing template editor
    TemplateEditor,
    /// Settings panel open
    Settings,
}

impl Step {
    /// Control whose visibility identifies the step
    #[must_use]
    pub const fn marker(self) -> Control {
        match self {
            Self::Landing => Control::MainHeader,
            Self::Signup => Control::SignupSubmit,
            Self::Login => Control::SendOtp,
            Self::OtpPending => Control::OtpField,
            Self::WizardEditText => Control::TextModeHeading,
            Self::WizardEditSections => Control::SectionsModeHeading,
            Self::WizardReview => Control::ReviseWithAi,
            Self::WizardRevised => Control::RevisedHeading,
            Self::WizardFinalize => Control::FinalizeStep,
            Self::SaveDialog => Control::SaveDialogHeading,
            Self::TemplateEditor => Control::TemplateHeading,
            Self::Settings => Control::GeminiPanel,
        }
    }

    /// Steps normally reachable from this one
    #[must_use]
    pub const fn successors(self) -> &'static [Self] {
        match self {
            Self::Landing => &[
                Self::Settings,
                Self::TemplateEditor,
                Self::WizardEditText,
                Self::WizardEditSections,
            ],
            Self::Signup => &[Self::Login],
            Self::Login => &[Self::OtpPending],
            Self::OtpPending => &[Self::Landing],
            Self::WizardEditText | Self::WizardEditSections => &[Self::WizardReview],
            Self::WizardReview => &[Self::WizardRevised],
            Self::WizardRevised => &[Self::WizardFinalize, Self::SaveDialog],
            Self::WizardFinalize => &[Self::SaveDialog],
            Self::SaveDialog => &[Self::Landing],
            Self::TemplateEditor | Self::Settings => &[],
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One step entry as seen by a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step entered
    pub step: Step,
    /// Milliseconds since the tracker started
    pub entered_at_ms: u64,
    /// Whether the previous step lists this one as a successor
    pub expected: bool,
}

/// Records the steps a scenario passes through.
///
/// Purely informational: an unexpected transition is logged, never rejected.
#[derive(Debug, Clone)]
pub struct StepTracker {
    started: Instant,
    records: Vec<StepRecord>,
}

impl Default for StepTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StepTracker {
    /// Empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            records: Vec::new(),
        }
    }

    /// Record entering `step`, which exits the current one
    pub fn enter(&mut self, step: Step) {
        let expected = self
            .current()
            .map_or(true, |current| current.successors().contains(&step));
        if !expected {
            debug!(from = ?self.current(), to = %step, "step transition outside the usual flow");
        }
        self.records.push(StepRecord {
            step,
            entered_at_ms: self.started.elapsed().as_millis() as u64,
            expected,
        });
    }

    /// Step most recently entered
    #[must_use]
    pub fn current(&self) -> Option<Step> {
        self.records.last().map(|r| r.step)
    }

    /// Steps entered, in order
    #[must_use]
    pub fn entered(&self) -> Vec<Step> {
        self.records.iter().map(|r| r.step).collect()
    }

    /// Full records
    #[must_use]
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }
}

// =============================================================================
// NAVIGATOR
// =============================================================================

/// Strict element actions against one session
#[derive(Debug, Clone, Copy)]
pub struct WizardNavigator<'a> {
    session: &'a Session,
    vocabulary: &'a Vocabulary,
}

impl<'a> WizardNavigator<'a> {
    /// Navigator over a session
    #[must_use]
    pub const fn new(session: &'a Session, vocabulary: &'a Vocabulary) -> Self {
        Self {
            session,
            vocabulary,
        }
    }

    /// Strict locator for a control
    pub fn locate(&self, control: Control) -> HarnessResult<Locator> {
        self.vocabulary.locator(control)
    }

    /// Click the element addressed by `locator`
    pub async fn click(&self, locator: &Locator) -> HarnessResult<()> {
        let resolved = locator.resolve(self.session.driver()).await?;
        debug!(session = self.session.id(), target = %locator, "click");
        self.session
            .driver()
            .click(locator.selector(), resolved.index)
            .await
    }

    /// Replace the content of the addressed field
    pub async fn fill(&self, locator: &Locator, text: &str) -> HarnessResult<()> {
        let resolved = locator.resolve(self.session.driver()).await?;
        debug!(
            session = self.session.id(),
            target = %locator,
            chars = text.chars().count(),
            "fill"
        );
        self.session
            .driver()
            .fill(locator.selector(), resolved.index, text)
            .await
    }

    /// Choose an option in the addressed select
    pub async fn select_option(&self, locator: &Locator, value: &str) -> HarnessResult<()> {
        let resolved = locator.resolve(self.session.driver()).await?;
        debug!(session = self.session.id(), target = %locator, value, "select option");
        self.session
            .driver()
            .select_option(locator.selector(), resolved.index, value)
            .await
    }

    /// Press a key on the focused element
    pub async fn press(&self, key: &str) -> HarnessResult<()> {
        debug!(session = self.session.id(), key, "press");
        self.session.driver().press_key(key).await
    }

    /// Click a control
    pub async fn click_control(&self, control: Control) -> HarnessResult<()> {
        self.click(&self.locate(control)?).await
    }

    /// Fill a control
    pub async fn fill_control(&self, control: Control, text: &str) -> HarnessResult<()> {
        self.fill(&self.locate(control)?, text).await
    }
}
