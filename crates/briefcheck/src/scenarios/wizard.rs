//! The briefing wizard: edit, AI revision, finalize, export and save.

use async_trait::async_trait;

use crate::identity::{AuthCookie, InjectedIdentity};
use crate::navigator::Step;
use crate::result::HarnessResult;
use crate::scenario::{Scenario, ScenarioContext};
use crate::vocabulary::Control;
use crate::wait::LatencyClass;

const BRIEFINGS_PATH: &str = "/briefings";
const BRIEFING_TEXT: &str = "This is a test briefing.";

/// Authenticate without the login UI.
///
/// Installs the out-of-band token cookie when one is configured and seeds the
/// test user; the caller's next navigation picks both up.
pub async fn sign_in(ctx: &ScenarioContext<'_>) -> HarnessResult<()> {
    if let Some(cookie) = AuthCookie::from_env() {
        cookie.install(ctx.session()).await?;
    }
    ctx.seed_identity(&InjectedIdentity::test_user()).await
}

/// Signed in on the briefings page with the wizard open at mode selection
async fn open_wizard(ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
    sign_in(ctx).await?;
    ctx.goto(BRIEFINGS_PATH).await?;
    ctx.enter_step(Step::Landing, LatencyClass::PageLoad).await?;
    // Stays disabled until the briefing template has loaded.
    ctx.click_control(Control::NewBriefing, LatencyClass::PageLoad)
        .await
}

/// From the edit step through the AI revision
async fn revise(ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
    ctx.click_control(Control::Next, LatencyClass::Ui).await?;
    ctx.enter_step(Step::WizardReview, LatencyClass::Ui).await?;
    ctx.click_control(Control::ReviseWithAi, LatencyClass::AiRevision)
        .await?;
    ctx.enter_step(Step::WizardRevised, LatencyClass::AiRevision)
        .await
}

async fn text_mode(ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
    ctx.click_control(Control::UseText, LatencyClass::Ui).await?;
    ctx.enter_step(Step::WizardEditText, LatencyClass::Ui).await?;
    ctx.fill_control(Control::TextEditor, BRIEFING_TEXT, LatencyClass::Ui)
        .await
}

/// Free text wizard up to the save dialog
#[derive(Debug, Clone, Copy, Default)]
pub struct BriefingWizardText;

#[async_trait]
impl Scenario for BriefingWizardText {
    fn name(&self) -> &str {
        "briefing-wizard-text"
    }

    fn description(&self) -> &str {
        "free text wizard through AI revision to the save dialog"
    }

    async fn run(&self, ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
        open_wizard(ctx).await?;
        text_mode(ctx).await?;
        revise(ctx).await?;

        ctx.visible(Control::ExportWord, LatencyClass::Ui).await?;
        ctx.visible(Control::FocusedEdit, LatencyClass::Ui).await?;
        ctx.checkpoint("revised").await?;

        ctx.click_control(Control::SaveBriefing, LatencyClass::Ui).await?;
        ctx.enter_step(Step::SaveDialog, LatencyClass::Ui).await?;
        ctx.checkpoint("save-dialog").await
    }
}

/// Sections wizard: suggestion, revision, finalize, save, back home
#[derive(Debug, Clone, Copy, Default)]
pub struct BriefingWizardSections;

#[async_trait]
impl Scenario for BriefingWizardSections {
    fn name(&self) -> &str {
        "briefing-wizard-sections"
    }

    fn description(&self) -> &str {
        "sections wizard with an AI suggestion, finalized and saved"
    }

    async fn run(&self, ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
        open_wizard(ctx).await?;
        ctx.click_control(Control::UseSections, LatencyClass::Ui).await?;
        ctx.enter_step(Step::WizardEditSections, LatencyClass::Ui).await?;

        let suggest = ctx.control(Control::Suggest)?.first();
        ctx.click_when_enabled(&suggest, LatencyClass::Ui).await?;
        let editor = ctx.control(Control::SectionEditor)?.first();
        ctx.expect_visible(&editor, LatencyClass::AiRevision).await?;
        ctx.checkpoint("suggestion").await?;

        revise(ctx).await?;
        ctx.click_control(Control::Next, LatencyClass::Ui).await?;
        ctx.enter_step(Step::WizardFinalize, LatencyClass::Ui).await?;

        ctx.click_control(Control::SaveBriefing, LatencyClass::Ui).await?;
        ctx.enter_step(Step::SaveDialog, LatencyClass::Ui).await?;
        let title = format!("briefcheck {}", ctx.session().id());
        ctx.fill_control(Control::BriefingName, &title, LatencyClass::Ui)
            .await?;
        ctx.checkpoint("save-dialog").await?;
        ctx.click_control(Control::Save, LatencyClass::Ui).await?;

        let dialog = ctx.control(Control::SaveDialogHeading)?;
        ctx.expect_hidden(&dialog, LatencyClass::PageLoad).await?;
        ctx.enter_step(Step::Landing, LatencyClass::PageLoad).await
    }
}

/// Wizard to the finalize step and its PNG export
#[derive(Debug, Clone, Copy, Default)]
pub struct BriefingExport;

#[async_trait]
impl Scenario for BriefingExport {
    fn name(&self) -> &str {
        "briefing-export"
    }

    fn description(&self) -> &str {
        "finalize step offers PNG export on the DOs & DON'Ts tab"
    }

    async fn run(&self, ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
        open_wizard(ctx).await?;
        text_mode(ctx).await?;
        revise(ctx).await?;

        // Next comes back enabled once the revision is in.
        ctx.click_control(Control::Next, LatencyClass::AiRevision)
            .await?;
        ctx.enter_step(Step::WizardFinalize, LatencyClass::Ui).await?;
        ctx.click_control(Control::DosDontsTab, LatencyClass::Ui).await?;

        let export = ctx.visible(Control::ExportPng, LatencyClass::Ui).await?;
        ctx.checkpoint_element("export-button", export).await?;
        ctx.checkpoint("finalize").await
    }
}
