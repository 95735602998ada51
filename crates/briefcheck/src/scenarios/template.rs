//! Briefing template editor.

use async_trait::async_trait;

use super::sign_in;
use crate::navigator::Step;
use crate::result::HarnessResult;
use crate::scenario::{Scenario, ScenarioContext};
use crate::session::{ColorScheme, SessionOptions};
use crate::vocabulary::Control;
use crate::wait::LatencyClass;

const TEMPLATE_PATH: &str = "/briefing-template";

async fn open_editor(ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
    ctx.goto(TEMPLATE_PATH).await?;
    ctx.enter_step(Step::TemplateEditor, LatencyClass::PageLoad)
        .await
}

/// Load the template editor and expand its first section
#[derive(Debug, Clone, Copy)]
pub struct TemplateEditor {
    dark: bool,
}

impl TemplateEditor {
    /// Default color scheme, no sign in
    #[must_use]
    pub const fn light() -> Self {
        Self { dark: false }
    }

    /// Signed in, dark color scheme
    #[must_use]
    pub const fn dark() -> Self {
        Self { dark: true }
    }
}

#[async_trait]
impl Scenario for TemplateEditor {
    fn name(&self) -> &str {
        if self.dark {
            "template-editor-dark"
        } else {
            "template-editor"
        }
    }

    fn description(&self) -> &str {
        if self.dark {
            "template editor renders in dark mode, first section expands"
        } else {
            "template editor loads, first section expands"
        }
    }

    fn session_options(&self, base: SessionOptions) -> SessionOptions {
        if self.dark {
            base.with_color_scheme(ColorScheme::Dark)
        } else {
            base
        }
    }

    async fn run(&self, ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
        if self.dark {
            sign_in(ctx).await?;
        }
        open_editor(ctx).await?;

        let section = ctx.control(Control::TemplateSection)?.first();
        ctx.click_when_enabled(&section, LatencyClass::Ui).await?;
        ctx.checkpoint("section-expanded").await
    }
}

/// Edit the general AI rules and watch autosave kick in
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateAutosave;

#[async_trait]
impl Scenario for TemplateAutosave {
    fn name(&self) -> &str {
        "template-autosave"
    }

    fn description(&self) -> &str {
        "editing the general rules shows the saving indicator"
    }

    async fn run(&self, ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
        open_editor(ctx).await?;
        ctx.click_control(Control::GeneralRules, LatencyClass::Ui).await?;

        let dialog = ctx.visible(Control::GeneralRulesDialog, LatencyClass::Ui).await?;
        let editor = ctx.control(Control::RulesEditor)?.first();
        ctx.expect_enabled(&editor, LatencyClass::Ui).await?;
        ctx.nav()
            .fill(&editor, "adding a new line to trigger save")
            .await?;
        ctx.visible(Control::SavingChip, LatencyClass::Ui).await?;
        ctx.checkpoint_element("rules-dialog", dialog.clone()).await?;

        ctx.click_control(Control::CloseDialog, LatencyClass::Ui).await?;
        ctx.expect_hidden(&dialog, LatencyClass::Ui).await?;
        let chip = ctx.control(Control::SavingChip)?;
        ctx.expect_hidden(&chip, LatencyClass::PageLoad).await
    }
}
