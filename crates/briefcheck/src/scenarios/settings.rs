use async_trait::async_trait;
use serde_json::json;

use crate::navigator::Step;
use crate::network::{HttpMethod, MockResponse, RouteMock, UrlPattern};
use crate::result::HarnessResult;
use crate::scenario::{Scenario, ScenarioContext};
use crate::vocabulary::Control;
use crate::wait::LatencyClass;

/// Open the settings panel with the auth and settings backend mocked
#[derive(Debug, Clone, Copy, Default)]
pub struct SettingsPanel;

#[async_trait]
impl Scenario for SettingsPanel {
    fn name(&self) -> &str {
        "settings-panel"
    }

    fn description(&self) -> &str {
        "mocked auth and settings backend, settings panel shows the Gemini section"
    }

    async fn run(&self, ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
        let user = json!({ "id": 1, "name": "Test User", "email": "test@example.com" });
        ctx.mock(
            RouteMock::new(UrlPattern::glob("**/api/auth/me"), MockResponse::json_value(&user))
                .with_method(HttpMethod::Get)
                .expect_hit(),
        )
        .await?;
        ctx.mock(
            RouteMock::new(
                UrlPattern::glob("**/api/user/settings"),
                MockResponse::json_value(&json!({})),
            )
            .expect_hit(),
        )
        .await?;

        ctx.goto("/").await?;
        ctx.click_control(Control::SettingsButton, LatencyClass::PageLoad)
            .await?;
        ctx.enter_step(Step::Settings, LatencyClass::Ui).await?;
        ctx.checkpoint("settings").await
    }
}
