//! Getting past the login screen, both ways.

use async_trait::async_trait;

use crate::identity::{AuthFixture, InjectedIdentity};
use crate::navigator::Step;
use crate::network::{HttpMethod, UrlPattern};
use crate::result::HarnessResult;
use crate::scenario::{Scenario, ScenarioContext};
use crate::vocabulary::Control;
use crate::wait::LatencyClass;

/// Seed an identity into storage, reload, land without seeing the login page
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityBypass;

#[async_trait]
impl Scenario for IdentityBypass {
    fn name(&self) -> &str {
        "identity-bypass"
    }

    fn description(&self) -> &str {
        "seeded identity reaches the landing page without login"
    }

    async fn run(&self, ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
        ctx.goto("/").await?;
        ctx.network_idle(LatencyClass::PageLoad).await?;
        ctx.seed_identity(&InjectedIdentity::test_user()).await?;
        ctx.reload().await?;
        ctx.enter_step(Step::Landing, LatencyClass::PageLoad).await?;
        ctx.expect_url(UrlPattern::path("/"), LatencyClass::Auth).await?;
        ctx.checkpoint("landing").await
    }
}

/// Shared backend credentials the application's seed data provides
const SHARED_NAME: &str = "Test User";
const SHARED_EMAIL: &str = "test@example.com";
const SHARED_OTP: &str = "123456";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Credentials {
    /// Fresh identity and OTP served by route mocks
    Isolated,
    /// The well-known user against the live backend
    Shared,
}

/// Sign up, get redirected to login, log in with an OTP
#[derive(Debug, Clone, Copy)]
pub struct SignupLogin {
    credentials: Credentials,
}

impl SignupLogin {
    /// Against a per-run [`AuthFixture`]
    #[must_use]
    pub const fn isolated() -> Self {
        Self {
            credentials: Credentials::Isolated,
        }
    }

    /// With the shared test user and OTP against the live backend
    #[must_use]
    pub const fn shared() -> Self {
        Self {
            credentials: Credentials::Shared,
        }
    }

    async fn credentials(
        &self,
        ctx: &ScenarioContext<'_>,
    ) -> HarnessResult<(String, String, String)> {
        match self.credentials {
            Credentials::Shared => Ok((
                SHARED_NAME.to_string(),
                SHARED_EMAIL.to_string(),
                SHARED_OTP.to_string(),
            )),
            Credentials::Isolated => {
                let fixture = AuthFixture::isolated();
                for route in fixture.routes() {
                    // Every POST of the flow must reach the fixture, never the backend.
                    let route = if route.method == HttpMethod::Post {
                        route.expect_hit()
                    } else {
                        route
                    };
                    ctx.mock(route).await?;
                }
                Ok((fixture.name, fixture.identity.email, fixture.otp))
            }
        }
    }
}

#[async_trait]
impl Scenario for SignupLogin {
    fn name(&self) -> &str {
        match self.credentials {
            Credentials::Isolated => "signup-login",
            Credentials::Shared => "signup-login-shared",
        }
    }

    fn description(&self) -> &str {
        match self.credentials {
            Credentials::Isolated => "signup then OTP login against an isolated auth fixture",
            Credentials::Shared => "signup then OTP login with the shared test user",
        }
    }

    async fn run(&self, ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
        let (name, email, otp) = self.credentials(ctx).await?;

        ctx.goto("/signup").await?;
        ctx.enter_step(Step::Signup, LatencyClass::PageLoad).await?;
        ctx.fill_control(Control::SignupName, &name, LatencyClass::Ui).await?;
        ctx.fill_control(Control::SignupEmail, &email, LatencyClass::Ui).await?;
        ctx.click_control(Control::SignupSubmit, LatencyClass::Ui).await?;
        ctx.expect_url(UrlPattern::glob("**/login"), LatencyClass::Auth).await?;

        ctx.enter_step(Step::Login, LatencyClass::Auth).await?;
        ctx.fill_control(Control::LoginEmail, &email, LatencyClass::Ui).await?;
        ctx.click_control(Control::SendOtp, LatencyClass::Ui).await?;
        ctx.enter_step(Step::OtpPending, LatencyClass::Auth).await?;
        ctx.fill_control(Control::OtpField, &otp, LatencyClass::Ui).await?;
        ctx.click_control(Control::VerifyOtp, LatencyClass::Ui).await?;

        ctx.expect_url(UrlPattern::path("/"), LatencyClass::Auth).await?;
        ctx.enter_step(Step::Landing, LatencyClass::Auth).await?;
        ctx.checkpoint("logged-in").await
    }
}
