//! Client-side identity injection and per-scenario auth fixtures.
//!
//! Two ways past the login screen:
//!
//! - [`seed_identity`] writes an [`InjectedIdentity`] under [`IDENTITY_STORAGE_KEY`];
//!   the next navigation or reload picks it up. Nothing here navigates.
//! - [`AuthCookie`] installs an externally minted token as [`AUTH_COOKIE_NAME`].
//!
//! [`AuthFixture`] instead stands in for the auth backend itself, so the real
//! login UI can be exercised without shared users or a shared OTP.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::driver::BrowserCookie;
use crate::network::{HttpMethod, MockResponse, Responder, RouteMock, UrlPattern};
use crate::result::HarnessResult;
use crate::session::Session;

/// Local storage key the application reads its session from
pub const IDENTITY_STORAGE_KEY: &str = "user";

/// Cookie carrying the backend session token
pub const AUTH_COOKIE_NAME: &str = "auth_token";

/// Environment variables consulted for an out-of-band token, in order
pub const AUTH_TOKEN_ENV: [&str; 2] = ["BRIEFCHECK_AUTH_TOKEN", "TOKEN"];

/// Token lifetime written into injected identities
const TOKEN_TTL_MS: i64 = 3_600_000;

/// Token part of an injected identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBundle {
    /// Refresh token
    pub refresh_token: String,
    /// Access token
    pub access_token: String,
    /// Expiry, milliseconds since the epoch
    pub expiration_time: i64,
}

/// A pre-authenticated session record as the application stores it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectedIdentity {
    /// User id
    pub uid: String,
    /// Email
    pub email: String,
    /// Email verification flag
    pub email_verified: bool,
    /// Tokens
    pub sts_token_manager: TokenBundle,
}

impl InjectedIdentity {
    /// Verified identity with fake tokens valid for one hour
    #[must_use]
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
            email_verified: true,
            sts_token_manager: TokenBundle {
                refresh_token: "fake-refresh-token".to_string(),
                access_token: "fake-access-token".to_string(),
                expiration_time: Utc::now().timestamp_millis() + TOKEN_TTL_MS,
            },
        }
    }

    /// The well-known test user
    #[must_use]
    pub fn test_user() -> Self {
        Self::new("test-user-id", "test@example.com")
    }

    /// A unique identity nobody else uses
    #[must_use]
    pub fn disposable() -> Self {
        let tag = uuid::Uuid::new_v4().simple().to_string();
        let short = &tag[..12];
        Self::new(format!("bc-{short}"), format!("briefcheck+{short}@example.test"))
    }

    /// Whether the token is still valid at `now_ms`
    #[must_use]
    pub const fn is_valid_at(&self, now_ms: i64) -> bool {
        self.sts_token_manager.expiration_time > now_ms
    }

    /// Serialize as stored
    pub fn to_json(&self) -> HarnessResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Write the identity into the session's local storage.
///
/// The caller triggers the navigation or reload that makes it take effect.
pub async fn seed_identity(session: &Session, identity: &InjectedIdentity) -> HarnessResult<()> {
    let json = identity.to_json()?;
    session
        .driver()
        .set_local_storage(IDENTITY_STORAGE_KEY, &json)
        .await?;
    info!(session = session.id(), uid = %identity.uid, "identity seeded");
    Ok(())
}

/// An externally issued auth token installed as a cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCookie {
    token: String,
}

impl AuthCookie {
    /// Wrap a token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Token from the first non-empty variable of [`AUTH_TOKEN_ENV`]
    #[must_use]
    pub fn from_env() -> Option<Self> {
        AUTH_TOKEN_ENV
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|value| !value.trim().is_empty())
            .map(|token| Self::new(token.trim()))
    }

    /// Cookie scoped to `url`
    #[must_use]
    pub fn to_cookie(&self, url: &str) -> BrowserCookie {
        BrowserCookie {
            name: AUTH_COOKIE_NAME.to_string(),
            value: self.token.clone(),
            url: url.to_string(),
        }
    }

    /// Install into the session, scoped to its base URL
    pub async fn install(&self, session: &Session) -> HarnessResult<()> {
        let url = session.options().resolve_url("/");
        session.driver().add_cookie(&self.to_cookie(&url)).await?;
        info!(session = session.id(), "auth cookie installed");
        Ok(())
    }
}

/// Per-scenario stand-in for the authentication backend.
///
/// Every endpoint is a route mock; login succeeds only with this fixture's
/// email and OTP, so concurrent scenarios never share credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFixture {
    /// Display name used at signup
    pub name: String,
    /// Identity the backend reports once logged in
    pub identity: InjectedIdentity,
    /// One-time password accepted by the login mock
    pub otp: String,
    /// Whether `/api/auth/me` reports a logged-in user from the start
    pub logged_in: bool,
}

impl AuthFixture {
    /// Disposable identity with a random six digit OTP, logged out
    #[must_use]
    pub fn isolated() -> Self {
        let otp = uuid::Uuid::new_v4().as_u128() % 1_000_000;
        Self {
            name: "Briefcheck User".to_string(),
            identity: InjectedIdentity::disposable(),
            otp: format!("{otp:06}"),
            logged_in: false,
        }
    }

    /// Fixture whose backend already considers the user logged in
    #[must_use]
    pub fn logged_in(mut self) -> Self {
        self.logged_in = true;
        self
    }

    /// Override the display name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn user_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.identity.uid,
            "name": self.name,
            "email": self.identity.email,
        })
    }

    /// Route mocks implementing the fixture
    #[must_use]
    pub fn routes(&self) -> Vec<RouteMock> {
        let user = self.user_json();
        let me = if self.logged_in {
            MockResponse::json_value(&user)
        } else {
            MockResponse::error(401, "not authenticated")
        };
        let email = self.identity.email.clone();
        let otp = self.otp.clone();
        let login_user = user.clone();
        let login = Responder::from_fn(move |request| {
            let body: serde_json::Value = request.body_json().unwrap_or_default();
            if body["email"] == email.as_str() && body["otp"] == otp.as_str() {
                MockResponse::json_value(&login_user)
                    .with_header("Set-Cookie", &format!("{AUTH_COOKIE_NAME}=fixture; Path=/"))
            } else {
                MockResponse::error(401, "invalid otp")
            }
        });
        vec![
            RouteMock::new(UrlPattern::glob("**/api/auth/me"), me).with_method(HttpMethod::Get),
            RouteMock::new(
                UrlPattern::glob("**/api/auth/signup"),
                MockResponse::json_value(&user).with_status(201),
            )
            .with_method(HttpMethod::Post),
            RouteMock::new(
                UrlPattern::glob("**/api/auth/send-otp"),
                MockResponse::json_value(&serde_json::json!({ "message": "OTP sent" })),
            )
            .with_method(HttpMethod::Post),
            RouteMock::new(UrlPattern::glob("**/api/auth/login"), login)
                .with_method(HttpMethod::Post),
            RouteMock::new(
                UrlPattern::glob("**/api/user/settings"),
                MockResponse::json_value(&serde_json::json!({})),
            ),
        ]
    }

    /// Register every route on the session
    pub async fn install(&self, session: &Session) -> HarnessResult<()> {
        for route in self.routes() {
            session.mock(route).await?;
        }
        info!(session = session.id(), email = %self.identity.email, "auth fixture installed");
        Ok(())
    }
}
