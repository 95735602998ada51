//! A simulated briefing application on top of `MockDriver`.
//!
//! Pages and reactions follow the real application closely enough for every
//! catalog scenario to run: auth pages talk to `/api/auth/*`, the briefings
//! page enables "Novo Briefing" once the template has loaded, the AI revision
//! takes a few ticks, and autosave shows a chip while its request is in flight.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use briefcheck::mock::{Effect, MockDriver, MockElement, MockLauncher, MockRequest};
use briefcheck::{
    HttpMethod, MockResponse, Responder, ScenarioRunner, SessionOptions, TimeoutPolicy,
    IDENTITY_STORAGE_KEY,
};
use serde_json::json;

pub const BASE_URL: &str = "http://app.test";
pub const SHARED_EMAIL: &str = "test@example.com";
pub const SHARED_OTP: &str = "123456";

/// Ticks the simulated AI revision takes
pub const REVISION_LATENCY: u64 = 5;

fn mount(keys: &[&str]) -> Vec<Effect> {
    keys.iter().map(|k| Effect::Mount((*k).to_string())).collect()
}

fn unmount(keys: &[&str]) -> Vec<Effect> {
    keys.iter().map(|k| Effect::Unmount((*k).to_string())).collect()
}

fn then(mut first: Vec<Effect>, rest: Vec<Effect>) -> Vec<Effect> {
    first.extend(rest);
    first
}

const SHELL: &[&str] = &["header", "settings-button"];
const SIGNUP: &[&str] = &["signup-name", "signup-email", "signup-submit"];
const LOGIN: &[&str] = &["login-email", "send-otp", "otp", "verify-otp"];
const EDIT_STEP: &[&str] = &[
    "text-heading",
    "editor",
    "sections-heading",
    "suggest-1",
    "suggest-2",
    "suggest-3",
    "section-editor-1",
    "next-edit",
];
const REVISED: &[&str] = &[
    "revised-heading",
    "export-word",
    "focused-edit",
    "save-briefing",
    "next-review",
];
const FINALIZE: &[&str] = &["finalize", "dos-donts", "export-png", "stepper-finalize"];
const SAVE_DIALOG: &[&str] = &["save-heading", "briefing-name", "save"];
const RULES_DIALOG: &[&str] = &["rules-dialog", "rules-editor", "close-dialog"];

fn elements() -> Vec<MockElement> {
    vec![
        // Shell
        MockElement::new("header", "header").with_css("header"),
        MockElement::new("settings-button", "button")
            .with_role("button", "open settings")
            .with_label("Settings"),
        MockElement::button("login-link", "Entrar"),
        MockElement::dialog("settings-dialog", "Configurações"),
        MockElement::text("gemini-panel", "API Gemini"),
        // Auth
        MockElement::textbox("signup-name", "Nome Completo"),
        MockElement::textbox("signup-email", "Endereço de Email"),
        MockElement::button("signup-submit", "Cadastrar"),
        MockElement::textbox("login-email", "Endereço de Email"),
        MockElement::button("send-otp", "Enviar Código de Acesso"),
        MockElement::textbox("otp", "Código de Acesso"),
        MockElement::button("verify-otp", "Login"),
        // Briefings
        MockElement::button("new-briefing", "Novo Briefing").disabled(),
        MockElement::button("use-text", "Usar Texto"),
        MockElement::button("use-sections", "Usar Seções"),
        MockElement::heading("text-heading", "Novo Briefing (Texto)"),
        MockElement::new("editor", "div").with_css(".tiptap"),
        MockElement::heading("sections-heading", "Novo Briefing (Seções)"),
        MockElement::button("suggest-1", "Sugerir"),
        MockElement::button("suggest-2", "Sugerir"),
        MockElement::button("suggest-3", "Sugerir"),
        MockElement::new("section-editor-1", "div").with_role("textbox", "Contexto"),
        MockElement::button("next-edit", "Próximo"),
        MockElement::button("revise", "Revisar com IA"),
        MockElement::heading("revised-heading", "Briefing Revisado (Editável)"),
        MockElement::button("export-word", "Exportar para Word"),
        MockElement::button("focused-edit", "Edição Focada"),
        MockElement::button("save-briefing", "Salvar Briefing"),
        MockElement::button("next-review", "Próximo"),
        MockElement::heading("finalize", "Finalização"),
        // The stepper labels every step, the last one included
        MockElement::text("stepper-finalize", "Finalização"),
        MockElement::tab("dos-donts", "DOs & DON'Ts"),
        MockElement::button("export-png", "Exportar como PNG"),
        MockElement::heading("save-heading", "Salvar Novo Briefing"),
        MockElement::textbox("briefing-name", "Nome do Briefing"),
        MockElement::button("save", "Salvar"),
        // Template editor
        MockElement::heading("template-heading", "Editor de Modelo de Briefing"),
        MockElement::new("section-1", "div")
            .with_role("button", "Contexto")
            .with_css(".MuiAccordionSummary-root"),
        MockElement::new("section-2", "div")
            .with_role("button", "Objetivo")
            .with_css(".MuiAccordionSummary-root"),
        MockElement::new("section-3", "div")
            .with_role("button", "Entregáveis")
            .with_css(".MuiAccordionSummary-root"),
        MockElement::text("section-1-body", "Descreva o contexto do projeto"),
        MockElement::text(
            "general-rules",
            "Clique para definir as regras gerais e a ordem dos blocos...",
        ),
        MockElement::dialog("rules-dialog", "Editar Regras Gerais"),
        MockElement::new("rules-editor", "textarea").with_css(".monaco-editor textarea"),
        MockElement::text("saving-chip", "Salvando..."),
        MockElement::button("close-dialog", "Fechar"),
    ]
}

fn shared_login() -> Responder {
    Responder::from_fn(|request| {
        let body: serde_json::Value = request.body_json().unwrap_or_default();
        if body["email"] == SHARED_EMAIL && body["otp"] == SHARED_OTP {
            MockResponse::json_value(&json!({ "id": 1, "email": SHARED_EMAIL }))
        } else {
            MockResponse::error(401, "invalid otp")
        }
    })
}

/// The application, freshly loaded at `about:blank`
pub fn briefing_app() -> MockDriver {
    let mut driver = MockDriver::new();
    for element in elements() {
        driver = driver.with_element(element);
    }

    let template_loaded = MockRequest::get("/api/briefing-template");
    driver
        // Backend that is not mocked by scenarios
        .with_endpoint(
            HttpMethod::Get,
            "/api/briefing-template",
            MockResponse::json_value(&json!({ "blocks": [] })),
            3,
        )
        .with_endpoint(HttpMethod::Put, "/api/briefing-template", MockResponse::new(), 4)
        .with_endpoint(
            HttpMethod::Post,
            "/api/auth/signup",
            MockResponse::json_value(&json!({ "id": 1 })).with_status(201),
            2,
        )
        .with_endpoint(HttpMethod::Post, "/api/auth/send-otp", MockResponse::new(), 2)
        .with_endpoint(HttpMethod::Post, "/api/auth/login", shared_login(), 2)
        .with_endpoint(
            HttpMethod::Post,
            "/api/ai/suggest",
            MockResponse::text("Contexto sugerido"),
            3,
        )
        .with_endpoint(
            HttpMethod::Post,
            "/api/ai/revise",
            MockResponse::text("Briefing revisado"),
            REVISION_LATENCY,
        )
        .with_endpoint(HttpMethod::Post, "/api/briefings", MockResponse::new().with_status(201), 2)
        // Pages
        .on_load(
            "/",
            vec![Effect::IfStorage {
                key: IDENTITY_STORAGE_KEY.to_string(),
                then: mount(SHELL),
                otherwise: vec![MockRequest::get("/api/auth/me")
                    .on_success(mount(SHELL))
                    .on_failure(mount(&["login-link"]))
                    .send()],
            }],
        )
        .on_load(
            "/briefings",
            vec![Effect::IfStorage {
                key: IDENTITY_STORAGE_KEY.to_string(),
                then: then(
                    mount(&["header", "settings-button", "new-briefing"]),
                    vec![template_loaded
                        .clone()
                        .on_success(vec![Effect::Enable("new-briefing".to_string())])
                        .send()],
                ),
                otherwise: vec![Effect::Navigate("/login".to_string())],
            }],
        )
        .on_load("/signup", mount(SIGNUP))
        .on_load("/login", mount(&["login-email", "send-otp"]))
        .on_load(
            "/briefing-template",
            vec![template_loaded
                .on_success(mount(&[
                    "template-heading",
                    "section-1",
                    "section-2",
                    "section-3",
                    "general-rules",
                ]))
                .send()],
        )
        // Settings
        .on_click(
            "settings-button",
            vec![MockRequest::get("/api/user/settings")
                .on_success(mount(&["settings-dialog", "gemini-panel"]))
                .send()],
        )
        // Signup and login
        .on_click(
            "signup-submit",
            vec![MockRequest::post("/api/auth/signup")
                .field("name", "signup-name")
                .field("email", "signup-email")
                .on_success(then(unmount(SIGNUP), vec![Effect::Navigate("/login".to_string())]))
                .send()],
        )
        .on_click(
            "send-otp",
            vec![MockRequest::post("/api/auth/send-otp")
                .field("email", "login-email")
                .on_success(mount(&["otp", "verify-otp"]))
                .send()],
        )
        .on_click(
            "verify-otp",
            vec![MockRequest::post("/api/auth/login")
                .field("email", "login-email")
                .field("otp", "otp")
                .on_success(then(
                    unmount(LOGIN),
                    then(vec![Effect::SetUrl("/".to_string())], mount(SHELL)),
                ))
                .send()],
        )
        // Wizard
        .on_click("new-briefing", mount(&["use-text", "use-sections"]))
        .on_click(
            "use-text",
            then(
                unmount(&["use-text", "use-sections"]),
                mount(&["text-heading", "editor", "next-edit", "stepper-finalize"]),
            ),
        )
        .on_click(
            "use-sections",
            then(
                unmount(&["use-text", "use-sections"]),
                mount(&[
                    "sections-heading",
                    "suggest-1",
                    "suggest-2",
                    "suggest-3",
                    "next-edit",
                    "stepper-finalize",
                ]),
            ),
        )
        .on_click(
            "suggest-1",
            vec![MockRequest::post("/api/ai/suggest")
                .on_success(mount(&["section-editor-1"]))
                .send()],
        )
        .on_click("next-edit", then(unmount(EDIT_STEP), mount(&["revise"])))
        .on_click(
            "revise",
            vec![
                Effect::Disable("revise".to_string()),
                MockRequest::post("/api/ai/revise")
                    .on_success(then(unmount(&["revise"]), mount(REVISED)))
                    .on_failure(vec![Effect::Enable("revise".to_string())])
                    .send(),
            ],
        )
        .on_click(
            "next-review",
            then(
                unmount(&["revised-heading", "export-word", "focused-edit", "next-review"]),
                mount(&["finalize", "dos-donts"]),
            ),
        )
        .on_click("dos-donts", mount(&["export-png"]))
        .on_click("save-briefing", mount(SAVE_DIALOG))
        .on_click(
            "save",
            vec![MockRequest::post("/api/briefings")
                .field("name", "briefing-name")
                .on_success(then(
                    then(unmount(SAVE_DIALOG), then(unmount(REVISED), unmount(FINALIZE))),
                    vec![Effect::Navigate("/briefings".to_string())],
                ))
                .send()],
        )
        // Template editor
        .on_click("section-1", mount(&["section-1-body"]))
        .on_click("general-rules", mount(RULES_DIALOG))
        .on_fill(
            "rules-editor",
            vec![
                Effect::Mount("saving-chip".to_string()),
                MockRequest::put("/api/briefing-template")
                    .field("rules", "rules-editor")
                    .on_success(unmount(&["saving-chip"]))
                    .send(),
            ],
        )
        .on_click("close-dialog", unmount(RULES_DIALOG))
}

/// Policy that keeps tests fast: every bound 2s, polling every millisecond
pub fn fast_timeouts() -> TimeoutPolicy {
    TimeoutPolicy::uniform(2_000, 1)
}

/// Runner over the simulated application writing evidence under `dir`
pub fn runner(dir: &Path) -> (ScenarioRunner, Arc<MockLauncher>) {
    runner_with(dir, briefing_app)
}

/// Runner over any page factory
pub fn runner_with(
    dir: &Path,
    factory: impl Fn() -> MockDriver + Send + Sync + 'static,
) -> (ScenarioRunner, Arc<MockLauncher>) {
    let launcher = Arc::new(MockLauncher::new(factory));
    let runner = ScenarioRunner::new(launcher.clone(), dir)
        .with_base_options(SessionOptions::default().with_base_url(BASE_URL))
        .with_timeouts(fast_timeouts());
    (runner, launcher)
}

/// The driver whose history contains a navigation to `path`
pub fn driver_that_visited(launcher: &MockLauncher, path: &str) -> Option<MockDriver> {
    let url = format!("navigate:{BASE_URL}{path}");
    launcher
        .launched()
        .into_iter()
        .map(|(_, driver)| driver)
        .find(|driver| driver.history().iter().any(|call| call == &url))
}
