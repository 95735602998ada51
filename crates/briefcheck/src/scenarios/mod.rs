//! Catalog of end-to-end scenarios against the briefing application.
//!
//! | Name | Covers |
//! |------|--------|
//! | `identity-bypass` | seeded identity reaches the landing page without login |
//! | `settings-panel` | mocked auth and settings backend, settings panel opens |
//! | `template-editor` | template editor loads, first section expands |
//! | `template-editor-dark` | same, signed in, dark color scheme |
//! | `template-autosave` | editing the general rules triggers autosave |
//! | `signup-login` | signup then OTP login against an isolated auth fixture |
//! | `signup-login-shared` | same flow with the shared test user and OTP |
//! | `briefing-wizard-text` | free text wizard through AI revision to the save dialog |
//! | `briefing-wizard-sections` | sections wizard through finalize and save |
//! | `briefing-export` | wizard to the finalize step and its PNG export |

mod auth;
mod settings;
mod template;
mod wizard;

use std::sync::Arc;

pub use auth::{IdentityBypass, SignupLogin};
pub use settings::SettingsPanel;
pub use template::{TemplateAutosave, TemplateEditor};
pub use wizard::{sign_in, BriefingExport, BriefingWizardSections, BriefingWizardText};

use crate::scenario::Scenario;

/// Every scenario, in catalog order
#[must_use]
pub fn all() -> Vec<Arc<dyn Scenario>> {
    vec![
        Arc::new(IdentityBypass),
        Arc::new(SettingsPanel),
        Arc::new(TemplateEditor::light()),
        Arc::new(TemplateEditor::dark()),
        Arc::new(TemplateAutosave),
        Arc::new(SignupLogin::isolated()),
        Arc::new(SignupLogin::shared()),
        Arc::new(BriefingWizardText),
        Arc::new(BriefingWizardSections),
        Arc::new(BriefingExport),
    ]
}

/// Scenario names, in catalog order
#[must_use]
pub fn names() -> Vec<String> {
    all().iter().map(|s| s.name().to_string()).collect()
}

/// Look a scenario up by name
#[must_use]
pub fn by_name(name: &str) -> Option<Arc<dyn Scenario>> {
    all().into_iter().find(|s| s.name() == name)
}
