//! Semantic control names mapped to locale-specific selectors.
//!
//! Scenario code asks for [`Control::Next`], never for "Próximo". The default
//! vocabulary matches the application's Brazilian Portuguese UI; any entry can
//! be replaced from configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::locator::{Locator, Selector, TextMatch};
use crate::result::{HarnessError, HarnessResult};

/// Interactive controls and step markers scenarios refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    /// Application header shown once authenticated
    MainHeader,
    /// Opens the settings panel
    SettingsButton,
    /// Gemini API section inside settings
    GeminiPanel,
    /// Signup: full name field
    SignupName,
    /// Signup: email field
    SignupEmail,
    /// Signup: submit button
    SignupSubmit,
    /// Login: email field
    LoginEmail,
    /// Login: request an OTP
    SendOtp,
    /// Login: OTP field
    OtpField,
    /// Login: verify the OTP
    VerifyOtp,
    /// Starts the briefing wizard
    NewBriefing,
    /// Wizard mode: free text
    UseText,
    /// Wizard mode: sections
    UseSections,
    /// Heading of the free text edit step
    TextModeHeading,
    /// Heading of the sections edit step
    SectionsModeHeading,
    /// Rich text editor
    TextEditor,
    /// Per-section AI suggestion
    Suggest,
    /// Editable section body
    SectionEditor,
    /// Advance one step
    Next,
    /// Go back one step
    Previous,
    /// Trigger AI revision
    ReviseWithAi,
    /// Heading shown once the revision arrived
    RevisedHeading,
    /// Export as Word
    ExportWord,
    /// Export as PNG
    ExportPng,
    /// Focused edit mode
    FocusedEdit,
    /// Opens the save dialog
    SaveBriefing,
    /// Save dialog heading
    SaveDialogHeading,
    /// Briefing name field
    BriefingName,
    /// Confirms a save
    Save,
    /// Finalize step marker
    FinalizeStep,
    /// DOs & DON'Ts tab on the finalize step
    DosDontsTab,
    /// Template editor heading
    TemplateHeading,
    /// Collapsible template section header
    TemplateSection,
    /// Opens the general AI rules
    GeneralRules,
    /// General rules dialog
    GeneralRulesDialog,
    /// Code editor inside the rules dialog
    RulesEditor,
    /// Autosave indicator
    SavingChip,
    /// Closes the current dialog
    CloseDialog,
}

impl Control {
    /// Every control, in declaration order
    pub const ALL: [Self; 38] = [
        Self::MainHeader,
        Self::SettingsButton,
        Self::GeminiPanel,
        Self::SignupName,
        Self::SignupEmail,
        Self::SignupSubmit,
        Self::LoginEmail,
        Self::SendOtp,
        Self::OtpField,
        Self::VerifyOtp,
        Self::NewBriefing,
        Self::UseText,
        Self::UseSections,
        Self::TextModeHeading,
        Self::SectionsModeHeading,
        Self::TextEditor,
        Self::Suggest,
        Self::SectionEditor,
        Self::Next,
        Self::Previous,
        Self::ReviseWithAi,
        Self::RevisedHeading,
        Self::ExportWord,
        Self::ExportPng,
        Self::FocusedEdit,
        Self::SaveBriefing,
        Self::SaveDialogHeading,
        Self::BriefingName,
        Self::Save,
        Self::FinalizeStep,
        Self::DosDontsTab,
        Self::TemplateHeading,
        Self::TemplateSection,
        Self::GeneralRules,
        Self::GeneralRulesDialog,
        Self::RulesEditor,
        Self::SavingChip,
        Self::CloseDialog,
    ];
}

/// Control to selector mapping for one UI locale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    locale: String,
    entries: HashMap<Control, Selector>,
}

impl Vocabulary {
    /// Brazilian Portuguese labels of the briefing application
    #[must_use]
    pub fn pt_br() -> Self {
        let button = |name: &str| Selector::role("button", name);
        let entries = [
            (Control::MainHeader, Selector::css("header")),
            (Control::SettingsButton, Selector::label("Settings")),
            (Control::GeminiPanel, Selector::text("API Gemini")),
            (Control::SignupName, Selector::label("Nome Completo")),
            (Control::SignupEmail, Selector::label("Endereço de Email")),
            (Control::SignupSubmit, button("Cadastrar")),
            (Control::LoginEmail, Selector::label("Endereço de Email")),
            (Control::SendOtp, Selector::role("button", TextMatch::pattern("^Enviar C[oó]digo"))),
            (Control::OtpField, Selector::label(TextMatch::pattern("C[oó]digo (OTP|de Acesso)"))),
            (
                Control::VerifyOtp,
                Selector::role("button", TextMatch::pattern("^(Verificar OTP|Login)$")),
            ),
            (Control::NewBriefing, button("Novo Briefing")),
            (Control::UseText, button("Usar Texto")),
            (
                Control::UseSections,
                Selector::role("button", TextMatch::pattern("^(Usar )?Se[çc][õo]es$")),
            ),
            (Control::TextModeHeading, Selector::role("heading", "Novo Briefing (Texto)")),
            (Control::SectionsModeHeading, Selector::role("heading", "Novo Briefing (Seções)")),
            (Control::TextEditor, Selector::css(".tiptap")),
            (Control::Suggest, button("Sugerir")),
            (Control::SectionEditor, Selector::role_any("textbox")),
            (Control::Next, Selector::role("button", TextMatch::exact("Próximo"))),
            (Control::Previous, Selector::role("button", TextMatch::exact("Anterior"))),
            (Control::ReviseWithAi, button("Revisar com IA")),
            (Control::RevisedHeading, Selector::role("heading", "Briefing Revisado (Editável)")),
            (Control::ExportWord, button("Exportar para Word")),
            (Control::ExportPng, button("Exportar como PNG")),
            (Control::FocusedEdit, button("Edição Focada")),
            (Control::SaveBriefing, button("Salvar Briefing")),
            (Control::SaveDialogHeading, Selector::role("heading", "Salvar Novo Briefing")),
            (Control::BriefingName, Selector::label("Nome do Briefing")),
            (Control::Save, Selector::role("button", TextMatch::exact("Salvar"))),
            (Control::FinalizeStep, Selector::role("heading", TextMatch::exact("Finalização"))),
            (Control::DosDontsTab, Selector::role("tab", "DOs & DON'Ts")),
            (Control::TemplateHeading, Selector::role("heading", "Editor de Modelo de Briefing")),
            (Control::TemplateSection, Selector::css(".MuiAccordionSummary-root")),
            (Control::GeneralRules, Selector::text("Clique para definir as regras gerais")),
            (Control::GeneralRulesDialog, Selector::role("dialog", "Editar Regras Gerais")),
            (Control::RulesEditor, Selector::css(".monaco-editor textarea")),
            (Control::SavingChip, Selector::text("Salvando...")),
            (Control::CloseDialog, Selector::role("button", TextMatch::exact("Fechar"))),
        ]
        .into_iter()
        .collect();
        Self {
            locale: "pt-BR".to_string(),
            entries,
        }
    }

    /// Replace entries, keeping the locale tag
    #[must_use]
    pub fn with_overrides(mut self, overrides: &HashMap<Control, Selector>) -> Self {
        for (control, selector) in overrides {
            self.entries.insert(*control, selector.clone());
        }
        self
    }

    /// Locale tag
    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Selector for a control
    pub fn selector(&self, control: Control) -> HarnessResult<&Selector> {
        self.entries.get(&control).ok_or_else(|| {
            HarnessError::config(format!("vocabulary {} has no entry for {control:?}", self.locale))
        })
    }

    /// Strict locator for a control
    pub fn locator(&self, control: Control) -> HarnessResult<Locator> {
        self.selector(control).cloned().map(Locator::new)
    }

    /// Controls with no selector
    #[must_use]
    pub fn missing(&self) -> Vec<Control> {
        Control::ALL
            .iter()
            .copied()
            .filter(|c| !self.entries.contains_key(c))
            .collect()
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::pt_br()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pt_br_is_complete() {
        assert!(Vocabulary::pt_br().missing().is_empty());
    }

    #[test]
    fn test_next_is_exact() {
        let vocab = Vocabulary::pt_br();
        let Selector::Role { name: Some(name), .. } = vocab.selector(Control::Next).unwrap() else {
            panic!("next should be a named role");
        };
        assert!(name.matches("Próximo"));
        assert!(!name.matches("Próximo passo"));
    }

    #[test]
    fn test_otp_labels_cover_both_wordings() {
        let vocab = Vocabulary::pt_br();
        let Selector::Label { label } = vocab.selector(Control::OtpField).unwrap() else {
            panic!("otp field should be a label");
        };
        assert!(label.matches("Código OTP"));
        assert!(label.matches("Código de Acesso"));
        let Selector::Role { name: Some(send), .. } = vocab.selector(Control::SendOtp).unwrap()
        else {
            panic!("send otp should be a named role");
        };
        assert!(send.matches("Enviar Código OTP"));
        assert!(send.matches("Enviar Código de Acesso"));
    }

    #[test]
    fn test_sections_button_wordings() {
        let vocab = Vocabulary::pt_br();
        let Selector::Role { name: Some(name), .. } = vocab.selector(Control::UseSections).unwrap()
        else {
            panic!("use sections should be a named role");
        };
        assert!(name.matches("Usar Seções"));
        assert!(name.matches("Seções"));
        assert!(!name.matches("Novo Briefing (Seções)"));
    }

    #[test]
    fn test_overrides_replace_entries() {
        let overrides: HashMap<Control, Selector> =
            [(Control::Next, Selector::test_id("wizard-next"))].into_iter().collect();
        let vocab = Vocabulary::pt_br().with_overrides(&overrides);
        assert_eq!(vocab.locator(Control::Next).unwrap(), Locator::test_id("wizard-next"));
        assert_eq!(vocab.locale(), "pt-BR");
    }

    #[test]
    fn test_missing_entry_is_config_error() {
        let mut vocab = Vocabulary::pt_br();
        vocab.entries.remove(&Control::Save);
        let err = vocab.locator(Control::Save).unwrap_err();
        assert!(err.to_string().contains("Save"));
        assert_eq!(vocab.missing(), vec![Control::Save]);
    }
}
