use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use super::Credential;

/// Model used when nothing else is selected.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Value of `model` that defers to `custom_model`.
pub const CUSTOM_MODEL: &str = "custom";

/// Caller-owned generation settings. The core only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[builder(doc)]
pub struct Settings {
    /// Model identifier (e.g., "gemini-2.5-flash"), or "custom"
    #[builder(setter(into), default = String::from(DEFAULT_MODEL))]
    pub model: String,
    /// API key entered by the user
    #[builder(setter(into), default)]
    pub credential: String,
    /// Model identifier used when `model` is "custom"
    #[builder(setter(into), default)]
    pub custom_model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Settings {
    /// The model id to send requests to.
    pub fn selected_model_id(&self) -> &str {
        let custom = self.custom_model.trim();
        if self.model == CUSTOM_MODEL && !custom.is_empty() {
            return custom;
        }
        let model = self.model.trim();
        if model.is_empty() || model == CUSTOM_MODEL {
            DEFAULT_MODEL
        } else {
            model
        }
    }

    /// The user's credential, if one was entered.
    pub fn user_credential(&self) -> Option<Credential> {
        let credential = Credential::new(self.credential.as_str());
        (!credential.is_empty()).then_some(credential)
    }
}
