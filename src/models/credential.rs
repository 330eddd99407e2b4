//! API credentials and the demo mode they select.

use std::fmt;

/// Placeholder keys that always select demo mode.
pub const DEMO_KEYS: &[&str] = &["PLACEHOLDER_API_KEY", "demo", "test"];

/// Keys shorter than this are treated as placeholders.
pub const MIN_LIVE_KEY_LEN: usize = 20;

/// How a credential is used by the generation client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    /// No network access; the client fabricates a canned response
    Demo,
    /// Requests go to the remote API
    Live,
}

/// An API key. `Debug` never prints the key itself.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a key, trimming surrounding whitespace.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into().trim().to_string())
    }

    /// The mode selected by the shape of the key.
    pub fn mode(&self) -> CredentialMode {
        let key = self.0.as_str();
        if key.is_empty() || key.chars().count() < MIN_LIVE_KEY_LEN || DEMO_KEYS.contains(&key) {
            CredentialMode::Demo
        } else {
            CredentialMode::Live
        }
    }

    /// Whether the key is blank.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw key, for use in request headers and storage only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode() {
            CredentialMode::Demo => write!(f, "Credential(demo)"),
            CredentialMode::Live => write!(f, "Credential(****)"),
        }
    }
}

impl From<&str> for Credential {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for Credential {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}
