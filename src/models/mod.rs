//! Data structures for generation requests, responses and settings.

mod credential;
mod generation;
mod part;
mod request;
mod response;
mod settings;

pub use credential::{Credential, CredentialMode, DEMO_KEYS, MIN_LIVE_KEY_LEN};
pub use generation::{ContentPart, GenerationRequest, PromptInput};
pub use part::{InlineData, Part};
pub use request::{Content, Request, Role};
pub use response::{Candidate, ErrorDetail, ErrorResponse, Response, UsageMetadata};
pub use settings::{Settings, CUSTOM_MODEL, DEFAULT_MODEL};
