//! Error types for the chemistry tutor client.

use std::fmt;

use thiserror::Error;

/// A raw failure surfaced by a generation backend.
///
/// This is the opaque shape the classifier works from: a human-readable
/// message and, when the transport knows it, a numeric status code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteFailure {
    /// Message reported by the backend or the transport
    pub message: String,
    /// HTTP-style status code, if one was reported
    pub status: Option<u16>,
}

impl RemoteFailure {
    /// Creates a failure that only carries a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    /// Creates a failure carrying both a status code and a message.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }
}

impl From<reqwest::Error> for RemoteFailure {
    fn from(err: reqwest::Error) -> Self {
        Self {
            message: err.to_string(),
            status: err.status().map(|s| s.as_u16()),
        }
    }
}

/// Sub-category of an unrecognized failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnrecognizedCause {
    /// The backend rejected the content format or MIME type
    ContentFormat,
    /// Nothing else matched
    Generic,
}

/// Category assigned to a failed generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The credential was rejected as invalid
    InvalidCredential,
    /// The credential was suspended or lacks permission
    CredentialSuspended,
    /// Too many requests in a short window; the only retryable kind
    RateLimited,
    /// The credential's quota is used up
    QuotaExhausted,
    /// The requested model does not exist
    ModelNotFound,
    /// No known category matched
    Unrecognized(UnrecognizedCause),
    /// The call succeeded but produced no text
    EmptyResponse,
    /// The retry loop ended without an outcome
    Unknown,
}

impl ErrorKind {
    /// Whether the caller should discard the stored credential and ask for a new one.
    pub fn requires_new_credential(self) -> bool {
        matches!(
            self,
            Self::InvalidCredential | Self::QuotaExhausted | Self::CredentialSuspended
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredential => write!(f, "invalid_credential"),
            Self::CredentialSuspended => write!(f, "credential_suspended"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::QuotaExhausted => write!(f, "quota_exhausted"),
            Self::ModelNotFound => write!(f, "model_not_found"),
            Self::Unrecognized(UnrecognizedCause::ContentFormat) => {
                write!(f, "unrecognized_content_format")
            }
            Self::Unrecognized(UnrecognizedCause::Generic) => write!(f, "unrecognized"),
            Self::EmptyResponse => write!(f, "empty_response"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A failure reduced to a category and one user-facing sentence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{user_message}")]
pub struct ClassifiedError {
    /// Category of the failure
    pub kind: ErrorKind,
    /// Localized message safe to show to the user
    pub user_message: String,
    /// Whether the retry controller may try again
    pub retryable: bool,
}

impl ClassifiedError {
    /// Creates a classified error. Only [`ErrorKind::RateLimited`] is ever retryable.
    pub fn new(kind: ErrorKind, user_message: impl Into<String>) -> Self {
        Self {
            kind,
            user_message: user_message.into(),
            retryable: kind == ErrorKind::RateLimited,
        }
    }

    /// The error used when a call succeeds with empty text.
    pub fn empty_response() -> Self {
        Self::new(
            ErrorKind::EmptyResponse,
            "API trả về rỗng. Vui lòng thử lại.",
        )
    }

    /// The error used when the retry loop ends without an outcome.
    pub fn unknown() -> Self {
        Self::new(
            ErrorKind::Unknown,
            "Đã xảy ra lỗi không xác định. Vui lòng thử lại.",
        )
    }
}

/// Errors that can occur when using the generation client.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The remote call failed and was classified.
    #[error(transparent)]
    Generation(#[from] ClassifiedError),

    /// The request could not be built from the given input.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl GenerationError {
    /// Returns the classification if this error came from a remote call.
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            Self::Generation(classified) => Some(classified),
            _ => None,
        }
    }

    /// The single sentence to show the user for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::Generation(classified) => classified.user_message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rate_limited_is_retryable() {
        let kinds = [
            ErrorKind::InvalidCredential,
            ErrorKind::CredentialSuspended,
            ErrorKind::QuotaExhausted,
            ErrorKind::ModelNotFound,
            ErrorKind::Unrecognized(UnrecognizedCause::ContentFormat),
            ErrorKind::Unrecognized(UnrecognizedCause::Generic),
            ErrorKind::EmptyResponse,
            ErrorKind::Unknown,
        ];
        for kind in kinds {
            assert!(!ClassifiedError::new(kind, "x").retryable, "{kind}");
        }
        assert!(ClassifiedError::new(ErrorKind::RateLimited, "x").retryable);
    }

    #[test]
    fn credential_kinds_require_new_credential() {
        assert!(ErrorKind::InvalidCredential.requires_new_credential());
        assert!(ErrorKind::QuotaExhausted.requires_new_credential());
        assert!(ErrorKind::CredentialSuspended.requires_new_credential());
        assert!(!ErrorKind::RateLimited.requires_new_credential());
        assert!(!ErrorKind::ModelNotFound.requires_new_credential());
    }

    #[test]
    fn generation_error_displays_user_message() {
        let err = GenerationError::from(ClassifiedError::empty_response());
        assert_eq!(err.to_string(), "API trả về rỗng. Vui lòng thử lại.");
        assert_eq!(err.user_message(), err.to_string());
        assert!(err.classified().is_some());
    }

    #[test]
    fn invalid_request_is_unclassified() {
        let err = GenerationError::InvalidRequest("model id is empty".into());
        assert!(err.classified().is_none());
        assert_eq!(err.user_message(), "Invalid request: model id is empty");
    }
}
