//! Maps raw backend failures onto a fixed set of categories.
//!
//! Categories overlap in their surface text (a rate-limit message also
//! mentions resource exhaustion), so the rules are evaluated in a fixed
//! order and the first match wins. The trigger phrases are vendor text,
//! not a contract, so they live in a [`ClassifierPolicy`] that can be
//! overridden from configuration.

use serde::{Deserialize, Serialize};

use crate::error::{ClassifiedError, ErrorKind, RemoteFailure, UnrecognizedCause};

/// Longest excerpt of a raw message carried into a generic error.
pub const MAX_EXCERPT_CHARS: usize = 200;

/// Trigger phrases for each category. Matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierPolicy {
    /// Markers of a suspended credential or denied permission
    pub suspended_markers: Vec<String>,
    /// Markers of generic resource exhaustion
    pub exhaustion_markers: Vec<String>,
    /// Qualifiers that turn an exhaustion marker into a rate limit
    pub rate_qualifiers: Vec<String>,
    /// Markers that mean "rate limited" on their own
    pub too_many_requests_markers: Vec<String>,
    /// Markers of an unsupported content or MIME type
    pub unsupported_content_markers: Vec<String>,
    /// Markers of an invalid argument or credential
    pub invalid_argument_markers: Vec<String>,
    /// Markers of a missing model
    pub not_found_markers: Vec<String>,
}

fn phrases(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self {
            suspended_markers: phrases(&["PERMISSION_DENIED", "suspended"]),
            exhaustion_markers: phrases(&["RESOURCE_EXHAUSTED"]),
            rate_qualifiers: phrases(&[
                "rate limit",
                "rate-limit",
                "ratelimit",
                "minute",
                "requests per",
                "request count",
            ]),
            too_many_requests_markers: phrases(&["too many requests"]),
            unsupported_content_markers: phrases(&[
                "unsupported mime",
                "unsupported file",
                "unsupported content",
                "mime type is not supported",
                "invalid mime",
            ]),
            invalid_argument_markers: phrases(&["INVALID_ARGUMENT", "not valid"]),
            not_found_markers: phrases(&["NOT_FOUND", "not found"]),
        }
    }
}

/// Stateless classifier over a [`ClassifierPolicy`].
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    policy: ClassifierPolicy,
}

impl ErrorClassifier {
    /// Creates a classifier using the given trigger phrases.
    pub fn new(policy: ClassifierPolicy) -> Self {
        Self { policy }
    }

    /// Classifies a raw failure from a call against `model_id`.
    pub fn classify(&self, failure: &RemoteFailure, model_id: &str) -> ClassifiedError {
        let message = failure.message.to_lowercase();
        let has = |markers: &[String]| {
            markers
                .iter()
                .any(|marker| message.contains(&marker.to_lowercase()))
        };
        let status = failure.status;
        let p = &self.policy;

        if has(&p.suspended_markers) || status == Some(403) {
            return ClassifiedError::new(
                ErrorKind::CredentialSuspended,
                "API Key đã bị đình chỉ (suspended). Vui lòng tạo key mới.",
            );
        }

        let exhausted = has(&p.exhaustion_markers);
        if (exhausted && has(&p.rate_qualifiers))
            || has(&p.too_many_requests_markers)
            || status == Some(429)
        {
            return ClassifiedError::new(
                ErrorKind::RateLimited,
                "Đã vượt giới hạn số yêu cầu mỗi phút. Vui lòng chờ một lát rồi thử lại.",
            );
        }

        if exhausted {
            return ClassifiedError::new(
                ErrorKind::QuotaExhausted,
                "API Key đã hết quota. Vui lòng dùng key khác hoặc chờ reset.",
            );
        }

        if has(&p.unsupported_content_markers) {
            return ClassifiedError::new(
                ErrorKind::Unrecognized(UnrecognizedCause::ContentFormat),
                "Định dạng nội dung không được hỗ trợ. Vui lòng gửi lại dưới dạng văn bản thuần hoặc ảnh PNG/JPEG.",
            );
        }

        if has(&p.invalid_argument_markers) || status == Some(400) {
            return ClassifiedError::new(
                ErrorKind::InvalidCredential,
                "API Key không hợp lệ. Vui lòng kiểm tra lại.",
            );
        }

        if has(&p.not_found_markers) || status == Some(404) {
            return ClassifiedError::new(
                ErrorKind::ModelNotFound,
                format!("Model \"{model_id}\" không tồn tại. Vui lòng chọn model khác."),
            );
        }

        ClassifiedError::new(
            ErrorKind::Unrecognized(UnrecognizedCause::Generic),
            format!("Lỗi từ API: {}", excerpt(&failure.message)),
        )
    }
}

fn excerpt(message: &str) -> String {
    message.chars().take(MAX_EXCERPT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(failure: RemoteFailure) -> ClassifiedError {
        ErrorClassifier::default().classify(&failure, "gemini-2.5-flash")
    }

    #[test]
    fn permission_denied_is_suspended() {
        let err = classify(RemoteFailure::new("PERMISSION_DENIED: consumer suspended"));
        assert_eq!(err.kind, ErrorKind::CredentialSuspended);
        assert!(!err.retryable);
    }

    #[test]
    fn status_403_is_suspended_whatever_the_text() {
        let err = classify(RemoteFailure::with_status(403, "RESOURCE_EXHAUSTED rate"));
        assert_eq!(err.kind, ErrorKind::CredentialSuspended);
        assert!(!err.retryable);
    }

    #[test]
    fn exhaustion_with_rate_qualifier_is_rate_limited() {
        let err = classify(RemoteFailure::new(
            "RESOURCE_EXHAUSTED: rate limit exceeded, retry in 2s",
        ));
        assert_eq!(err.kind, ErrorKind::RateLimited);
        assert!(err.retryable);
    }

    #[test]
    fn too_many_requests_and_429_are_rate_limited() {
        assert_eq!(
            classify(RemoteFailure::new("Too Many Requests")).kind,
            ErrorKind::RateLimited
        );
        assert_eq!(
            classify(RemoteFailure::with_status(429, "slow down")).kind,
            ErrorKind::RateLimited
        );
    }

    #[test]
    fn bare_exhaustion_is_quota() {
        let err = classify(RemoteFailure::new("RESOURCE_EXHAUSTED: quota used up"));
        assert_eq!(err.kind, ErrorKind::QuotaExhausted);
        assert!(!err.retryable);
    }

    #[test]
    fn unsupported_mime_beats_status_400() {
        let err = classify(RemoteFailure::with_status(
            400,
            "Unsupported MIME type: application/zip",
        ));
        assert_eq!(
            err.kind,
            ErrorKind::Unrecognized(UnrecognizedCause::ContentFormat)
        );
        assert!(err.user_message.contains("văn bản thuần"));
    }

    #[test]
    fn invalid_argument_is_invalid_credential() {
        let err = classify(RemoteFailure::new("400 INVALID_ARGUMENT: API key not valid"));
        assert_eq!(err.kind, ErrorKind::InvalidCredential);
        assert!(!err.retryable);
        assert_eq!(
            classify(RemoteFailure::with_status(400, "bad")).kind,
            ErrorKind::InvalidCredential
        );
    }

    #[test]
    fn not_found_names_the_model() {
        let err = classify(RemoteFailure::new("NOT_FOUND: models/foo"));
        assert_eq!(err.kind, ErrorKind::ModelNotFound);
        assert!(err.user_message.contains("gemini-2.5-flash"));
        assert_eq!(
            classify(RemoteFailure::with_status(404, "")).kind,
            ErrorKind::ModelNotFound
        );
    }

    #[test]
    fn generic_fallback_truncates_excerpt() {
        let raw = "x".repeat(500);
        let err = classify(RemoteFailure::new(raw));
        assert_eq!(err.kind, ErrorKind::Unrecognized(UnrecognizedCause::Generic));
        let xs = err.user_message.chars().filter(|c| *c == 'x').count();
        assert_eq!(xs, MAX_EXCERPT_CHARS);
    }

    #[test]
    fn custom_policy_changes_triggers() {
        let policy = ClassifierPolicy {
            exhaustion_markers: vec!["out of juice".into()],
            ..ClassifierPolicy::default()
        };
        let classifier = ErrorClassifier::new(policy);
        let err = classifier.classify(&RemoteFailure::new("OUT OF JUICE"), "m");
        assert_eq!(err.kind, ErrorKind::QuotaExhausted);
        let err = classifier.classify(&RemoteFailure::new("RESOURCE_EXHAUSTED"), "m");
        assert_eq!(err.kind, ErrorKind::Unrecognized(UnrecognizedCause::Generic));
    }
}
