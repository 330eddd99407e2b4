//! Client implementation for the Gemini AI API.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, info};

use crate::{
    error::{ClassifiedError, ErrorKind, GenerationError, RemoteFailure},
    models::{
        Credential, CredentialMode, ErrorResponse, GenerationRequest, PromptInput, Request,
        Response,
    },
    retry::RetryController,
};

/// Default API endpoint for Google's Generative AI service
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// Default API version
const DEFAULT_API_VERSION: &str = "v1beta";
/// Header carrying the API key, so it never ends up in a logged URL
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Marker that starts every demo-mode response.
pub const DEMO_MARKER: &str = "[DEMO MODE]";
/// Simulated latency of a demo-mode generation.
pub const DEMO_RESPONSE_DELAY: Duration = Duration::from_millis(1500);
/// Simulated latency of a demo-mode connection test.
pub const DEMO_PROBE_DELAY: Duration = Duration::from_millis(1000);
/// Prompt sent by [`GenerationClient::test_connection`].
const PROBE_PROMPT: &str = "Xin chào! Đây là tin nhắn test kết nối.";

/// Anything that can turn a request into generated text with one remote call.
///
/// The retry and classification logic only depends on this capability, so a
/// fake can stand in for the HTTP backend in tests.
pub trait ContentGenerator: Send + Sync {
    /// Performs exactly one remote call.
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
        api_key: &'a str,
    ) -> BoxFuture<'a, Result<String, RemoteFailure>>;
}

/// HTTP backend for the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GenerativeModel {
    base_url: String,
    client: reqwest::Client,
}

impl Default for GenerativeModel {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerativeModel {
    /// Creates a backend pointed at the public Gemini endpoint.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Creates a backend pointed at another endpoint (a proxy or a test server).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn build_url(&self, model_id: &str) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            self.base_url, DEFAULT_API_VERSION, model_id
        )
    }

    /// Sends one `generateContent` request and parses the response.
    ///
    /// # Errors
    ///
    /// Returns a [`RemoteFailure`] carrying the API's status and message when
    /// the request fails or the response cannot be parsed.
    pub async fn generate_content(
        &self,
        request: &GenerationRequest,
        api_key: &str,
    ) -> Result<Response, RemoteFailure> {
        let url = self.build_url(request.model_id());
        debug!(
            model = request.model_id(),
            parts = request.parts().len(),
            "sending generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(&Request::from(request))
            .send()
            .await
            .map_err(|e| RemoteFailure::from(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(failure_from_body(status.as_u16(), &error_body));
        }

        response
            .json::<Response>()
            .await
            .map_err(|e| RemoteFailure::from(e.without_url()))
    }
}

/// Turns a non-success body into a failure whose message keeps the canonical
/// status name (`INVALID_ARGUMENT: ...`) the classifier looks for.
fn failure_from_body(status: u16, body: &str) -> RemoteFailure {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(ErrorResponse { error }) => {
            let message = match error.status {
                Some(name) => format!("{name}: {}", error.message),
                None => error.message,
            };
            RemoteFailure::with_status(error.code.unwrap_or(status), message)
        }
        Err(_) => RemoteFailure::with_status(
            status,
            format!("Request failed with status {status}: {body}"),
        ),
    }
}

impl ContentGenerator for GenerativeModel {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
        api_key: &'a str,
    ) -> BoxFuture<'a, Result<String, RemoteFailure>> {
        async move { Ok(self.generate_content(request, api_key).await?.text()) }.boxed()
    }
}

/// Front door for generation: demo mode, request building and retries.
#[derive(Debug, Clone)]
pub struct GenerationClient<G = GenerativeModel> {
    backend: G,
    retry: RetryController,
    demo_delay: Duration,
    probe_delay: Duration,
}

impl GenerationClient<GenerativeModel> {
    /// Creates a client backed by the public Gemini endpoint.
    pub fn gemini() -> Self {
        Self::new(GenerativeModel::new())
    }
}

impl<G: ContentGenerator> GenerationClient<G> {
    /// Creates a client over `backend` with the default retry policy.
    pub fn new(backend: G) -> Self {
        Self {
            backend,
            retry: RetryController::default(),
            demo_delay: DEMO_RESPONSE_DELAY,
            probe_delay: DEMO_PROBE_DELAY,
        }
    }

    /// Replaces the retry controller.
    pub fn with_retry(mut self, retry: RetryController) -> Self {
        self.retry = retry;
        self
    }

    /// Overrides the simulated demo-mode latencies.
    pub fn with_demo_delays(mut self, response: Duration, probe: Duration) -> Self {
        self.demo_delay = response;
        self.probe_delay = probe;
        self
    }

    /// The backend this client calls.
    pub fn backend(&self) -> &G {
        &self.backend
    }

    /// Generates text for `input` against `model_id`.
    ///
    /// A demo credential short-circuits to a canned response after a fixed
    /// delay without touching the backend.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::InvalidRequest`] for malformed input and
    /// [`GenerationError::Generation`] with a single user-facing message when
    /// the remote call fails.
    pub async fn generate(
        &self,
        model_id: &str,
        input: impl Into<PromptInput>,
        credential: &Credential,
        system_instruction: Option<&str>,
    ) -> Result<String, GenerationError> {
        let input = input.into();

        if credential.mode() == CredentialMode::Demo {
            info!(model = model_id, "demo credential, skipping remote call");
            tokio::time::sleep(self.demo_delay).await;
            return Ok(demo_response(model_id, &input));
        }

        let request = GenerationRequest::build(model_id, input, system_instruction)?;
        let api_key = credential.expose();
        let text = self
            .retry
            .run(request.model_id(), || self.backend.generate(&request, api_key))
            .await?;
        Ok(text)
    }

    /// Validates a credential with a single, unretried call.
    ///
    /// Demo credentials always succeed after a short simulated delay.
    ///
    /// # Errors
    ///
    /// Returns the classified failure, or an empty-response error when the
    /// model answers with no text.
    pub async fn test_connection(
        &self,
        credential: &Credential,
        model_id: &str,
    ) -> Result<(), GenerationError> {
        if credential.mode() == CredentialMode::Demo {
            tokio::time::sleep(self.probe_delay).await;
            return Ok(());
        }

        let request = GenerationRequest::build(model_id, PROBE_PROMPT, None)?;
        match self.backend.generate(&request, credential.expose()).await {
            Ok(text) if text.trim().is_empty() => Err(ClassifiedError::new(
                ErrorKind::EmptyResponse,
                "API không phản hồi.",
            )
            .into()),
            Ok(_) => Ok(()),
            Err(failure) => Err(self
                .retry
                .classifier()
                .classify(&failure, model_id)
                .into()),
        }
    }
}

fn demo_response(model_id: &str, input: &PromptInput) -> String {
    format!(
        "{DEMO_MARKER} Đây là nội dung mẫu. Vui lòng nhập API Key thật để tạo nội dung.

Model: {model_id}
Prompt: {}...

Để lấy API Key miễn phí:
1. Truy cập https://aistudio.google.com/apikey
2. Đăng nhập Google Account
3. Tạo API Key mới
4. Copy và paste vào Settings",
        input.preview(100)
    )
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use tokio::time::Instant;

    use super::*;
    use crate::error::UnrecognizedCause;
    use crate::models::ContentPart;

    /// Scripted backend that records every call.
    #[derive(Default)]
    struct FakeBackend {
        replies: Mutex<VecDeque<Result<String, RemoteFailure>>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl FakeBackend {
        fn replying(replies: Vec<Result<String, RemoteFailure>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::default(),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl ContentGenerator for FakeBackend {
        fn generate<'a>(
            &'a self,
            request: &'a GenerationRequest,
            api_key: &'a str,
        ) -> BoxFuture<'a, Result<String, RemoteFailure>> {
            self.calls
                .lock()
                .unwrap()
                .push((request.model_id().to_string(), api_key.to_string()));
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RemoteFailure::new("no scripted reply")));
            async move { reply }.boxed()
        }
    }

    const LIVE_KEY: &str = "sk-abcdefghijklmnopqrstuvwxyz";

    #[tokio::test(start_paused = true)]
    async fn empty_credential_returns_demo_text_without_network() {
        let client = GenerationClient::new(FakeBackend::default());
        let started = Instant::now();

        let text = client
            .generate("gemini-2.5-flash", "Cân bằng Al + O₂", &Credential::new(""), None)
            .await
            .unwrap();

        assert!(text.starts_with(DEMO_MARKER));
        assert!(text.contains("Cân bằng Al + O₂"));
        assert_eq!(started.elapsed(), DEMO_RESPONSE_DELAY);
        assert_eq!(client.backend().call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn live_key_calls_backend_once_per_attempt() {
        let backend = FakeBackend::replying(vec![
            Err(RemoteFailure::with_status(429, "Too Many Requests")),
            Ok("Lời giải".into()),
        ]);
        let client = GenerationClient::new(backend);

        let text = client
            .generate("gemini-2.5-flash", "đề bài", &Credential::new(LIVE_KEY), Some("persona"))
            .await
            .unwrap();

        assert_eq!(text, "Lời giải");
        let calls = client.backend().calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(model, key)| model == "gemini-2.5-flash" && key == LIVE_KEY));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_success_surfaces_error() {
        let client = GenerationClient::new(FakeBackend::replying(vec![Ok(String::new())]));
        let err = client
            .generate("m", "x", &Credential::new(LIVE_KEY), None)
            .await
            .unwrap_err();
        assert_eq!(err.classified().unwrap().kind, ErrorKind::EmptyResponse);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_input_never_reaches_backend() {
        let client = GenerationClient::new(FakeBackend::default());
        let err = client
            .generate("m", Vec::<ContentPart>::new(), &Credential::new(LIVE_KEY), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::InvalidRequest(_)));
        assert_eq!(client.backend().call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_does_not_retry() {
        let client = GenerationClient::new(FakeBackend::replying(vec![
            Err(RemoteFailure::with_status(429, "Too Many Requests")),
            Ok("hi".into()),
        ]));
        let err = client
            .test_connection(&Credential::new(LIVE_KEY), "m")
            .await
            .unwrap_err();
        assert_eq!(err.classified().unwrap().kind, ErrorKind::RateLimited);
        assert_eq!(client.backend().call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_demo_always_succeeds() {
        let client = GenerationClient::new(FakeBackend::default());
        let started = Instant::now();
        client
            .test_connection(&Credential::new("demo"), "m")
            .await
            .unwrap();
        assert_eq!(started.elapsed(), DEMO_PROBE_DELAY);
        assert_eq!(client.backend().call_count(), 0);
    }

    #[test]
    fn error_body_keeps_status_name() {
        let failure = failure_from_body(
            400,
            r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#,
        );
        assert_eq!(failure.status, Some(400));
        assert!(failure.message.starts_with("INVALID_ARGUMENT: API key not valid"));

        let failure = failure_from_body(502, "<html>bad gateway</html>");
        assert_eq!(failure.status, Some(502));
        assert!(failure.message.contains("bad gateway"));
        let kind = crate::classifier::ErrorClassifier::default()
            .classify(&failure, "m")
            .kind;
        assert_eq!(kind, ErrorKind::Unrecognized(UnrecognizedCause::Generic));
    }
}
