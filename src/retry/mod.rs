//! Sequential retry loop with linear backoff and jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use typed_builder::TypedBuilder;

use crate::classifier::ErrorClassifier;
use crate::error::{ClassifiedError, RemoteFailure};

/// Default number of attempts per call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default backoff step, multiplied by the attempt number.
pub const DEFAULT_BASE_DELAY_MS: u64 = 5000;
/// Default upper bound (exclusive) of the random jitter.
pub const DEFAULT_MAX_JITTER_MS: u64 = 2000;

/// Timing and attempt limits for the retry loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[builder(doc)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,
    /// Backoff step in milliseconds
    #[builder(default = DEFAULT_BASE_DELAY_MS)]
    pub base_delay_ms: u64,
    /// Jitter bound in milliseconds
    #[builder(default = DEFAULT_MAX_JITTER_MS)]
    pub max_jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    /// Delay before the attempt after `attempt`: `attempt * base + [0, jitter)`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let jitter = if self.max_jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..self.max_jitter_ms)
        };
        Duration::from_millis(u64::from(attempt) * self.base_delay_ms + jitter)
    }
}

/// Attempt counter for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Current attempt, starting at 1
    pub attempt: u32,
    /// Upper bound for `attempt`
    pub max_attempts: u32,
}

impl RetryState {
    /// Starts a fresh counter.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 1,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Whether another attempt is allowed after the current one.
    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }

    fn advance(&mut self) {
        self.attempt += 1;
    }
}

/// Drives one remote call through classification and backoff.
#[derive(Debug, Clone, Default)]
pub struct RetryController {
    policy: RetryPolicy,
    classifier: ErrorClassifier,
}

impl RetryController {
    /// Creates a controller.
    pub fn new(policy: RetryPolicy, classifier: ErrorClassifier) -> Self {
        Self { policy, classifier }
    }

    /// The classifier deciding which failures are retried.
    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Runs `operation` until it yields text, fails permanently, or runs out
    /// of attempts.
    ///
    /// Empty text counts as a permanent failure. Only failures classified as
    /// rate limits are retried.
    pub async fn run<F, Fut>(
        &self,
        model_id: &str,
        mut operation: F,
    ) -> Result<String, ClassifiedError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, RemoteFailure>>,
    {
        let mut state = RetryState::new(self.policy.max_attempts);

        while state.attempt <= state.max_attempts {
            debug!(attempt = state.attempt, model = model_id, "invoking generation backend");
            match operation().await {
                Ok(text) if text.trim().is_empty() => {
                    return Err(ClassifiedError::empty_response());
                }
                Ok(text) => return Ok(text),
                Err(failure) => {
                    let classified = self.classifier.classify(&failure, model_id);
                    if classified.retryable && state.can_retry() {
                        let delay = self.policy.backoff_for(state.attempt);
                        warn!(
                            attempt = state.attempt,
                            max_attempts = state.max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            kind = %classified.kind,
                            "retryable failure, backing off"
                        );
                        tokio::time::sleep(delay).await;
                        state.advance();
                        continue;
                    }
                    warn!(
                        attempt = state.attempt,
                        kind = %classified.kind,
                        error = %failure,
                        "generation failed"
                    );
                    return Err(classified);
                }
            }
        }

        Err(ClassifiedError::unknown())
    }
}
