/// Generative-text client with bounded retries
///
/// One POST per attempt to `{api_url}/{model}:generateContent`. Outcomes are
/// classified as success, retryable (5xx, 429, connect/timeout/send errors)
/// or fatal (any other 4xx); retryable ones back off exponentially with
/// jitter until the attempt budget runs out.
use std::time::Duration;

use rand::Rng;
use reqwest::{Client as HttpClient, StatusCode};

use crate::{
    config::Config,
    error::LlmError,
    models::{GenerateContentRequest, GenerateContentResponse},
};

/// Upper bound of the random jitter added to every backoff
const MAX_JITTER_MS: u64 = 50;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send `prompt` and return the first text span of the reply, trimmed
    ///
    /// An empty string means the model answered without text.
    async fn generate(&self, prompt: &str, credential: &str) -> Result<String, LlmError>;
}

/// Kind of retryable failure, which decides how steeply backoff grows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    RateLimited,
    Server,
    Network,
}

impl FailureClass {
    fn multiplier(self) -> f64 {
        match self {
            FailureClass::RateLimited => 2.0,
            FailureClass::Server | FailureClass::Network => 1.5,
        }
    }
}

/// Retry class for a non-success status; `None` means fatal
pub fn classify_status(status: StatusCode) -> Option<FailureClass> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        Some(FailureClass::RateLimited)
    } else if status.is_server_error() {
        Some(FailureClass::Server)
    } else {
        None
    }
}

/// Delay before retrying after failed attempt `attempt` (1-based)
///
/// `base * multiplier^(attempt - 1) + jitter`
pub fn backoff_delay(base: Duration, attempt: u32, class: FailureClass, jitter: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1) as i32;
    let millis = base.as_millis() as f64 * class.multiplier().powi(exponent);
    Duration::from_millis(millis.round() as u64) + jitter
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(300),
        }
    }
}

/// Gemini generateContent client
#[derive(Clone)]
pub struct GeminiClient {
    http_client: HttpClient,
    api_url: String,
    model: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(api_url: String, model: String, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            model,
            timeout,
            retry,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.gemini_url.clone(),
            config.gemini_model.clone(),
            Duration::from_millis(config.llm_timeout_ms),
            RetryPolicy {
                max_retries: config.llm_retries,
                base_delay: Duration::from_millis(config.llm_base_delay_ms),
            },
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.api_url, self.model)
    }

    /// One request/response exchange, with failures tagged by retry class
    async fn attempt(
        &self,
        url: &str,
        body: &GenerateContentRequest,
        credential: &str,
    ) -> Result<String, (Option<FailureClass>, LlmError)> {
        let response = self
            .http_client
            .post(url)
            .query(&[("key", credential)])
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(network_failure)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = LlmError::Status {
                status: status.as_u16(),
                body,
            };
            return Err((classify_status(status), error));
        }

        let payload: GenerateContentResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                (Some(FailureClass::Network), LlmError::Timeout)
            } else {
                (None, LlmError::Decode(e.without_url().to_string()))
            }
        })?;

        Ok(payload.first_text().unwrap_or_default())
    }
}

/// Connect, timeout and send failures are retryable; anything else is not
///
/// The URL is dropped from the message since it carries the credential.
fn network_failure(err: reqwest::Error) -> (Option<FailureClass>, LlmError) {
    let err = err.without_url();
    if err.is_timeout() {
        (Some(FailureClass::Network), LlmError::Timeout)
    } else if err.is_connect() || err.is_request() {
        (Some(FailureClass::Network), LlmError::Network(err.to_string()))
    } else {
        (None, LlmError::Request(err.to_string()))
    }
}

fn jitter() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..=MAX_JITTER_MS))
}

#[async_trait::async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str, credential: &str) -> Result<String, LlmError> {
        let url = self.endpoint();
        let body = GenerateContentRequest::single_turn(prompt);
        let max_attempts = self.retry.max_retries + 1;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let (class, error) = match self.attempt(&url, &body, credential).await {
                Ok(text) => {
                    tracing::debug!(attempt, chars = text.len(), "LLM response received");
                    return Ok(text);
                }
                Err((Some(class), error)) => (class, error),
                Err((None, error)) => {
                    tracing::error!(attempt, error = %error, "LLM request failed permanently");
                    return Err(error);
                }
            };

            if attempt >= max_attempts {
                tracing::warn!(attempts = attempt, error = %error, "LLM retries exhausted");
                return Err(error);
            }

            let delay = backoff_delay(self.retry.base_delay, attempt, class, jitter());
            tracing::warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "LLM request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
