//! LLM API interaction with exponential backoff retry logic.
//!
//! This module provides the interface for communicating with an
//! OpenAI-compatible chat completions API. It includes automatic retry logic
//! with exponential backoff and jitter to handle transient failures.
//!
//! # Architecture
//!
//! - [`AskAsync`]: Core trait defining async LLM interaction
//! - [`OpenAiClient`]: `POST /v1/chat/completions` over `reqwest`
//! - [`RetryAsk`]: Decorator that adds retry logic to any `AskAsync` implementation
//!
//! # Retry Strategy
//!
//! - Exponential backoff starting at the base delay
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use std::fmt;
use std::time::{Duration as StdDuration, Instant};

use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::error::{RecapError, RecapResult};

/// Everything one model call needs: system and developer instructions,
/// optional few-shot examples and the user message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptBundle {
    pub system: String,
    pub developer: Option<String>,
    /// `(user, assistant)` example pairs sent before the real request.
    pub examples: Vec<(String, String)>,
    pub user: String,
    pub temperature: Option<f32>,
}

impl PromptBundle {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            ..Self::default()
        }
    }

    pub fn with_developer(mut self, developer: impl Into<String>) -> Self {
        self.developer = Some(developer.into());
        self
    }

    pub fn with_example(mut self, user: impl Into<String>, assistant: impl Into<String>) -> Self {
        self.examples.push((user.into(), assistant.into()));
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Chat messages in wire order.
    ///
    /// Developer instructions are sent as a second system message, which every
    /// OpenAI-compatible server accepts.
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::new("system", &self.system)];
        if let Some(developer) = &self.developer {
            messages.push(ChatMessage::new("system", developer));
        }
        for (user, assistant) in &self.examples {
            messages.push(ChatMessage::new("user", user));
            messages.push(ChatMessage::new("assistant", assistant));
        }
        messages.push(ChatMessage::new("user", &self.user));
        messages
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

/// Trait for async LLM interaction.
///
/// Implementors send a prompt to a model and return its text. This seam lets
/// the retry decorator and test doubles stand in for the real client.
pub trait AskAsync {
    /// Send a prompt and receive the model's text response.
    async fn ask(&self, prompt: &PromptBundle) -> RecapResult<String>;
}

impl<T: AskAsync> AskAsync for &T {
    async fn ask(&self, prompt: &PromptBundle) -> RecapResult<String> {
        (**self).ask(prompt).await
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// # Backoff Strategy
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    /// The underlying LLM client to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Create a new retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = OpenAiClient::from_config(&config)?;
    /// let retry_client = RetryAsk::new(client, 3, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    #[instrument(level = "info", skip_all)]
    async fn ask(&self, prompt: &PromptBundle) -> RecapResult<String> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(prompt).await {
                Ok(resp) => {
                    info!(
                        attempts = attempt + 1,
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        "ask() succeeded"
                    );
                    return Ok(resp);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1).min(16));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Client for an OpenAI-compatible `chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: StdDuration,
    ) -> RecapResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: completions_endpoint(base_url),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &Config) -> RecapResult<Self> {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or_else(|| RecapError::Config("OPENAI_API_KEY is not set".to_string()))?;
        Self::new(
            &config.openai_base_url,
            api_key,
            config.openai_model.clone(),
            config.request_timeout,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl AskAsync for OpenAiClient {
    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn ask(&self, prompt: &PromptBundle) -> RecapResult<String> {
        let t0 = Instant::now();
        let body = ChatRequest {
            model: &self.model,
            messages: prompt.messages(),
            temperature: prompt.temperature,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = RecapError::from_response("OpenAI", response).await;
            warn!(elapsed_ms = t0.elapsed().as_millis() as u64, error = %err, "API call failed");
            return Err(err);
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(RecapError::EmptyResponse("OpenAI"))?;

        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            chars = content.chars().count(),
            "API call completed"
        );
        Ok(content)
    }
}

/// Client with the configured retry policy applied.
pub fn client_with_backoff(config: &Config) -> RecapResult<RetryAsk<OpenAiClient>> {
    let client = OpenAiClient::from_config(config)?;
    info!(model = client.model(), max_retries = config.max_retries, "Model client ready");
    Ok(RetryAsk::new(
        client,
        config.max_retries,
        StdDuration::from_secs(1),
    ))
}

fn completions_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/v1") {
        format!("{base}/chat/completions")
    } else {
        format!("{base}/v1/chat/completions")
    }
}
