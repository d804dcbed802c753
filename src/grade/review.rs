#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Scoring client: submits rendered submissions to an OpenAI-compatible
//! service, with a health-probed retry when an attempt fails.

use std::{sync::Arc, time::Duration};

use async_openai::{
    Client as OpenAIClient,
    config::OpenAIConfig,
    types::{ChatCompletionRequestMessage, CreateChatCompletionRequestArgs},
};
use async_trait::async_trait;

use crate::config::{self, AssessmentConfig};

/// Errors the scoring stage can surface.
#[derive(thiserror::Error, Debug)]
pub enum ScoringError {
    /// The request exceeded its wall-clock budget.
    #[error("Scoring request timed out after {0:?}")]
    Timeout(Duration),
    /// The service rejected the request or could not be reached.
    #[error("Scoring service unavailable: {0}")]
    Unavailable(String),
    /// The service answered with no usable content.
    #[error("Scoring service returned an empty response")]
    EmptyResponse,
}

/// A service that can score a rendered submission.
#[async_trait]
pub trait ScoringBackend: Send + Sync {
    /// Submits the chat messages and returns the raw response text.
    async fn submit(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<String, ScoringError>;

    /// Probes service availability without submitting work.
    async fn health(&self) -> Result<(), ScoringError>;
}

/// Backend speaking the OpenAI chat-completion protocol.
pub struct OpenAiBackend {
    /// Base URL for the API endpoint.
    api_base:        String,
    /// API key for request authentication.
    api_key:         String,
    /// Model identifier for chat completions.
    model:           String,
    /// Optional temperature override.
    temperature:     Option<f32>,
    /// Optional top-p override.
    top_p:           Option<f32>,
    /// URL probed for availability.
    health_endpoint: String,
    /// Shared HTTP client for health probes.
    http:            reqwest::Client,
}

impl OpenAiBackend {
    /// Builds a backend from the environment-sourced scoring config;
    /// returns `None` when the environment is not configured.
    pub fn from_env() -> Option<Self> {
        let env = config::scoring_config()?;

        Some(Self {
            api_base:        env.api_base().to_string(),
            api_key:         env.api_key().to_string(),
            model:           env.model().to_string(),
            temperature:     env.temperature(),
            top_p:           env.top_p(),
            health_endpoint: env.health_endpoint(),
            http:            config::http_client(),
        })
    }
}

#[async_trait]
impl ScoringBackend for OpenAiBackend {
    async fn submit(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<String, ScoringError> {
        let client = OpenAIClient::with_config(
            OpenAIConfig::new()
                .with_api_base(&self.api_base)
                .with_api_key(&self.api_key),
        );

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(self.model.clone()).messages(messages).n(1);
        if let Some(temperature) = self.temperature {
            builder.temperature(temperature);
        }
        if let Some(top_p) = self.top_p {
            builder.top_p(top_p);
        }
        let request = builder
            .build()
            .map_err(|err| ScoringError::Unavailable(err.to_string()))?;

        let response = client
            .chat()
            .create(request)
            .await
            .map_err(|err| ScoringError::Unavailable(err.to_string()))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or(ScoringError::EmptyResponse)
    }

    async fn health(&self) -> Result<(), ScoringError> {
        let response = self
            .http
            .get(&self.health_endpoint)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|err| ScoringError::Unavailable(err.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ScoringError::Unavailable(format!(
                "health probe answered {}",
                response.status()
            )))
        }
    }
}

/// Drives scoring attempts against a backend, enforcing the request
/// budget and the bounded, health-probed retry.
pub struct ScoringClient {
    /// The service being driven.
    backend:      Arc<dyn ScoringBackend>,
    /// Wall-clock budget per attempt.
    timeout:      Duration,
    /// Retries allowed after a failed attempt.
    retry_budget: u32,
}

impl ScoringClient {
    /// Creates a client over an arbitrary backend.
    pub fn new(backend: Arc<dyn ScoringBackend>, config: &AssessmentConfig) -> Self {
        Self {
            backend,
            timeout: config.scoring_timeout(),
            retry_budget: config.scoring_retry_budget(),
        }
    }

    /// Creates a client over the environment-configured OpenAI backend;
    /// returns `None` when the environment is not configured.
    pub fn from_env(config: &AssessmentConfig) -> Option<Self> {
        OpenAiBackend::from_env().map(|backend| Self::new(Arc::new(backend), config))
    }

    /// Submits the messages and returns the raw response text. A failed
    /// attempt is retried only after the backend reports healthy, and
    /// only as many times as the retry budget allows.
    pub async fn score(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<String, ScoringError> {
        let mut remaining = self.retry_budget;

        loop {
            let failure =
                match tokio::time::timeout(self.timeout, self.backend.submit(messages.clone()))
                    .await
                {
                    Ok(Ok(text)) if !text.trim().is_empty() => return Ok(text),
                    Ok(Ok(_)) => ScoringError::EmptyResponse,
                    Ok(Err(err)) => err,
                    Err(_) => ScoringError::Timeout(self.timeout),
                };

            if remaining == 0 {
                return Err(failure);
            }
            remaining -= 1;

            // No retry without evidence the service recovered.
            self.backend.health().await?;
            tracing::warn!("scoring attempt failed ({failure}), retrying after healthy probe");
        }
    }
}
