use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::ExponentialBuilder;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::{debug, warn};

use crate::api::OpenAiApi;
use crate::config::{BasicConfig, LlmConfig};
use crate::error::ChronikosError;
use crate::types::openai::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};

/// Text produced by one completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub text: String,
    pub model: String,
}

/// Turns a prompt into text. The seam between the services and the LLM vendor.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Generated, ChronikosError>;
}

fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

/// OpenAI-compatible chat-completions backend.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    cfg: LlmConfig,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl OpenAiGenerator {
    pub fn new(cfg: LlmConfig, basic: &BasicConfig) -> Result<Self, ChronikosError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("chronikos/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)));
        if let Some(proxy_url) = basic.proxy.as_ref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }
        let client = builder.build()?;

        let per_minute = NonZeroU32::new(cfg.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        Ok(Self {
            client,
            cfg,
            limiter,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<Generated, ChronikosError> {
        self.limiter.until_ready().await;

        let body = ChatCompletionRequest {
            model: &self.cfg.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.cfg.max_tokens,
            temperature: self.cfg.temperature,
        };

        let resp = OpenAiApi::try_post_chat(
            self.client.clone(),
            &self.cfg.base_url,
            &self.cfg.api_key,
            default_retry_policy(),
            &body,
        )
        .await?;

        let status = resp.status();
        if !status.is_success() {
            warn!(status = %status, "LLM request rejected");
            return Err(ChronikosError::UpstreamStatus(status));
        }

        let parsed: ChatCompletionResponse = resp.json().await?;
        let model = parsed.model.clone().unwrap_or_else(|| self.cfg.model.clone());
        let text = parsed.into_text().ok_or(ChronikosError::EmptyCompletion)?;
        debug!(model = %model, chars = text.chars().count(), "LLM completion received");

        Ok(Generated { text, model })
    }
}
