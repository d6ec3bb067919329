//! Chat-completion adapter (primary provider, OpenAI-style API).
//!
//! The node's configuration supplies `systemPrompt`, `model`,
//! `temperature`, and `maxTokens`; the combined upstream text becomes the
//! user message. Rate-limit responses are retried on a short backoff, then
//! reported as a quota failure on the node. Every other failure surfaces
//! immediately.
//!
//! # Example
//!
//! ```rust,ignore
//! use flow_providers::chat::{ChatCompletionHandler, HttpChatApi};
//! use flow_providers::config::ChatProviderConfig;
//!
//! let config = ChatProviderConfig::from_env();
//! let handler = ChatCompletionHandler::new(HttpChatApi::new(config.clone()), config);
//! ```

use crate::config::ChatProviderConfig;
use crate::error::{ProviderError, Result};
use async_trait::async_trait;
use flow_core::{NodeContext, NodeHandler, NodeOutput};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Total attempts for rate-limited requests (first try included).
const RATE_LIMIT_ATTEMPTS: u32 = 3;
/// Backoff before the first retry; doubles for the second.
const RATE_LIMIT_BASE_DELAY: Duration = Duration::from_secs(1);

/// One chat-completion request, provider-format agnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub user_message: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

/// Transport seam for the chat provider. Production uses [`HttpChatApi`];
/// tests inject deterministic fakes.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Run one completion and return the assistant's text.
    async fn complete(&self, request: ChatCompletionRequest) -> Result<String>;
}

/// Live transport against an OpenAI-style `/chat/completions` endpoint.
#[derive(Clone)]
pub struct HttpChatApi {
    config: ChatProviderConfig,
    client: Client,
}

impl HttpChatApi {
    /// Create a live transport with the given configuration.
    pub fn new(config: ChatProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProviderError::Http)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn complete(&self, request: ChatCompletionRequest) -> Result<String> {
        let Some(api_key) = &self.config.api_key else {
            return Err(ProviderError::Config(
                "no chat provider API key configured".to_string(),
            ));
        };
        let url = format!("{}/chat/completions", self.config.base_url);

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system_prompt {
            messages.push(WireMessage {
                role: "system".to_string(),
                content: Some(system.clone()),
            });
        }
        messages.push(WireMessage {
            role: "user".to_string(),
            content: Some(request.user_message.clone()),
        });

        let body = WireRequest {
            model: request.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                401 => ProviderError::Authentication(error_text),
                429 => ProviderError::RateLimited(error_text),
                _ => ProviderError::Provider(format!("chat API error {}: {}", status, error_text)),
            });
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::InvalidResponse("response has no choices".to_string()))
    }
}

/// Node handler for `llm-chat` nodes.
pub struct ChatCompletionHandler {
    api: Arc<dyn ChatApi>,
    default_model: String,
}

impl ChatCompletionHandler {
    /// Handler over an arbitrary transport.
    pub fn new(api: Arc<dyn ChatApi>, config: &ChatProviderConfig) -> Self {
        Self {
            api,
            default_model: config.model.clone(),
        }
    }

    fn request_for(&self, ctx: &NodeContext<'_>) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: ctx
                .str_config("model")
                .unwrap_or(&self.default_model)
                .to_string(),
            system_prompt: ctx.str_config("systemPrompt").map(str::to_string),
            user_message: ctx.input.clone(),
            temperature: ctx.f32_config("temperature"),
            max_tokens: ctx.usize_config("maxTokens"),
        }
    }
}

#[async_trait]
impl NodeHandler for ChatCompletionHandler {
    async fn handle(&self, ctx: NodeContext<'_>) -> NodeOutput {
        let request = self.request_for(&ctx);

        let mut delay = RATE_LIMIT_BASE_DELAY;
        let mut attempt = 1;
        loop {
            match self.api.complete(request.clone()).await {
                Ok(text) => return NodeOutput::ok(text),
                Err(e) if e.is_rate_limit() => {
                    if attempt >= RATE_LIMIT_ATTEMPTS {
                        return NodeOutput::err(format!(
                            "chat provider quota exceeded after {} attempts: {}",
                            RATE_LIMIT_ATTEMPTS, e
                        ));
                    }
                    tracing::warn!(
                        node = %ctx.node.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "chat provider rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return NodeOutput::err(e.to_string()),
            }
        }
    }

    fn kind_name(&self) -> &'static str {
        "llm-chat"
    }
}

// Wire types for the OpenAI-style API.
#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}
