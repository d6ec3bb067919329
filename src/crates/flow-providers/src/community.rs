//! Community-hosted inference adapter (secondary provider).
//!
//! This adapter backs the cheap/free tier and trades fidelity for
//! reliability: it must always produce *something*. The configured model is
//! checked against a small allow-list of models known to behave; failures
//! walk through alternate models and finally a locally synthesized
//! placeholder. Live completions from small hosted models are messy, so
//! successful responses pass through a cleanup stage before they count.

use crate::config::CommunityProviderConfig;
use crate::error::{ProviderError, Result};
use crate::placeholder::{KeywordPlaceholder, PlaceholderStrategy};
use async_trait::async_trait;
use flow_core::{NodeContext, NodeHandler, NodeOutput};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Hosted models known to produce usable completions on the free tier.
/// The first entry is the default substitute.
pub const ALLOWED_MODELS: &[&str] = &[
    "mistralai/Mistral-7B-Instruct-v0.2",
    "HuggingFaceH4/zephyr-7b-beta",
    "tiiuae/falcon-7b-instruct",
];

/// Completions shorter than this after cleanup are treated as empty.
const MIN_COMPLETION_CHARS: usize = 12;

/// Alternate models tried after the chosen one fails in transport.
const ALTERNATE_MODEL_TRIES: usize = 2;

/// Transport seam for hosted text-generation. Production uses
/// [`HttpInferenceApi`]; tests inject deterministic fakes.
#[async_trait]
pub trait InferenceApi: Send + Sync {
    /// Generate a completion for `prompt` with the given hosted model.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String>;
}

/// Live transport against a hosted inference API.
#[derive(Clone)]
pub struct HttpInferenceApi {
    config: CommunityProviderConfig,
    client: Client,
    api_key: String,
}

impl HttpInferenceApi {
    /// Live transport; `None` when no credential is configured, which
    /// callers should treat as placeholder mode.
    pub fn from_config(config: CommunityProviderConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProviderError::Http)?;
        Ok(Some(Self {
            config,
            client,
            api_key,
        }))
    }
}

#[async_trait]
impl InferenceApi for HttpInferenceApi {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{}", self.config.base_url, model);
        let body = WireRequest {
            inputs: prompt.to_string(),
            parameters: WireParameters {
                max_new_tokens: 250,
                return_full_text: false,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Provider(format!(
                "inference API error {} for {}: {}",
                status, model, error_text
            )));
        }

        let parsed: Vec<WireGeneration> = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        parsed
            .into_iter()
            .next()
            .map(|g| g.generated_text)
            .ok_or_else(|| ProviderError::InvalidResponse("empty generation array".to_string()))
    }
}

/// Node handler for `community-inference` nodes.
pub struct CommunityInferenceHandler {
    /// `None` = placeholder mode (no credential configured).
    api: Option<Arc<dyn InferenceApi>>,
    placeholder: Arc<dyn PlaceholderStrategy>,
    role_labels: Regex,
}

impl CommunityInferenceHandler {
    /// Handler over an arbitrary transport; `api: None` forces placeholder
    /// mode.
    pub fn new(api: Option<Arc<dyn InferenceApi>>) -> Self {
        Self::with_placeholder(api, Arc::new(KeywordPlaceholder))
    }

    /// Handler with a custom placeholder strategy.
    pub fn with_placeholder(
        api: Option<Arc<dyn InferenceApi>>,
        placeholder: Arc<dyn PlaceholderStrategy>,
    ) -> Self {
        Self {
            api,
            placeholder,
            role_labels: Regex::new(r"(?m)^\s*(Human|Assistant)\s*:\s*")
                .unwrap_or_else(|e| unreachable!("static regex: {e}")),
        }
    }

    /// The configured model if allow-listed, otherwise the default.
    fn resolve_model<'a>(&self, ctx: &'a NodeContext<'_>) -> &'a str {
        match ctx.str_config("model") {
            Some(model) if ALLOWED_MODELS.contains(&model) => model,
            Some(model) => {
                tracing::debug!(
                    node = %ctx.node.id,
                    configured = model,
                    substitute = ALLOWED_MODELS[0],
                    "model not in allow-list, substituting default"
                );
                ALLOWED_MODELS[0]
            }
            None => ALLOWED_MODELS[0],
        }
    }

    /// Clean up a raw completion: drop the echoed prompt, drop chat role
    /// labels, and reject anything too short to be a real answer.
    fn post_process(&self, prompt: &str, raw: &str) -> Option<String> {
        let stripped = raw.strip_prefix(prompt).unwrap_or(raw);
        let cleaned = self.role_labels.replace_all(stripped, "");
        let cleaned = cleaned.trim();
        if cleaned.chars().count() < MIN_COMPLETION_CHARS {
            return None;
        }
        Some(cleaned.to_string())
    }
}

#[async_trait]
impl NodeHandler for CommunityInferenceHandler {
    async fn handle(&self, ctx: NodeContext<'_>) -> NodeOutput {
        let Some(api) = &self.api else {
            tracing::debug!(node = %ctx.node.id, "no credential configured, synthesizing response");
            return NodeOutput::ok(self.placeholder.synthesize(&ctx.input));
        };

        let chosen = self.resolve_model(&ctx);
        let alternates = ALLOWED_MODELS
            .iter()
            .filter(|m| **m != chosen)
            .take(ALTERNATE_MODEL_TRIES);

        for model in std::iter::once(&chosen).chain(alternates) {
            match api.generate(model, &ctx.input).await {
                Ok(raw) => match self.post_process(&ctx.input, &raw) {
                    Some(text) => return NodeOutput::ok(text),
                    None => {
                        tracing::debug!(node = %ctx.node.id, model, "completion unusable after cleanup");
                        return NodeOutput::ok(self.placeholder.synthesize(&ctx.input));
                    }
                },
                Err(e) if e.is_transport() => {
                    tracing::warn!(node = %ctx.node.id, model, error = %e, "model failed, trying next");
                }
                Err(e) => {
                    tracing::warn!(node = %ctx.node.id, model, error = %e, "inference failed, synthesizing response");
                    return NodeOutput::ok(self.placeholder.synthesize(&ctx.input));
                }
            }
        }

        NodeOutput::ok(self.placeholder.synthesize(&ctx.input))
    }

    fn kind_name(&self) -> &'static str {
        "community-inference"
    }
}

// Wire types for the hosted inference API.
#[derive(Debug, Serialize)]
struct WireRequest {
    inputs: String,
    parameters: WireParameters,
}

#[derive(Debug, Serialize)]
struct WireParameters {
    max_new_tokens: usize,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct WireGeneration {
    generated_text: String,
}
