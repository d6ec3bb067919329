//! Local inference adapter (Ollama-style server).
//!
//! Unlike the hosted providers, a local server is the user's own machine:
//! if it is not running there is nothing sensible to fall back to, so a
//! connection failure is reported plainly on the node with the endpoint
//! that was tried. No retry, no placeholder.

use crate::config::LocalProviderConfig;
use crate::error::ProviderError;
use async_trait::async_trait;
use flow_core::{NodeContext, NodeHandler, NodeOutput};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Node handler for `local-inference` nodes.
#[derive(Clone)]
pub struct LocalInferenceHandler {
    config: LocalProviderConfig,
    client: Client,
}

impl LocalInferenceHandler {
    /// Handler against the configured local server.
    pub fn new(config: LocalProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProviderError::Http)?;
        Ok(Self { config, client })
    }

    /// Node-level `endpoint` overrides the configured base URL.
    fn base_url<'a>(&'a self, ctx: &'a NodeContext<'_>) -> &'a str {
        ctx.str_config("endpoint")
            .unwrap_or(&self.config.base_url)
            .trim_end_matches('/')
    }
}

#[async_trait]
impl NodeHandler for LocalInferenceHandler {
    async fn handle(&self, ctx: NodeContext<'_>) -> NodeOutput {
        let base = self.base_url(&ctx);
        let url = format!("{}/api/generate", base);
        let body = WireRequest {
            model: ctx
                .str_config("model")
                .unwrap_or(&self.config.model)
                .to_string(),
            prompt: ctx.input.clone(),
            stream: false,
        };

        let response = match self.client.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(e) if e.is_connect() || e.is_timeout() => {
                return NodeOutput::err(format!("server not reachable at {}", base));
            }
            Err(e) => return NodeOutput::err(ProviderError::Http(e).to_string()),
        };

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return NodeOutput::err(format!(
                "local inference error {}: {}",
                status, error_text
            ));
        }

        match response.json::<WireResponse>().await {
            Ok(parsed) => NodeOutput::ok(parsed.response),
            Err(e) => NodeOutput::err(ProviderError::InvalidResponse(e.to_string()).to_string()),
        }
    }

    fn kind_name(&self) -> &'static str {
        "local-inference"
    }
}

// Wire types for the Ollama generate API.
#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    response: String,
    #[serde(default)]
    #[allow(dead_code)]
    done: bool,
}
