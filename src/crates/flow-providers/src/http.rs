//! Generic HTTP adapter: lets a flow call an arbitrary API.
//!
//! The node configures `method`, `endpoint`, and `headers`; the combined
//! upstream payload travels as the `query` field of a JSON body on
//! non-GET requests. The response body comes back verbatim as the node's
//! payload, whatever its content type; interpreting it is the flow
//! author's problem, typically via a downstream LLM node.

use async_trait::async_trait;
use flow_core::{NodeContext, NodeHandler, NodeOutput};
use reqwest::{Client, Method};
use std::time::Duration;

/// Node handler for `generic-http` nodes.
#[derive(Clone)]
pub struct GenericHttpHandler {
    client: Client,
}

impl GenericHttpHandler {
    /// Handler with a default 30-second request timeout.
    pub fn new() -> Result<Self, crate::error::ProviderError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Handler with an explicit request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, crate::error::ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(crate::error::ProviderError::Http)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl NodeHandler for GenericHttpHandler {
    async fn handle(&self, ctx: NodeContext<'_>) -> NodeOutput {
        let Some(endpoint) = ctx.str_config("endpoint") else {
            return NodeOutput::err("HTTP node has no 'endpoint' configured");
        };
        let method = match ctx
            .str_config("method")
            .unwrap_or("GET")
            .to_uppercase()
            .parse::<Method>()
        {
            Ok(method) => method,
            Err(_) => {
                return NodeOutput::err(format!(
                    "HTTP node has an invalid method '{}'",
                    ctx.str_config("method").unwrap_or_default()
                ));
            }
        };

        let is_get = method == Method::GET;
        let mut request = self.client.request(method, endpoint);

        if let Some(headers) = ctx.node.data.get("headers").and_then(|v| v.as_object()) {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(name, value);
                }
            }
        }
        if !is_get {
            request = request.json(&serde_json::json!({ "query": ctx.input }));
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                return NodeOutput::err(format!("request to {} failed: {}", endpoint, e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return NodeOutput::err(format!(
                "request to {} failed with status {}",
                endpoint, status
            ));
        }

        match response.text().await {
            Ok(body) => NodeOutput::ok(body),
            Err(e) => NodeOutput::err(format!("could not read response from {}: {}", endpoint, e)),
        }
    }

    fn kind_name(&self) -> &'static str {
        "generic-http"
    }
}
