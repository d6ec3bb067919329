//! Provider adapters for the flow execution engine.
//!
//! This crate supplies the [`flow_core::NodeHandler`] implementations that
//! talk to the outside world, plus the wiring to build a fully populated
//! registry:
//!
//! - **Chat completion** (`llm-chat`) - primary provider, OpenAI-style
//!   API, bounded retry on rate limits
//! - **Community inference** (`community-inference`) - secondary hosted
//!   provider with a model allow-list and a never-fail placeholder policy
//! - **Local inference** (`local-inference`) - Ollama-style server on the
//!   user's own machine
//! - **Generic HTTP** (`generic-http`) - arbitrary API calls configured on
//!   the node
//!
//! Each adapter's transport sits behind a small trait ([`ChatApi`],
//! [`InferenceApi`]) so tests run against deterministic fakes while
//! production uses the `reqwest`-backed implementations.
//!
//! # Example
//!
//! ```rust,no_run
//! use flow_core::{FlowDocument, FlowRunner};
//! use flow_providers::{default_registry, ProviderSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = default_registry(ProviderSettings::from_env())?;
//!     let runner = FlowRunner::new(registry);
//!
//!     let json = std::fs::read_to_string("flow.json")?;
//!     let doc = FlowDocument::from_json(&json)?;
//!     let result = runner.run(&doc, "Tell me about dogs").await;
//!     println!("{:?}", result);
//!     Ok(())
//! }
//! ```
//!
//! Credentials come from the environment: `FLOW_CHAT_API_KEY`,
//! `FLOW_COMMUNITY_API_KEY`, and `FLOW_LOCAL_BASE_URL`. Missing chat
//! credentials degrade `llm-chat` nodes to configuration errors; a missing
//! community credential switches `community-inference` nodes to
//! synthesized placeholder responses.

pub mod chat;
pub mod community;
pub mod config;
pub mod error;
pub mod http;
pub mod local;
pub mod placeholder;

pub use chat::{ChatApi, ChatCompletionHandler, ChatCompletionRequest, HttpChatApi};
pub use community::{CommunityInferenceHandler, HttpInferenceApi, InferenceApi, ALLOWED_MODELS};
pub use config::{
    ChatProviderConfig, CommunityProviderConfig, LocalProviderConfig, ProviderSettings,
};
pub use error::{ProviderError, Result};
pub use http::GenericHttpHandler;
pub use local::LocalInferenceHandler;
pub use placeholder::{KeywordPlaceholder, PlaceholderStrategy};

use flow_core::{HandlerRegistry, NodeKind};
use std::sync::Arc;

/// Registry covering every node kind: the engine built-ins plus the four
/// provider adapters, wired from the given settings.
pub fn default_registry(settings: ProviderSettings) -> Result<HandlerRegistry> {
    let mut registry = HandlerRegistry::with_builtins();

    let chat_api = Arc::new(HttpChatApi::new(settings.chat.clone())?);
    registry.register(
        NodeKind::LlmChat,
        Arc::new(ChatCompletionHandler::new(chat_api, &settings.chat)),
    );

    let inference_api = HttpInferenceApi::from_config(settings.community)?
        .map(|api| Arc::new(api) as Arc<dyn InferenceApi>);
    registry.register(
        NodeKind::CommunityInference,
        Arc::new(CommunityInferenceHandler::new(inference_api)),
    );

    registry.register(
        NodeKind::LocalInference,
        Arc::new(LocalInferenceHandler::new(settings.local)?),
    );
    registry.register(NodeKind::GenericHttp, Arc::new(GenericHttpHandler::new()?));

    Ok(registry)
}
