//! Provider configuration structures.
//!
//! Credentials come from the environment; their absence is not an error at
//! construction time. Whether a missing credential degrades a node (chat)
//! or silently switches it to placeholder mode (community inference) is
//! each adapter's decision.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the chat provider API key.
pub const CHAT_API_KEY_VAR: &str = "FLOW_CHAT_API_KEY";
/// Environment variable holding the community inference API key.
pub const COMMUNITY_API_KEY_VAR: &str = "FLOW_COMMUNITY_API_KEY";
/// Environment variable holding the local inference base URL.
pub const LOCAL_BASE_URL_VAR: &str = "FLOW_LOCAL_BASE_URL";

/// Configuration for the primary chat-completion provider (OpenAI-style).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatProviderConfig {
    /// API key; `None` means the chat node reports a configuration error.
    pub api_key: Option<String>,

    /// Base URL for the API.
    pub base_url: String,

    /// Model used when the node does not configure one.
    pub model: String,

    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

impl ChatProviderConfig {
    /// Create a new chat provider configuration.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Read the credential from [`CHAT_API_KEY_VAR`].
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var(CHAT_API_KEY_VAR).ok(),
            ..Self::default()
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ChatProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout: default_timeout(),
        }
    }
}

/// Configuration for the secondary community-hosted inference provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityProviderConfig {
    /// API key; `None` switches the adapter to placeholder mode.
    pub api_key: Option<String>,

    /// Base URL for the hosted inference API.
    pub base_url: String,

    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

impl CommunityProviderConfig {
    /// Create a new community provider configuration.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Read the credential from [`COMMUNITY_API_KEY_VAR`].
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var(COMMUNITY_API_KEY_VAR).ok(),
            ..Self::default()
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for CommunityProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api-inference.huggingface.co".to_string(),
            timeout: default_timeout(),
        }
    }
}

/// Configuration for local inference servers (Ollama, llama.cpp, etc.).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalProviderConfig {
    /// Base URL for the local server.
    ///
    /// Examples:
    /// - Ollama: "http://localhost:11434"
    /// - llama.cpp: "http://localhost:8080"
    pub base_url: String,

    /// Model used when the node does not configure one.
    pub model: String,

    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

impl LocalProviderConfig {
    /// Create a new local provider configuration.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            timeout: default_timeout(),
        }
    }

    /// Read the base URL from [`LOCAL_BASE_URL_VAR`], defaulting to the
    /// standard Ollama port.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var(LOCAL_BASE_URL_VAR)
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            ..Self::default()
        }
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for LocalProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            timeout: default_timeout(),
        }
    }
}

/// One bundle of all provider configurations, used to wire the default
/// registry.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub chat: ChatProviderConfig,
    pub community: CommunityProviderConfig,
    pub local: LocalProviderConfig,
}

impl ProviderSettings {
    /// Read every provider's configuration from the environment.
    pub fn from_env() -> Self {
        Self {
            chat: ChatProviderConfig::from_env(),
            community: CommunityProviderConfig::from_env(),
            local: LocalProviderConfig::from_env(),
        }
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}
