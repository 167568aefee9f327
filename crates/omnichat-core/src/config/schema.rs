//! Configuration schema.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Root configuration, loaded from `~/.omnichat/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Provider key (e.g. `"groq"`) → option bag for that provider's adapter.
    pub providers: HashMap<String, ProviderConfig>,
    pub defaults: ChatDefaults,
}

/// Defaults applied by the CLI when a flag is not given.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatDefaults {
    /// Model identifier in `provider:model` form.
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Turn limit for tool conversations.
    pub max_turns: u32,
}

impl Default for ChatDefaults {
    fn default() -> Self {
        Self {
            model: "openai:gpt-4o-mini".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            max_turns: 5,
        }
    }
}

/// Options for one provider. Opaque to the core; handed to the adapter constructor.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// API key. Empty means "fall back to the provider's env var".
    pub api_key: String,
    /// Custom API base URL (overrides provider default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Request timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Extra HTTP headers to send with each request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
    /// Any other vendor-specific keys (region, API version, ...).
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl ProviderConfig {
    /// Config with just an API key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Whether this provider has an API key in the config itself.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Read a vendor-specific string option.
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }
}
