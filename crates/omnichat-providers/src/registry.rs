//! Provider registry: static vendor specs plus the lazily-caching adapter registry.
//!
//! Each `ProviderSpec` describes how to reach one vendor: its key in model
//! identifiers, env var for the API key, default API base and wire quirks.
//! `ProviderRegistry` maps provider keys to adapter factories and builds each
//! adapter on first use.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use omnichat_core::config::ProviderConfig;
use omnichat_core::{ConfigurationError, Error, ProviderError};

use crate::anthropic::AnthropicProvider;
use crate::http_provider::HttpProvider;
use crate::traits::Provider;

// ─────────────────────────────────────────────
// ProviderSpec: static metadata for one vendor
// ─────────────────────────────────────────────

/// Wire protocol spoken by a vendor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiStyle {
    /// OpenAI-compatible `/chat/completions`.
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
}

/// Static specification describing one LLM vendor.
#[derive(Clone, Debug)]
pub struct ProviderSpec {
    /// Provider key used in model identifiers (e.g. `"groq"`).
    pub name: &'static str,
    /// Environment variable for the API key. E.g. `"GROQ_API_KEY"`.
    pub env_key: &'static str,
    /// Human-readable name for logs. E.g. `"Groq"`.
    pub display_name: &'static str,
    /// Default API base URL.
    pub default_api_base: &'static str,
    pub api_style: ApiStyle,
    /// Local/self-hosted provider: no API key required.
    pub is_local: bool,
    /// Send tool results as plain text rather than JSON-encoded values.
    /// E.g. a tool returning `"sunny"` is sent as `sunny`.
    pub tool_results_as_text: bool,
}

/// Complete list of built-in provider specifications.
///
/// Adding a provider here also means adding its key to
/// `omnichat_core::config::PROVIDER_ENV_KEYS`.
pub static PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "anthropic",
        env_key: "ANTHROPIC_API_KEY",
        display_name: "Anthropic",
        default_api_base: "https://api.anthropic.com/v1",
        api_style: ApiStyle::Anthropic,
        is_local: false,
        tool_results_as_text: false,
    },
    ProviderSpec {
        name: "cerebras",
        env_key: "CEREBRAS_API_KEY",
        display_name: "Cerebras",
        default_api_base: "https://api.cerebras.ai/v1",
        api_style: ApiStyle::OpenAi,
        is_local: false,
        tool_results_as_text: true,
    },
    ProviderSpec {
        name: "deepseek",
        env_key: "DEEPSEEK_API_KEY",
        display_name: "DeepSeek",
        default_api_base: "https://api.deepseek.com/v1",
        api_style: ApiStyle::OpenAi,
        is_local: false,
        tool_results_as_text: false,
    },
    ProviderSpec {
        name: "fireworks",
        env_key: "FIREWORKS_API_KEY",
        display_name: "Fireworks",
        default_api_base: "https://api.fireworks.ai/inference/v1",
        api_style: ApiStyle::OpenAi,
        is_local: false,
        tool_results_as_text: false,
    },
    ProviderSpec {
        name: "groq",
        env_key: "GROQ_API_KEY",
        display_name: "Groq",
        default_api_base: "https://api.groq.com/openai/v1",
        api_style: ApiStyle::OpenAi,
        is_local: false,
        tool_results_as_text: false,
    },
    ProviderSpec {
        name: "huggingface",
        env_key: "HF_TOKEN",
        display_name: "Hugging Face",
        default_api_base: "https://router.huggingface.co/v1",
        api_style: ApiStyle::OpenAi,
        is_local: false,
        tool_results_as_text: false,
    },
    ProviderSpec {
        name: "mistral",
        env_key: "MISTRAL_API_KEY",
        display_name: "Mistral",
        default_api_base: "https://api.mistral.ai/v1",
        api_style: ApiStyle::OpenAi,
        is_local: false,
        tool_results_as_text: false,
    },
    ProviderSpec {
        name: "nebius",
        env_key: "NEBIUS_API_KEY",
        display_name: "Nebius AI Studio",
        default_api_base: "https://api.studio.nebius.ai/v1",
        api_style: ApiStyle::OpenAi,
        is_local: false,
        tool_results_as_text: false,
    },
    ProviderSpec {
        name: "ollama",
        env_key: "OLLAMA_API_KEY",
        display_name: "Ollama",
        default_api_base: "http://localhost:11434/v1",
        api_style: ApiStyle::OpenAi,
        is_local: true,
        tool_results_as_text: false,
    },
    ProviderSpec {
        name: "openai",
        env_key: "OPENAI_API_KEY",
        display_name: "OpenAI",
        default_api_base: "https://api.openai.com/v1",
        api_style: ApiStyle::OpenAi,
        is_local: false,
        tool_results_as_text: false,
    },
    ProviderSpec {
        name: "openrouter",
        env_key: "OPENROUTER_API_KEY",
        display_name: "OpenRouter",
        default_api_base: "https://openrouter.ai/api/v1",
        api_style: ApiStyle::OpenAi,
        is_local: false,
        tool_results_as_text: false,
    },
    ProviderSpec {
        name: "sambanova",
        env_key: "SAMBANOVA_API_KEY",
        display_name: "SambaNova",
        default_api_base: "https://api.sambanova.ai/v1",
        api_style: ApiStyle::OpenAi,
        is_local: false,
        tool_results_as_text: true,
    },
    ProviderSpec {
        name: "together",
        env_key: "TOGETHER_API_KEY",
        display_name: "Together",
        default_api_base: "https://api.together.xyz/v1",
        api_style: ApiStyle::OpenAi,
        is_local: false,
        tool_results_as_text: true,
    },
    ProviderSpec {
        name: "xai",
        env_key: "XAI_API_KEY",
        display_name: "xAI",
        default_api_base: "https://api.x.ai/v1",
        api_style: ApiStyle::OpenAi,
        is_local: false,
        tool_results_as_text: true,
    },
];

/// Find a provider spec by exact key.
pub fn find_by_name(name: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|spec| spec.name == name)
}

impl ProviderSpec {
    /// Whether a call could authenticate: key in `config`, key in the env var, or a local provider.
    pub fn has_credentials(&self, config: Option<&ProviderConfig>) -> bool {
        let default_config = ProviderConfig::default();
        let config = config.unwrap_or(&default_config);
        resolve_api_key(config, self, |key| std::env::var(key).ok()).is_ok()
    }
}

/// Split a `provider:model` identifier on the first colon.
///
/// The model part may itself contain colons (`"ollama:llama3:8b"`).
pub fn split_model(model: &str) -> Result<(&str, &str), ConfigurationError> {
    model
        .split_once(':')
        .ok_or_else(|| ConfigurationError::MalformedModel(model.to_string()))
}

/// Resolve the API key: config first, then the provider spec's env var.
///
/// Returns an empty key for local providers that have neither.
pub(crate) fn resolve_api_key(
    config: &ProviderConfig,
    spec: &ProviderSpec,
    env: impl Fn(&str) -> Option<String>,
) -> Result<String, ProviderError> {
    if config.is_configured() {
        return Ok(config.api_key.clone());
    }
    match env(spec.env_key).filter(|k| !k.is_empty()) {
        Some(key) => Ok(key),
        None if spec.is_local => Ok(String::new()),
        None => Err(ProviderError::MissingCredentials {
            provider: spec.display_name.to_string(),
            env_key: spec.env_key.to_string(),
        }),
    }
}

// ─────────────────────────────────────────────
// ProviderRegistry
// ─────────────────────────────────────────────

/// Builds an adapter from that provider's configuration.
pub type ProviderFactory =
    Arc<dyn Fn(&ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> + Send + Sync>;

/// Factory for a built-in spec, dispatching on its wire protocol.
pub fn builtin_factory(spec: &'static ProviderSpec) -> ProviderFactory {
    Arc::new(move |config: &ProviderConfig| {
        let provider: Arc<dyn Provider> = match spec.api_style {
            ApiStyle::OpenAi => Arc::new(HttpProvider::new(config, spec)?),
            ApiStyle::Anthropic => Arc::new(AnthropicProvider::new(config, spec)?),
        };
        Ok(provider)
    })
}

/// Provider key → adapter factory, configuration and constructed adapter.
///
/// Adapters are constructed on first use and cached; later lookups of the same
/// key reuse the instance until [`ProviderRegistry::configure`] replaces that
/// key's configuration.
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
    configs: HashMap<String, ProviderConfig>,
    cache: RwLock<HashMap<String, Arc<dyn Provider>>>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.supported_providers())
            .field("configured", &self.configs.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    /// Registry with every built-in provider and no configuration.
    pub fn new() -> Self {
        let factories = PROVIDERS
            .iter()
            .map(|spec| (spec.name.to_string(), builtin_factory(spec)))
            .collect();
        Self {
            factories,
            configs: HashMap::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Registry with no providers at all. Useful with [`Self::register_factory`].
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
            configs: HashMap::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Built-in providers with the given per-provider configuration.
    pub fn with_configs(configs: HashMap<String, ProviderConfig>) -> Self {
        let mut registry = Self::new();
        registry.configs = configs;
        registry
    }

    /// Register (or replace) the factory for `key`.
    pub fn register_factory(&mut self, key: impl Into<String>, factory: ProviderFactory) {
        let key = key.into();
        info!(provider = %key, "Registered provider factory");
        self.evict(&key);
        self.factories.insert(key, factory);
    }

    /// Replace the configuration of `key`, evicting only that key's cached adapter.
    pub fn configure(&mut self, key: impl Into<String>, config: ProviderConfig) {
        let key = key.into();
        debug!(provider = %key, "Provider reconfigured");
        self.evict(&key);
        self.configs.insert(key, config);
    }

    /// Current configuration of `key`, if any.
    pub fn config(&self, key: &str) -> Option<&ProviderConfig> {
        self.configs.get(key)
    }

    /// All known provider keys, sorted.
    pub fn supported_providers(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.factories.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Whether an adapter for `key` is currently cached.
    pub fn is_cached(&self, key: &str) -> bool {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Get the adapter for `key`, constructing and caching it on first use.
    pub fn get(&self, key: &str) -> Result<Arc<dyn Provider>, Error> {
        if let Some(provider) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Ok(Arc::clone(provider));
        }

        let factory = self.factories.get(key).ok_or_else(|| {
            ConfigurationError::UnsupportedProvider {
                key: key.to_string(),
                supported: self.supported_providers(),
            }
        })?;

        let default_config = ProviderConfig::default();
        let config = self.configs.get(key).unwrap_or(&default_config);
        let provider = factory(config)?;
        debug!(provider = %key, name = provider.name(), "Constructed provider adapter");

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(key.to_string()).or_insert(provider)))
    }

    /// Resolve a `provider:model` identifier to its adapter and vendor model name.
    pub fn resolve<'m>(&self, model: &'m str) -> Result<(Arc<dyn Provider>, &'m str), Error> {
        let (key, model_name) = split_model(model)?;
        let provider = self.get(key)?;
        Ok((provider, model_name))
    }

    fn evict(&self, key: &str) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::CompletionOptions;
    use async_trait::async_trait;
    use omnichat_core::{AssistantMessage, ChatCompletionResponse, FinishReason, Message};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoProvider {
        label: String,
    }

    #[async_trait]
    impl Provider for EchoProvider {
        async fn create_completion(
            &self,
            model: &str,
            _messages: &[Message],
            _options: &CompletionOptions,
        ) -> Result<ChatCompletionResponse, ProviderError> {
            Ok(ChatCompletionResponse::new(
                AssistantMessage::text(format!("{}:{}", self.label, model)),
                FinishReason::Stop,
            ))
        }

        fn name(&self) -> &str {
            &self.label
        }
    }

    fn counting_factory(counter: Arc<AtomicUsize>) -> ProviderFactory {
        Arc::new(move |config: &ProviderConfig| {
            counter.fetch_add(1, Ordering::SeqCst);
            let provider: Arc<dyn Provider> = Arc::new(EchoProvider {
                label: config.api_key.clone(),
            });
            Ok(provider)
        })
    }

    #[test]
    fn test_env_override_keys_match_builtin_providers() {
        let mut builtin: Vec<&str> = PROVIDERS.iter().map(|spec| spec.name).collect();
        builtin.sort_unstable();
        let mut overridable = omnichat_core::config::PROVIDER_ENV_KEYS.to_vec();
        overridable.sort_unstable();
        assert_eq!(builtin, overridable);
    }

    #[test]
    fn test_split_model_first_colon() {
        assert_eq!(split_model("groq:llama3-70b-8192").unwrap(), ("groq", "llama3-70b-8192"));
        assert_eq!(split_model("ollama:llama3:8b").unwrap(), ("ollama", "llama3:8b"));
    }

    #[test]
    fn test_split_model_without_colon() {
        let err = split_model("gpt-4o").unwrap_err();
        assert_eq!(err, ConfigurationError::MalformedModel("gpt-4o".into()));
    }

    #[test]
    fn test_find_by_name() {
        assert_eq!(find_by_name("groq").unwrap().display_name, "Groq");
        assert_eq!(find_by_name("anthropic").unwrap().api_style, ApiStyle::Anthropic);
        assert!(find_by_name("unknown").is_none());
    }

    #[test]
    fn test_supported_providers_sorted() {
        let registry = ProviderRegistry::new();
        let keys = registry.supported_providers();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(keys.len(), PROVIDERS.len());
        assert!(keys.contains(&"groq".to_string()));
    }

    #[test]
    fn test_unknown_provider_is_configuration_error() {
        let registry = ProviderRegistry::new();
        let err = registry.resolve("unknown:foo").err().unwrap();
        match err {
            Error::Configuration(ConfigurationError::UnsupportedProvider { key, supported }) => {
                assert_eq!(key, "unknown");
                assert!(supported.contains(&"groq".to_string()));
            }
            other => panic!("Expected unsupported provider, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_dispatches_to_groq_adapter() {
        let mut configs = HashMap::new();
        configs.insert("groq".to_string(), ProviderConfig::with_api_key("gsk-test"));
        let registry = ProviderRegistry::with_configs(configs);

        let (provider, model) = registry.resolve("groq:llama3-70b-8192").unwrap();
        assert_eq!(model, "llama3-70b-8192");
        assert_eq!(provider.name(), "Groq");
        assert!(registry.is_cached("groq"));
        assert!(!registry.is_cached("openai"));
    }

    #[test]
    fn test_adapter_built_once_and_reused() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = ProviderRegistry::empty();
        registry.register_factory("echo", counting_factory(counter.clone()));
        registry.configure("echo", ProviderConfig::with_api_key("first"));

        let a = registry.get("echo").unwrap();
        let b = registry.get("echo").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_configure_evicts_only_that_key() {
        let echo_count = Arc::new(AtomicUsize::new(0));
        let other_count = Arc::new(AtomicUsize::new(0));
        let mut registry = ProviderRegistry::empty();
        registry.register_factory("echo", counting_factory(echo_count.clone()));
        registry.register_factory("other", counting_factory(other_count.clone()));

        registry.get("echo").unwrap();
        registry.get("other").unwrap();

        registry.configure("echo", ProviderConfig::with_api_key("second"));
        assert!(!registry.is_cached("echo"));
        assert!(registry.is_cached("other"));

        let rebuilt = registry.get("echo").unwrap();
        assert_eq!(rebuilt.name(), "second");
        assert_eq!(echo_count.load(Ordering::SeqCst), 2);
        assert_eq!(other_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_credentials_fail_construction() {
        let spec = find_by_name("groq").unwrap();
        let err = resolve_api_key(&ProviderConfig::default(), spec, |_| None).unwrap_err();
        match err {
            ProviderError::MissingCredentials { env_key, .. } => assert_eq!(env_key, "GROQ_API_KEY"),
            other => panic!("Expected missing credentials, got {other:?}"),
        }
    }

    #[test]
    fn test_api_key_precedence() {
        let spec = find_by_name("groq").unwrap();
        let from_env = |key: &str| (key == "GROQ_API_KEY").then(|| "gsk-env".to_string());

        let key = resolve_api_key(&ProviderConfig::default(), spec, from_env).unwrap();
        assert_eq!(key, "gsk-env");

        let key = resolve_api_key(&ProviderConfig::with_api_key("gsk-cfg"), spec, from_env).unwrap();
        assert_eq!(key, "gsk-cfg");
    }

    #[test]
    fn test_local_provider_needs_no_key() {
        let spec = find_by_name("ollama").unwrap();
        let key = resolve_api_key(&ProviderConfig::default(), spec, |_| None).unwrap();
        assert!(key.is_empty());
    }

    #[test]
    fn test_has_credentials() {
        let groq = find_by_name("groq").unwrap();
        assert!(groq.has_credentials(Some(&ProviderConfig::with_api_key("gsk-cfg"))));
        assert!(find_by_name("ollama").unwrap().has_credentials(None));
    }

    #[tokio::test]
    async fn test_registered_factory_serves_calls() {
        let mut registry = ProviderRegistry::empty();
        registry.register_factory("echo", counting_factory(Arc::new(AtomicUsize::new(0))));
        registry.configure("echo", ProviderConfig::with_api_key("e"));

        let (provider, model) = registry.resolve("echo:m1").unwrap();
        let resp = provider
            .create_completion(model, &[Message::user("hi")], &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(resp.message().unwrap().content.as_deref(), Some("e:m1"));
    }
}
