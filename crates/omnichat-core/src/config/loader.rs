//! Config loader: reads `~/.omnichat/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.omnichat/config.json`
//! 3. Environment variables `OMNICHAT_<SECTION>__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    let config = load_config_from_path(&config_path);
    apply_env_overrides(config, |key| std::env::var(key).ok())
}

fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return Config::default();
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return Config::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            Config::default()
        }
    }
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> anyhow::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `OMNICHAT_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// - `OMNICHAT_DEFAULTS__MODEL` → `defaults.model`
/// - `OMNICHAT_DEFAULTS__MAX_TOKENS` → `defaults.max_tokens`
/// - `OMNICHAT_DEFAULTS__TEMPERATURE` → `defaults.temperature`
/// - `OMNICHAT_DEFAULTS__MAX_TURNS` → `defaults.max_turns`
/// - `OMNICHAT_PROVIDERS__<KEY>__API_KEY` → `providers.<key>.api_key`
/// - `OMNICHAT_PROVIDERS__<KEY>__API_BASE` → `providers.<key>.api_base`
///
/// Provider overrides apply to every key in `PROVIDER_ENV_KEYS` plus any key already
/// present in the file.
fn apply_env_overrides(mut config: Config, env: impl Fn(&str) -> Option<String>) -> Config {
    if let Some(val) = env("OMNICHAT_DEFAULTS__MODEL") {
        config.defaults.model = val;
    }
    if let Some(n) = env("OMNICHAT_DEFAULTS__MAX_TOKENS").and_then(|v| v.parse().ok()) {
        config.defaults.max_tokens = n;
    }
    if let Some(t) = env("OMNICHAT_DEFAULTS__TEMPERATURE").and_then(|v| v.parse().ok()) {
        config.defaults.temperature = t;
    }
    if let Some(n) = env("OMNICHAT_DEFAULTS__MAX_TURNS").and_then(|v| v.parse().ok()) {
        config.defaults.max_turns = n;
    }

    let mut keys: Vec<String> = PROVIDER_ENV_KEYS.iter().map(|k| k.to_string()).collect();
    keys.extend(config.providers.keys().cloned());
    keys.sort();
    keys.dedup();

    for key in keys {
        let prefix = format!("OMNICHAT_PROVIDERS__{}", key.to_uppercase().replace('-', "_"));
        let api_key = env(&format!("{prefix}__API_KEY"));
        let api_base = env(&format!("{prefix}__API_BASE"));
        if api_key.is_none() && api_base.is_none() {
            continue;
        }
        let provider = config.providers.entry(key).or_default();
        if let Some(val) = api_key {
            provider.api_key = val;
        }
        if let Some(val) = api_base {
            provider.api_base = Some(val);
        }
    }

    config
}

/// Provider keys checked for env overrides even when absent from the file.
///
/// Mirrors the keys of `omnichat_providers::PROVIDERS`; a test there keeps the
/// two lists equal.
pub const PROVIDER_ENV_KEYS: &[&str] = &[
    "anthropic",
    "cerebras",
    "deepseek",
    "fireworks",
    "groq",
    "huggingface",
    "mistral",
    "nebius",
    "ollama",
    "openai",
    "openrouter",
    "sambanova",
    "together",
    "xai",
];

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp_json(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = load_config_from_path(Path::new("/nonexistent/omnichat/config.json"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_file() {
        let file = write_temp_json(
            r#"{"providers": {"groq": {"apiKey": "gsk-file"}}, "defaults": {"model": "groq:llama3-70b-8192"}}"#,
        );
        let config = load_config_from_path(file.path());
        assert_eq!(config.providers["groq"].api_key, "gsk-file");
        assert_eq!(config.defaults.model, "groq:llama3-70b-8192");
    }

    #[test]
    fn test_invalid_json_falls_back_to_defaults() {
        let file = write_temp_json("{ not json");
        let config = load_config_from_path(file.path());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_overrides_defaults() {
        let env = env_from(&[
            ("OMNICHAT_DEFAULTS__MODEL", "anthropic:claude-3-5-sonnet-20241022"),
            ("OMNICHAT_DEFAULTS__MAX_TURNS", "8"),
            ("OMNICHAT_DEFAULTS__TEMPERATURE", "not-a-number"),
        ]);
        let config = apply_env_overrides(Config::default(), env);

        assert_eq!(config.defaults.model, "anthropic:claude-3-5-sonnet-20241022");
        assert_eq!(config.defaults.max_turns, 8);
        // Unparseable values are ignored
        assert_eq!(config.defaults.temperature, 0.7);
    }

    #[test]
    fn test_env_overrides_provider_keys() {
        let env = env_from(&[
            ("OMNICHAT_PROVIDERS__GROQ__API_KEY", "gsk-env"),
            ("OMNICHAT_PROVIDERS__OLLAMA__API_BASE", "http://localhost:11434/v1"),
        ]);
        let config = apply_env_overrides(Config::default(), env);

        assert_eq!(config.providers["groq"].api_key, "gsk-env");
        assert_eq!(
            config.providers["ollama"].api_base.as_deref(),
            Some("http://localhost:11434/v1")
        );
        // Providers without overrides are not materialized
        assert!(!config.providers.contains_key("openai"));
    }

    #[test]
    fn test_env_overrides_custom_provider_from_file() {
        let mut config = Config::default();
        config
            .providers
            .insert("my-proxy".into(), Default::default());
        let env = env_from(&[("OMNICHAT_PROVIDERS__MY_PROXY__API_KEY", "proxy-key")]);
        let config = apply_env_overrides(config, env);
        assert_eq!(config.providers["my-proxy"].api_key, "proxy-key");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.defaults.model = "groq:llama3-8b-8192".into();
        save_config(&config, Some(&path)).unwrap();

        let reloaded = load_config_from_path(&path);
        assert_eq!(reloaded.defaults.model, "groq:llama3-8b-8192");
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("maxTokens"));
    }
}
