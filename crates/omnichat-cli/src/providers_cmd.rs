//! `omnichat providers`: supported provider keys and credential status.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use omnichat_core::config::{get_config_path, load_config, Config};
use omnichat_providers::PROVIDERS;

/// Run the providers command.
pub fn run(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path);
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(get_config_path);

    println!();
    println!("{}", "Omnichat Providers".cyan().bold());
    println!();
    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        path.display(),
        if path.exists() {
            "✓".green().to_string()
        } else {
            "(not found)".red().to_string()
        }
    );
    println!("  {:<18} {}", "Default model:".bold(), config.defaults.model);
    println!();

    for row in provider_rows(&config) {
        let status = if row.configured {
            format!("{} {}", "✓".green(), row.source)
        } else {
            format!("{}", format!("· set {}", row.env_key).dimmed())
        };
        println!("    {:<12} {:<14} {}", row.key, row.display_name, status);
    }
    println!();

    Ok(())
}

/// One line of the provider table.
#[derive(Debug, PartialEq)]
struct ProviderRow {
    key: &'static str,
    display_name: &'static str,
    env_key: &'static str,
    configured: bool,
    source: &'static str,
}

fn provider_rows(config: &Config) -> Vec<ProviderRow> {
    PROVIDERS
        .iter()
        .map(|spec| {
            let provider_config = config.providers.get(spec.name);
            let source = match provider_config {
                Some(c) if c.is_configured() => "(config)",
                _ if spec.is_local => "(local)",
                _ => "(env)",
            };
            ProviderRow {
                key: spec.name,
                display_name: spec.display_name,
                env_key: spec.env_key,
                configured: spec.has_credentials(provider_config),
                source,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnichat_core::config::ProviderConfig;

    #[test]
    fn lists_every_builtin_provider() {
        let rows = provider_rows(&Config::default());
        assert_eq!(rows.len(), PROVIDERS.len());
        assert!(rows.iter().any(|r| r.key == "groq"));
    }

    #[test]
    fn configured_key_is_reported() {
        let mut config = Config::default();
        config
            .providers
            .insert("mistral".into(), ProviderConfig::with_api_key("key"));

        let rows = provider_rows(&config);
        let mistral = rows.iter().find(|r| r.key == "mistral").unwrap();
        assert!(mistral.configured);
        assert_eq!(mistral.source, "(config)");

        let ollama = rows.iter().find(|r| r.key == "ollama").unwrap();
        assert!(ollama.configured);
        assert_eq!(ollama.source, "(local)");
    }
}
