//! Configuration system: schema, loading, and env var overrides.
//!
//! # Usage
//! ```no_run
//! use omnichat_core::config;
//!
//! let cfg = config::load_config(None);
//! println!("Model: {}", cfg.defaults.model);
//! ```

pub mod loader;
pub mod schema;

pub use loader::{get_config_path, load_config, save_config, PROVIDER_ENV_KEYS};
pub use schema::{ChatDefaults, Config, ProviderConfig};
