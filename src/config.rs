//! Service configuration.
//!
//! Settings come from `config/store-intake.toml` when present, overridden by
//! `STORE_INTAKE__<SECTION>__<KEY>` environment variables.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config/store-intake.toml";
const ENV_PREFIX: &str = "STORE_INTAKE";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct IntakeConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// bcrypt work factor for new password hashes
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
}

/// Fallbacks for inward items that carry no material link.
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryConfig {
    #[serde(default = "default_unit")]
    pub default_unit: String,
    #[serde(default = "default_category")]
    pub default_category: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/store-intake.db")
}

fn default_cache_capacity() -> u64 {
    64 * 1024 * 1024
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_unit() -> String {
    "Nos".to_string()
}

fn default_category() -> String {
    "GENERAL".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            default_unit: default_unit(),
            default_category: default_category(),
        }
    }
}

impl IntakeConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                // an unreadable file falls back to the environment alone
                log::warn!(
                    "failed to load {}, falling back to env: {err}",
                    path.display()
                );
                Config::builder()
                    .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "failed to load configuration from file ({err}) and env ({env_err})"
                        ))
                    })?
            }
        };

        settings.try_deserialize()
    }
}
