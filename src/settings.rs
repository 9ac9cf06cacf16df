//! Service configuration.
//!
//! Sources, later ones overriding earlier:
//! 1. built-in defaults
//! 2. `flower_shop.yaml` in the working directory (optional)
//! 3. the file named by `FLOWER_SHOP_CONFIG` (required if set)
//! 4. `FLOWER_SHOP__SECTION__KEY` environment variables
//! 5. `DATABASE_URL`

use serde::Deserialize;

/// Default configuration file name (without extension).
pub const DEFAULT_CONFIG_FILE: &str = "flower_shop";
/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "FLOWER_SHOP_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "FLOWER_SHOP";
/// Conventional database URL variable, honoured on top of everything else.
pub const DATABASE_URL_ENV_VAR: &str = "DATABASE_URL";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Without a URL the service runs on the in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub run_migrations: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            acquire_timeout_secs: 5,
            run_migrations: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 9090,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info,flower_shop=debug".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub metrics: MetricsSettings,
    pub log: LogSettings,
}

impl Settings {
    pub fn load() -> Result<Self, config::ConfigError> {
        use config::{Config, Environment, File, FileFormat};

        let mut builder = Config::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&path, FileFormat::Yaml).required(true));
        }

        let mut settings: Settings = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        if let Ok(url) = std::env::var(DATABASE_URL_ENV_VAR) {
            settings.database.url = Some(url);
        }

        Ok(settings)
    }

    /// Parse settings from a YAML document, defaults filling the gaps.
    #[cfg(test)]
    pub fn from_yaml(yaml: &str) -> Result<Self, config::ConfigError> {
        use config::{Config, File, FileFormat};

        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()
    }
}
