use std::env;
use std::fs;
use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub primary_provider: ProviderConfig,
    pub secondary_provider: ProviderConfig,
    pub webhooks: WebhookConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
    Gemini,
}

#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct WebhookConfig {
    pub fulfillment_url: Option<String>,
    pub low_stock_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub primary_api_key: Option<String>,
    pub secondary_api_key: Option<String>,
    pub fulfillment_webhook_url: Option<String>,
    pub low_stock_webhook_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://remedi.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            primary_provider: ProviderConfig {
                kind: ProviderKind::Gemini,
                api_key: None,
                base_url: None,
                model: "gemini-1.5-flash".to_string(),
                timeout_secs: 30,
            },
            secondary_provider: ProviderConfig {
                kind: ProviderKind::OpenAi,
                api_key: None,
                base_url: None,
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 30,
            },
            webhooks: WebhookConfig { fulfillment_url: None, low_stock_url: None },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8090,
                health_check_port: 8081,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    database: Option<FileDatabase>,
    primary_provider: Option<FileProvider>,
    secondary_provider: Option<FileProvider>,
    webhooks: Option<FileWebhooks>,
    server: Option<FileServer>,
    logging: Option<FileLogging>,
}

#[derive(Debug, Default, Deserialize)]
struct FileDatabase {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileProvider {
    kind: Option<ProviderKind>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileWebhooks {
    fulfillment_url: Option<String>,
    low_stock_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileServer {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct FileLogging {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = resolve_config_path(&options) {
            if path.exists() {
                let raw = fs::read_to_string(&path)
                    .map_err(|source| ConfigError::ReadFile { path: path.clone(), source })?;
                let file: FileConfig = toml::from_str(&raw)
                    .map_err(|source| ConfigError::ParseFile { path: path.clone(), source })?;
                config.apply_file(file);
            } else if options.require_file {
                return Err(ConfigError::MissingConfigFile(path));
            }
        }

        config.apply_env();
        config.apply_overrides(&options.overrides);
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(database) = file.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }
        if let Some(provider) = file.primary_provider {
            apply_file_provider(&mut self.primary_provider, provider);
        }
        if let Some(provider) = file.secondary_provider {
            apply_file_provider(&mut self.secondary_provider, provider);
        }
        if let Some(webhooks) = file.webhooks {
            if webhooks.fulfillment_url.is_some() {
                self.webhooks.fulfillment_url = webhooks.fulfillment_url;
            }
            if webhooks.low_stock_url.is_some() {
                self.webhooks.low_stock_url = webhooks.low_stock_url;
            }
        }
        if let Some(server) = file.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
        }
        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env(&mut self) {
        if let Ok(url) = env::var("REMEDI_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(level) = env::var("REMEDI_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(key) = env::var("REMEDI_PRIMARY_API_KEY") {
            self.primary_provider.api_key = Some(key.into());
        }
        if let Ok(key) = env::var("REMEDI_SECONDARY_API_KEY") {
            self.secondary_provider.api_key = Some(key.into());
        }
        if let Ok(url) = env::var("REMEDI_FULFILLMENT_WEBHOOK_URL") {
            self.webhooks.fulfillment_url = Some(url);
        }
        if let Ok(url) = env::var("REMEDI_LOW_STOCK_WEBHOOK_URL") {
            self.webhooks.low_stock_url = Some(url);
        }
    }

    fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(url) = &overrides.database_url {
            self.database.url = url.clone();
        }
        if let Some(level) = &overrides.log_level {
            self.logging.level = level.clone();
        }
        if let Some(key) = &overrides.primary_api_key {
            self.primary_provider.api_key = Some(key.clone().into());
        }
        if let Some(key) = &overrides.secondary_api_key {
            self.secondary_provider.api_key = Some(key.clone().into());
        }
        if let Some(url) = &overrides.fulfillment_webhook_url {
            self.webhooks.fulfillment_url = Some(url.clone());
        }
        if let Some(url) = &overrides.low_stock_webhook_url {
            self.webhooks.low_stock_url = Some(url.clone());
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.primary_provider.model.trim().is_empty()
            || self.secondary_provider.model.trim().is_empty()
        {
            return Err(ConfigError::Validation("provider model must not be empty".to_string()));
        }
        if self.primary_provider.kind == self.secondary_provider.kind {
            return Err(ConfigError::Validation(
                "primary and secondary providers must differ".to_string(),
            ));
        }
        Ok(())
    }
}

fn apply_file_provider(target: &mut ProviderConfig, file: FileProvider) {
    if let Some(kind) = file.kind {
        target.kind = kind;
    }
    if let Some(api_key) = file.api_key {
        target.api_key = Some(api_key.into());
    }
    if file.base_url.is_some() {
        target.base_url = file.base_url;
    }
    if let Some(model) = file.model {
        target.model = model;
    }
    if let Some(timeout_secs) = file.timeout_secs {
        target.timeout_secs = timeout_secs;
    }
}

fn resolve_config_path(options: &LoadOptions) -> Option<PathBuf> {
    options
        .config_path
        .clone()
        .or_else(|| env::var("REMEDI_CONFIG").ok().map(PathBuf::from))
        .or_else(|| Some(PathBuf::from("remedi.toml")))
}
