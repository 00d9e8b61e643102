use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use remedi_core::config::{AppConfig, LoadOptions, ProviderConfig};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let file_doc = load_config_file_doc(config_file_path.as_deref());
    let doc = file_doc.as_ref();
    let path = config_file_path.as_deref();

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        field_source("database.url", Some("REMEDI_DATABASE_URL"), doc, path),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        field_source("database.max_connections", None, doc, path),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        field_source("database.timeout_secs", None, doc, path),
    ));

    render_provider(
        &mut lines,
        "primary_provider",
        &config.primary_provider,
        Some("REMEDI_PRIMARY_API_KEY"),
        doc,
        path,
    );
    render_provider(
        &mut lines,
        "secondary_provider",
        &config.secondary_provider,
        Some("REMEDI_SECONDARY_API_KEY"),
        doc,
        path,
    );

    lines.push(render_line(
        "webhooks.fulfillment_url",
        config.webhooks.fulfillment_url.as_deref().unwrap_or("(unset)"),
        field_source("webhooks.fulfillment_url", Some("REMEDI_FULFILLMENT_WEBHOOK_URL"), doc, path),
    ));
    lines.push(render_line(
        "webhooks.low_stock_url",
        config.webhooks.low_stock_url.as_deref().unwrap_or("(unset)"),
        field_source("webhooks.low_stock_url", Some("REMEDI_LOW_STOCK_WEBHOOK_URL"), doc, path),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        field_source("server.bind_address", None, doc, path),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        field_source("server.port", None, doc, path),
    ));
    lines.push(render_line(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
        field_source("server.health_check_port", None, doc, path),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        field_source("logging.level", Some("REMEDI_LOG_LEVEL"), doc, path),
    ));

    lines.join("\n")
}

fn render_provider(
    lines: &mut Vec<String>,
    prefix: &str,
    provider: &ProviderConfig,
    key_env: Option<&'static str>,
    doc: Option<&Value>,
    path: Option<&Path>,
) {
    lines.push(render_line(
        &format!("{prefix}.model"),
        &provider.model,
        field_source(&format!("{prefix}.model"), None, doc, path),
    ));
    let redacted = provider
        .api_key
        .as_ref()
        .map(|key| redact_secret(key.expose_secret()))
        .unwrap_or_else(|| "(unset)".to_string());
    lines.push(render_line(
        &format!("{prefix}.api_key"),
        &redacted,
        field_source(&format!("{prefix}.api_key"), key_env, doc, path),
    ));
}

fn render_line(field: &str, value: &str, source: String) -> String {
    format!("- {field} = {value} [{source}]")
}

// Prefix by characters, not bytes: slicing could split a multi-byte key.
fn redact_secret(secret: &str) -> String {
    if secret.chars().count() <= 4 {
        return "****".to_string();
    }
    let prefix: String = secret.chars().take(4).collect();
    format!("{prefix}****")
}

fn field_source(
    field: &str,
    env_name: Option<&'static str>,
    doc: Option<&Value>,
    path: Option<&Path>,
) -> String {
    if let Some(env_name) = env_name {
        if env::var(env_name).is_ok() {
            return format!("env {env_name}");
        }
    }
    if let (Some(doc), Some(path)) = (doc, path) {
        if file_has_field(doc, field) {
            return format!("file {}", path.display());
        }
    }
    "default".to_string()
}

fn file_has_field(doc: &Value, field: &str) -> bool {
    let mut node = doc;
    for part in field.split('.') {
        match node.get(part) {
            Some(next) => node = next,
            None => return false,
        }
    }
    true
}

fn detect_config_path() -> Option<PathBuf> {
    let path = env::var("REMEDI_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("remedi.toml"));
    path.exists().then_some(path)
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

#[cfg(test)]
mod tests {
    use super::{file_has_field, redact_secret};

    #[test]
    fn redaction_keeps_only_a_short_prefix() {
        assert_eq!(redact_secret("sk-abcdef123456"), "sk-a****");
        assert_eq!(redact_secret("key"), "****");
    }

    #[test]
    fn redaction_handles_multibyte_keys() {
        assert_eq!(redact_secret("clé-secrète-123"), "clé-****");
        assert_eq!(redact_secret("clé"), "****");
    }

    #[test]
    fn nested_field_lookup_follows_dots() {
        let doc: toml::Value =
            "[database]\nurl = \"sqlite://x.db\"\n".parse().expect("valid toml");
        assert!(file_has_field(&doc, "database.url"));
        assert!(!file_has_field(&doc, "database.max_connections"));
        assert!(!file_has_field(&doc, "server.port"));
    }
}
