use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use coursefinder_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", &["COURSEFINDER_DATABASE_URL"]),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", &["COURSEFINDER_DATABASE_MAX_CONNECTIONS"]),
    ));

    lines.push(render_line(
        "messenger.app_secret",
        &redact_secret(&config.messenger.app_secret),
        source(
            "messenger.app_secret",
            &["COURSEFINDER_MESSENGER_APP_SECRET", "MESSENGER_APP_SECRET"],
        ),
    ));
    lines.push(render_line(
        "messenger.validation_token",
        &redact_secret(&config.messenger.validation_token),
        source(
            "messenger.validation_token",
            &["COURSEFINDER_MESSENGER_VALIDATION_TOKEN", "MESSENGER_VALIDATION_TOKEN"],
        ),
    ));
    lines.push(render_line(
        "messenger.page_access_token",
        &redact_secret(&config.messenger.page_access_token),
        source(
            "messenger.page_access_token",
            &["COURSEFINDER_MESSENGER_PAGE_ACCESS_TOKEN", "MESSENGER_PAGE_ACCESS_TOKEN"],
        ),
    ));
    lines.push(render_line(
        "messenger.server_url",
        config.messenger.server_url.as_deref().unwrap_or("<unset>"),
        source("messenger.server_url", &["COURSEFINDER_MESSENGER_SERVER_URL", "SERVER_URL"]),
    ));
    lines.push(render_line(
        "messenger.graph_api_url",
        &config.messenger.graph_api_url,
        source("messenger.graph_api_url", &["COURSEFINDER_MESSENGER_GRAPH_API_URL"]),
    ));

    lines.push(render_line(
        "classifier.provider",
        config.classifier.provider.as_str(),
        source("classifier.provider", &["COURSEFINDER_CLASSIFIER_PROVIDER"]),
    ));
    let client_access_token = match &config.classifier.client_access_token {
        Some(token) => redact_secret(token),
        None => "<unset>".to_string(),
    };
    lines.push(render_line(
        "classifier.client_access_token",
        &client_access_token,
        source("classifier.client_access_token", &["COURSEFINDER_CLASSIFIER_CLIENT_ACCESS_TOKEN"]),
    ));
    lines.push(render_line(
        "classifier.base_url",
        &config.classifier.base_url,
        source("classifier.base_url", &["COURSEFINDER_CLASSIFIER_BASE_URL"]),
    ));

    lines.push(render_line(
        "pipeline.store_timeout_ms",
        &config.pipeline.store_timeout_ms.to_string(),
        source("pipeline.store_timeout_ms", &["COURSEFINDER_PIPELINE_STORE_TIMEOUT_MS"]),
    ));
    lines.push(render_line(
        "pipeline.catalog_timeout_ms",
        &config.pipeline.catalog_timeout_ms.to_string(),
        source("pipeline.catalog_timeout_ms", &["COURSEFINDER_PIPELINE_CATALOG_TIMEOUT_MS"]),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", &["COURSEFINDER_SERVER_BIND_ADDRESS"]),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", &["COURSEFINDER_SERVER_PORT", "PORT"]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["COURSEFINDER_LOGGING_LEVEL", "COURSEFINDER_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", &["COURSEFINDER_LOGGING_FORMAT", "COURSEFINDER_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("coursefinder.toml"), PathBuf::from("config/coursefinder.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the first four characters of long secrets so operators can tell
/// tokens apart.
fn redact_secret(secret: &SecretString) -> String {
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if trimmed.chars().count() > 12 {
        let prefix: String = trimmed.chars().take(4).collect();
        return format!("{prefix}***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_secret};

    #[test]
    fn redaction_never_reveals_short_secrets() {
        assert_eq!(redact_secret(&"".to_string().into()), "<empty>");
        assert_eq!(redact_secret(&"verify-me".to_string().into()), "<redacted>");
        assert_eq!(redact_secret(&"EAAGm0PX4ZCpsBAKZCtoken".to_string().into()), "EAAG***");
    }

    #[test]
    fn nested_keys_are_found_in_config_documents() {
        let doc: Value = "[messenger]\nserver_url = \"https://bot.example.com\"\n"
            .parse()
            .expect("toml");
        assert!(contains_path(&doc, "messenger.server_url"));
        assert!(!contains_path(&doc, "messenger.app_secret"));
        assert!(!contains_path(&doc, "classifier.provider"));
    }
}
