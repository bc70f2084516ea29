use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::ServiceTimeouts;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub messenger: MessengerConfig,
    pub classifier: ClassifierConfig,
    pub pipeline: PipelineConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct MessengerConfig {
    pub app_secret: SecretString,
    pub validation_token: SecretString,
    pub page_access_token: SecretString,
    pub server_url: Option<String>,
    pub graph_api_url: String,
    pub send_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ClassifierConfig {
    pub provider: ClassifierProvider,
    pub client_access_token: Option<SecretString>,
    pub base_url: String,
    pub language: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    pub store_timeout_ms: u64,
    pub catalog_timeout_ms: u64,
}

impl PipelineConfig {
    pub fn timeouts(&self) -> ServiceTimeouts {
        ServiceTimeouts {
            store: Duration::from_millis(self.store_timeout_ms),
            catalog: Duration::from_millis(self.catalog_timeout_ms),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierProvider {
    ApiAi,
    Keyword,
}

impl ClassifierProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiAi => "apiai",
            Self::Keyword => "keyword",
        }
    }
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
    pub classifier_provider: Option<ClassifierProvider>,
    pub messenger_app_secret: Option<String>,
    pub messenger_validation_token: Option<String>,
    pub messenger_page_access_token: Option<String>,
    pub server_url: Option<String>,
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
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://coursefinder.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            messenger: MessengerConfig {
                app_secret: String::new().into(),
                validation_token: String::new().into(),
                page_access_token: String::new().into(),
                server_url: None,
                graph_api_url: "https://graph.facebook.com/v2.6".to_string(),
                send_timeout_secs: 10,
            },
            classifier: ClassifierConfig {
                provider: ClassifierProvider::Keyword,
                client_access_token: None,
                base_url: "https://api.api.ai/v1".to_string(),
                language: "en".to_string(),
                timeout_secs: 10,
            },
            pipeline: PipelineConfig { store_timeout_ms: 5_000, catalog_timeout_ms: 5_000 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 5000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for ClassifierProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "apiai" | "api.ai" => Ok(Self::ApiAi),
            "keyword" => Ok(Self::Keyword),
            other => Err(ConfigError::Validation(format!(
                "unsupported classifier provider `{other}` (expected apiai|keyword)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("coursefinder.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
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

        if let Some(messenger) = patch.messenger {
            if let Some(app_secret) = messenger.app_secret {
                self.messenger.app_secret = secret_value(app_secret);
            }
            if let Some(validation_token) = messenger.validation_token {
                self.messenger.validation_token = secret_value(validation_token);
            }
            if let Some(page_access_token) = messenger.page_access_token {
                self.messenger.page_access_token = secret_value(page_access_token);
            }
            if let Some(server_url) = messenger.server_url {
                self.messenger.server_url = Some(server_url);
            }
            if let Some(graph_api_url) = messenger.graph_api_url {
                self.messenger.graph_api_url = graph_api_url;
            }
            if let Some(send_timeout_secs) = messenger.send_timeout_secs {
                self.messenger.send_timeout_secs = send_timeout_secs;
            }
        }

        if let Some(classifier) = patch.classifier {
            if let Some(provider) = classifier.provider {
                self.classifier.provider = provider;
            }
            if let Some(client_access_token) = classifier.client_access_token {
                self.classifier.client_access_token = Some(secret_value(client_access_token));
            }
            if let Some(base_url) = classifier.base_url {
                self.classifier.base_url = base_url;
            }
            if let Some(language) = classifier.language {
                self.classifier.language = language;
            }
            if let Some(timeout_secs) = classifier.timeout_secs {
                self.classifier.timeout_secs = timeout_secs;
            }
        }

        if let Some(pipeline) = patch.pipeline {
            if let Some(store_timeout_ms) = pipeline.store_timeout_ms {
                self.pipeline.store_timeout_ms = store_timeout_ms;
            }
            if let Some(catalog_timeout_ms) = pipeline.catalog_timeout_ms {
                self.pipeline.catalog_timeout_ms = catalog_timeout_ms;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("COURSEFINDER_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("COURSEFINDER_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("COURSEFINDER_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("COURSEFINDER_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("COURSEFINDER_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let app_secret = read_env("COURSEFINDER_MESSENGER_APP_SECRET")
            .or_else(|| read_env("MESSENGER_APP_SECRET"));
        if let Some(value) = app_secret {
            self.messenger.app_secret = secret_value(value);
        }
        let validation_token = read_env("COURSEFINDER_MESSENGER_VALIDATION_TOKEN")
            .or_else(|| read_env("MESSENGER_VALIDATION_TOKEN"));
        if let Some(value) = validation_token {
            self.messenger.validation_token = secret_value(value);
        }
        let page_access_token = read_env("COURSEFINDER_MESSENGER_PAGE_ACCESS_TOKEN")
            .or_else(|| read_env("MESSENGER_PAGE_ACCESS_TOKEN"));
        if let Some(value) = page_access_token {
            self.messenger.page_access_token = secret_value(value);
        }
        let server_url =
            read_env("COURSEFINDER_MESSENGER_SERVER_URL").or_else(|| read_env("SERVER_URL"));
        if let Some(value) = server_url {
            self.messenger.server_url = Some(value);
        }
        if let Some(value) = read_env("COURSEFINDER_MESSENGER_GRAPH_API_URL") {
            self.messenger.graph_api_url = value;
        }
        if let Some(value) = read_env("COURSEFINDER_MESSENGER_SEND_TIMEOUT_SECS") {
            self.messenger.send_timeout_secs =
                parse_u64("COURSEFINDER_MESSENGER_SEND_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("COURSEFINDER_CLASSIFIER_PROVIDER") {
            self.classifier.provider = value.parse()?;
        }
        if let Some(value) = read_env("COURSEFINDER_CLASSIFIER_CLIENT_ACCESS_TOKEN") {
            self.classifier.client_access_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("COURSEFINDER_CLASSIFIER_BASE_URL") {
            self.classifier.base_url = value;
        }
        if let Some(value) = read_env("COURSEFINDER_CLASSIFIER_LANGUAGE") {
            self.classifier.language = value;
        }
        if let Some(value) = read_env("COURSEFINDER_CLASSIFIER_TIMEOUT_SECS") {
            self.classifier.timeout_secs =
                parse_u64("COURSEFINDER_CLASSIFIER_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("COURSEFINDER_PIPELINE_STORE_TIMEOUT_MS") {
            self.pipeline.store_timeout_ms =
                parse_u64("COURSEFINDER_PIPELINE_STORE_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("COURSEFINDER_PIPELINE_CATALOG_TIMEOUT_MS") {
            self.pipeline.catalog_timeout_ms =
                parse_u64("COURSEFINDER_PIPELINE_CATALOG_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = read_env("COURSEFINDER_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        let port = read_env("COURSEFINDER_SERVER_PORT").or_else(|| read_env("PORT"));
        if let Some(value) = port {
            self.server.port = parse_u16("COURSEFINDER_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("COURSEFINDER_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("COURSEFINDER_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("COURSEFINDER_LOGGING_LEVEL")
            .or_else(|| read_env("COURSEFINDER_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("COURSEFINDER_LOGGING_FORMAT")
            .or_else(|| read_env("COURSEFINDER_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(provider) = overrides.classifier_provider {
            self.classifier.provider = provider;
        }
        if let Some(app_secret) = overrides.messenger_app_secret {
            self.messenger.app_secret = secret_value(app_secret);
        }
        if let Some(validation_token) = overrides.messenger_validation_token {
            self.messenger.validation_token = secret_value(validation_token);
        }
        if let Some(page_access_token) = overrides.messenger_page_access_token {
            self.messenger.page_access_token = secret_value(page_access_token);
        }
        if let Some(server_url) = overrides.server_url {
            self.messenger.server_url = Some(server_url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_messenger(&self.messenger)?;
        validate_classifier(&self.classifier)?;
        validate_pipeline(&self.pipeline)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("coursefinder.toml"), PathBuf::from("config/coursefinder.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_messenger(messenger: &MessengerConfig) -> Result<(), ConfigError> {
    let required = [
        ("messenger.app_secret", &messenger.app_secret, "App Dashboard > Settings > Basic > App Secret"),
        (
            "messenger.validation_token",
            &messenger.validation_token,
            "the verify token you typed when subscribing the webhook",
        ),
        (
            "messenger.page_access_token",
            &messenger.page_access_token,
            "App Dashboard > Messenger > Settings > Access Tokens",
        ),
    ];
    for (key, value, hint) in required {
        if value.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{key} is required (set it in coursefinder.toml or the environment). Get it from {hint}"
            )));
        }
    }

    if let Some(server_url) = &messenger.server_url {
        if !is_http_url(server_url) {
            return Err(ConfigError::Validation(
                "messenger.server_url must start with http:// or https://".to_string(),
            ));
        }
    }

    if !is_http_url(&messenger.graph_api_url) {
        return Err(ConfigError::Validation(
            "messenger.graph_api_url must start with http:// or https://".to_string(),
        ));
    }

    if messenger.send_timeout_secs == 0 || messenger.send_timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "messenger.send_timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_classifier(classifier: &ClassifierConfig) -> Result<(), ConfigError> {
    if classifier.timeout_secs == 0 || classifier.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "classifier.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    if classifier.provider == ClassifierProvider::ApiAi {
        let missing = classifier
            .client_access_token
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "classifier.client_access_token is required for the apiai provider".to_string(),
            ));
        }
        if !is_http_url(&classifier.base_url) {
            return Err(ConfigError::Validation(
                "classifier.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_pipeline(pipeline: &PipelineConfig) -> Result<(), ConfigError> {
    for (key, value) in [
        ("pipeline.store_timeout_ms", pipeline.store_timeout_ms),
        ("pipeline.catalog_timeout_ms", pipeline.catalog_timeout_ms),
    ] {
        if value == 0 || value > 60_000 {
            return Err(ConfigError::Validation(format!("{key} must be in range 1..=60000")));
        }
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    messenger: Option<MessengerPatch>,
    classifier: Option<ClassifierPatch>,
    pipeline: Option<PipelinePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MessengerPatch {
    app_secret: Option<String>,
    validation_token: Option<String>,
    page_access_token: Option<String>,
    server_url: Option<String>,
    graph_api_url: Option<String>,
    send_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassifierPatch {
    provider: Option<ClassifierProvider>,
    client_access_token: Option<String>,
    base_url: Option<String>,
    language: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelinePatch {
    store_timeout_ms: Option<u64>,
    catalog_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
