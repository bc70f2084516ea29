use std::sync::Arc;

use coursefinder_agent::classifier::{classifier_from_config, ClassifierError};
use coursefinder_agent::runtime::MessageRuntime;
use coursefinder_core::config::{AppConfig, ConfigError, LoadOptions};
use coursefinder_core::pipeline::Dispatcher;
use coursefinder_db::{connect, migrations, DbPool, SqlCourseCatalog, SqlUserStore};
use coursefinder_messenger::send::{GraphSendClient, SendError};
use coursefinder_messenger::signature::SignatureVerifier;
use thiserror::Error;
use tracing::info;

use crate::webhook::WebhookState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: Arc<MessageRuntime>,
}

impl Application {
    pub fn webhook_state(&self) -> WebhookState {
        WebhookState::new(
            SignatureVerifier::new(self.config.messenger.app_secret.clone()),
            self.config.messenger.validation_token.clone(),
            self.runtime.clone(),
        )
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("classifier setup failed: {0}")]
    Classifier(#[source] ClassifierError),
    #[error("send api client setup failed: {0}")]
    SendClient(#[source] SendError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let dispatcher = Dispatcher::new(
        Arc::new(SqlUserStore::new(db_pool.clone())),
        Arc::new(SqlCourseCatalog::new(db_pool.clone())),
        config.pipeline.timeouts(),
    );
    let classifier =
        classifier_from_config(&config.classifier).map_err(BootstrapError::Classifier)?;
    let sender = GraphSendClient::from_config(&config.messenger).map_err(BootstrapError::SendClient)?;
    info!(
        event_name = "system.bootstrap.runtime_ready",
        correlation_id = "bootstrap",
        classifier = classifier.name(),
        "message runtime initialized"
    );

    let runtime = Arc::new(MessageRuntime::new(classifier, Arc::new(dispatcher), Arc::new(sender)));
    Ok(Application { config, db_pool, runtime })
}

#[cfg(test)]
mod tests {
    use coursefinder_core::config::{ConfigOverrides, LoadOptions};
    use coursefinder_core::domain::message::MessageEvent;
    use coursefinder_db::DemoCatalog;

    use crate::bootstrap::bootstrap;

    fn valid_overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                messenger_app_secret: Some("app-secret".to_string()),
                messenger_validation_token: Some("verify-me".to_string()),
                messenger_page_access_token: Some("page-token".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_messenger_secrets() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                messenger_validation_token: Some("verify-me".to_string()),
                messenger_page_access_token: Some("page-token".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("messenger.app_secret"), "unexpected error: {message}");
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_answers_through_sql_backends() {
        let app = bootstrap(valid_overrides("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('course', 'user_courses')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query");
        assert_eq!(table_count, 2);

        DemoCatalog::load(&app.db_pool).await.expect("seed demo catalog");
        let reply = app
            .runtime
            .reply_to_text(&MessageEvent::new("u1", "add CSE 344"), "test-correlation")
            .await;
        assert!(reply.starts_with("Added class"), "unexpected reply: {reply}");

        let (stored,): (String,) =
            sqlx::query_as("SELECT course_list FROM user_courses WHERE user_id = 'u1'")
                .fetch_one(&app.db_pool)
                .await
                .expect("user row");
        assert_eq!(stored, r#"["null","12345"]"#);

        app.db_pool.close().await;
    }
}
