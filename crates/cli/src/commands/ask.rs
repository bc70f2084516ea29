use std::sync::Arc;

use coursefinder_agent::classifier::KeywordClassifier;
use coursefinder_agent::runtime::MessageRuntime;
use coursefinder_core::domain::message::MessageEvent;
use coursefinder_core::pipeline::Dispatcher;
use coursefinder_db::{SqlCourseCatalog, SqlUserStore};
use coursefinder_messenger::send::NoopSender;

use crate::commands::{open_database, prepare, CommandResult};

/// Runs one message through the full pipeline against the configured
/// database, using the offline keyword classifier. Nothing is sent.
pub fn run(user_id: &str, text: &str) -> CommandResult {
    let (config, runtime) = match prepare("ask") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;

        let dispatcher = Dispatcher::new(
            Arc::new(SqlUserStore::new(pool.clone())),
            Arc::new(SqlCourseCatalog::new(pool.clone())),
            config.pipeline.timeouts(),
        );
        let message_runtime = MessageRuntime::new(
            Arc::new(KeywordClassifier::new()),
            Arc::new(dispatcher),
            Arc::new(NoopSender),
        );

        let reply =
            message_runtime.reply_to_text(&MessageEvent::new(user_id, text), "cli-ask").await;

        pool.close().await;
        Ok::<String, crate::commands::Failure>(reply)
    });

    match result {
        Ok(reply) => CommandResult::success("ask", reply),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("ask", error_class, message, exit_code)
        }
    }
}
