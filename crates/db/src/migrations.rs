use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Successfully applied migrations against the ones embedded in this build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchemaStatus {
    pub applied: usize,
    pub embedded: usize,
}

impl SchemaStatus {
    pub fn is_current(&self) -> bool {
        self.applied >= self.embedded
    }

    pub fn pending(&self) -> usize {
        self.embedded.saturating_sub(self.applied)
    }
}

pub async fn schema_status(pool: &DbPool) -> Result<SchemaStatus, sqlx::Error> {
    let embedded = MIGRATOR.iter().count();
    let tracked: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;
    if tracked == 0 {
        return Ok(SchemaStatus { applied: 0, embedded });
    }

    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?;
    Ok(SchemaStatus { applied: usize::try_from(applied).unwrap_or(0), embedded })
}
