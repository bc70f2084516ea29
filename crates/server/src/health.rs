use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use coursefinder_db::migrations::{self, SchemaStatus};
use coursefinder_db::{DbPool, SqlCourseCatalog, SqlUserStore};
use serde::Serialize;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    Ready,
    Degraded,
    Unavailable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SchemaReport {
    pub applied: usize,
    pub embedded: usize,
}

impl From<SchemaStatus> for SchemaReport {
    fn from(status: SchemaStatus) -> Self {
        Self { applied: status.applied, embedded: status.embedded }
    }
}

/// Body of `GET /health`. Counts are absent when they could not be read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    pub readiness: Readiness,
    pub schema: Option<SchemaReport>,
    pub users_stored: Option<i64>,
    pub catalog_courses: Option<i64>,
    pub problems: Vec<String>,
    pub checked_at: String,
}

impl ReadinessReport {
    fn status_code(&self) -> StatusCode {
        match self.readiness {
            Readiness::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Readiness::Ready | Readiness::Degraded => StatusCode::OK,
        }
    }
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(db_pool)
}

pub async fn health(State(pool): State<DbPool>) -> (StatusCode, Json<ReadinessReport>) {
    let report = inspect(&pool).await;
    if report.readiness != Readiness::Ready {
        warn!(
            event_name = "health.not_ready",
            readiness = ?report.readiness,
            problems = %report.problems.join("; "),
            "readiness check found problems"
        );
    }
    (report.status_code(), Json(report))
}

async fn inspect(pool: &DbPool) -> ReadinessReport {
    let mut report = ReadinessReport {
        readiness: Readiness::Ready,
        schema: None,
        users_stored: None,
        catalog_courses: None,
        problems: Vec::new(),
        checked_at: Utc::now().to_rfc3339(),
    };

    let schema = match migrations::schema_status(pool).await {
        Ok(schema) => schema,
        Err(error) => {
            report.readiness = Readiness::Unavailable;
            report.problems.push(format!("database unreachable: {error}"));
            return report;
        }
    };
    report.schema = Some(schema.into());
    if !schema.is_current() {
        report.readiness = Readiness::Unavailable;
        report.problems.push(format!("{} migration(s) pending", schema.pending()));
        return report;
    }

    match SqlUserStore::new(pool.clone()).count_users().await {
        Ok(users) => report.users_stored = Some(users),
        Err(error) => {
            report.readiness = Readiness::Unavailable;
            report.problems.push(format!("user lists unreadable: {error}"));
        }
    }
    match SqlCourseCatalog::new(pool.clone()).count().await {
        Ok(0) => {
            report.catalog_courses = Some(0);
            report.problems.push("course catalog is empty; run `coursefinder seed`".to_owned());
        }
        Ok(courses) => report.catalog_courses = Some(courses),
        Err(error) => {
            report.readiness = Readiness::Unavailable;
            report.problems.push(format!("course catalog unreadable: {error}"));
        }
    }

    if report.readiness == Readiness::Ready && !report.problems.is_empty() {
        report.readiness = Readiness::Degraded;
    }
    report
}
