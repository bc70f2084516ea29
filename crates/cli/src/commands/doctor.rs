use coursefinder_agent::classifier::classifier_from_config;
use coursefinder_core::config::{AppConfig, LoadOptions};
use coursefinder_db::{connect, SqlCourseCatalog, SqlUserStore};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_webhook_url(&config));
            checks.push(check_classifier(&config));
            checks.push(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["webhook_url", "classifier_readiness", "database_readiness"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// The Messenger webhook must be reachable over https.
fn check_webhook_url(config: &AppConfig) -> DoctorCheck {
    match config.messenger.server_url.as_deref() {
        Some(url) if url.starts_with("https://") => DoctorCheck {
            name: "webhook_url",
            status: CheckStatus::Pass,
            details: format!("webhook callback is {}/webhook", url.trim_end_matches('/')),
        },
        Some(url) => DoctorCheck {
            name: "webhook_url",
            status: CheckStatus::Fail,
            details: format!("`{url}` is not https; Messenger only calls https webhooks"),
        },
        None => DoctorCheck {
            name: "webhook_url",
            status: CheckStatus::Fail,
            details: "messenger.server_url is not set".to_string(),
        },
    }
}

fn check_classifier(config: &AppConfig) -> DoctorCheck {
    match classifier_from_config(&config.classifier) {
        Ok(classifier) => DoctorCheck {
            name: "classifier_readiness",
            status: CheckStatus::Pass,
            details: format!("`{}` classifier constructed", classifier.name()),
        },
        Err(error) => DoctorCheck {
            name: "classifier_readiness",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_database(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_readiness",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;

        let counts = async {
            let courses = SqlCourseCatalog::new(pool.clone()).count().await?;
            let users = SqlUserStore::new(pool.clone()).count_users().await?;
            Ok::<_, coursefinder_db::RepositoryError>((courses, users))
        }
        .await
        .map_err(|error| format!("schema not ready (run `coursefinder migrate`): {error}"));

        pool.close().await;
        counts
    });

    match result {
        Ok((courses, users)) => DoctorCheck {
            name: "database_readiness",
            status: CheckStatus::Pass,
            details: format!(
                "connected using `{}`: {courses} courses, {users} users",
                config.database.url
            ),
        },
        Err(error) => {
            DoctorCheck { name: "database_readiness", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
