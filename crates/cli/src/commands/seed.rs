use coursefinder_db::{DemoCatalog, SeededCourse};

use crate::commands::{open_database, prepare, CommandResult, Failure};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;

        let seed_result = DemoCatalog::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoCatalog::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 5u8))?;

        let run_result: Result<Vec<SeededCourse>, Failure> = if verification.all_present {
            Ok(seed_result.courses_seeded)
        } else {
            let failed_checks = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>();
            Err(("seed_verification", verification_failure_message(&failed_checks), 5u8))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(courses) => CommandResult::success("seed", seed_summary(&courses)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn seed_summary(courses: &[SeededCourse]) -> String {
    let lines: Vec<String> = courses
        .iter()
        .map(|course| format!("  - {} {} (SLN {})", course.prefix, course.number, course.sln))
        .collect();
    format!("demo catalog loaded with {} courses:\n{}", courses.len(), lines.join("\n"))
}

fn verification_failure_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some demo courses failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
