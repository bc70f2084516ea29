use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// SLN, prefix and number of every course the demo fixture inserts.
const DEMO_COURSES: &[DemoCourseContract] = &[
    DemoCourseContract { sln: "-1", prefix: "UBW", number: "101" },
    DemoCourseContract { sln: "12300", prefix: "CSE", number: "142" },
    DemoCourseContract { sln: "12310", prefix: "CSE", number: "143" },
    DemoCourseContract { sln: "12345", prefix: "CSE", number: "344" },
    DemoCourseContract { sln: "12360", prefix: "CSE", number: "351" },
    DemoCourseContract { sln: "20410", prefix: "MATH", number: "124" },
];

/// Small demo catalog for local runs, including the underwater basket
/// weaving test course.
pub struct DemoCatalog;

impl DemoCatalog {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_catalog.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let courses_seeded = DEMO_COURSES
            .iter()
            .map(|course| SeededCourse {
                sln: course.sln,
                prefix: course.prefix,
                number: course.number,
            })
            .collect::<Vec<_>>();

        Ok(SeedResult { courses_seeded })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for course in DEMO_COURSES {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM course WHERE sln = ?1 AND prefix = ?2 AND number = ?3)",
            )
            .bind(course.sln)
            .bind(course.prefix)
            .bind(course.number)
            .fetch_one(pool)
            .await?;
            checks.push((course.sln, present == 1));
        }

        let all_present = checks.iter().all(|(_, exists)| *exists);
        Ok(VerificationResult { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let quoted = DEMO_COURSES
            .iter()
            .map(|course| format!("'{}'", course.sln))
            .collect::<Vec<_>>()
            .join(",");
        sqlx::query(&format!("DELETE FROM course WHERE sln IN ({quoted})")).execute(pool).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct DemoCourseContract {
    sln: &'static str,
    prefix: &'static str,
    number: &'static str,
}

#[derive(Debug)]
pub struct SeedResult {
    pub courses_seeded: Vec<SeededCourse>,
}

#[derive(Debug)]
pub struct SeededCourse {
    pub sln: &'static str,
    pub prefix: &'static str,
    pub number: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
