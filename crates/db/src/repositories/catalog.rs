use async_trait::async_trait;
use sqlx::Row;

use coursefinder_core::catalog::CourseCatalog;
use coursefinder_core::domain::course::{CourseDescriptor, Schedule};
use coursefinder_core::errors::CatalogError;

use super::RepositoryError;
use crate::DbPool;

const COURSE_COLUMNS: &str = "sln, prefix, number, title, days, start_time, end_time, is_section,
     instructor, is_open, general_education, is_writing, link";

pub struct SqlCourseCatalog {
    pool: DbPool,
}

impl SqlCourseCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, course: &CourseDescriptor) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO course (sln, prefix, number, title, days, start_time, end_time, is_section,
                                 instructor, is_open, general_education, is_writing, link)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(sln) DO UPDATE SET
                 prefix = excluded.prefix,
                 number = excluded.number,
                 title = excluded.title,
                 days = excluded.days,
                 start_time = excluded.start_time,
                 end_time = excluded.end_time,
                 is_section = excluded.is_section,
                 instructor = excluded.instructor,
                 is_open = excluded.is_open,
                 general_education = excluded.general_education,
                 is_writing = excluded.is_writing,
                 link = excluded.link",
        )
        .bind(&course.sln)
        .bind(&course.prefix)
        .bind(&course.number)
        .bind(&course.title)
        .bind(&course.schedule.days)
        .bind(i64::from(course.schedule.start))
        .bind(i64::from(course.schedule.end))
        .bind(course.is_section)
        .bind(&course.instructor)
        .bind(course.is_open)
        .bind(&course.general_education)
        .bind(course.is_writing)
        .bind(&course.link)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count(&self) -> Result<i64, RepositoryError> {
        Ok(sqlx::query_scalar("SELECT COUNT(1) FROM course").fetch_one(&self.pool).await?)
    }

    async fn by_department(&self, prefix: &str) -> Result<Vec<CourseDescriptor>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {COURSE_COLUMNS} FROM course WHERE prefix = ? ORDER BY rowid ASC"
        ))
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_course).collect()
    }

    async fn by_department_and_number(
        &self,
        prefix: &str,
        number: &str,
    ) -> Result<Option<CourseDescriptor>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {COURSE_COLUMNS} FROM course WHERE prefix = ? AND number = ?
             ORDER BY rowid ASC LIMIT 1"
        ))
        .bind(prefix)
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_course).transpose()
    }
}

fn row_to_course(row: &sqlx::sqlite::SqliteRow) -> Result<CourseDescriptor, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
    let start: i64 = row.try_get("start_time").map_err(decode)?;
    let end: i64 = row.try_get("end_time").map_err(decode)?;

    Ok(CourseDescriptor {
        sln: row.try_get("sln").map_err(decode)?,
        prefix: row.try_get("prefix").map_err(decode)?,
        number: row.try_get("number").map_err(decode)?,
        title: row.try_get("title").map_err(decode)?,
        schedule: Schedule {
            days: row.try_get("days").map_err(decode)?,
            start: clock_value("start_time", start)?,
            end: clock_value("end_time", end)?,
        },
        is_section: row.try_get("is_section").map_err(decode)?,
        instructor: row.try_get("instructor").map_err(decode)?,
        is_open: row.try_get("is_open").map_err(decode)?,
        general_education: row.try_get("general_education").map_err(decode)?,
        is_writing: row.try_get("is_writing").map_err(decode)?,
        link: row.try_get("link").map_err(decode)?,
    })
}

fn clock_value(column: &str, value: i64) -> Result<u16, RepositoryError> {
    u16::try_from(value)
        .ok()
        .filter(|clock| *clock <= 2400)
        .ok_or_else(|| RepositoryError::Decode(format!("{column} `{value}` is not an HHMM time")))
}

#[async_trait]
impl CourseCatalog for SqlCourseCatalog {
    async fn find_by_department(
        &self,
        prefix: &str,
    ) -> Result<Vec<CourseDescriptor>, CatalogError> {
        Ok(self.by_department(prefix).await?)
    }

    async fn find_by_department_and_number(
        &self,
        prefix: &str,
        number: &str,
    ) -> Result<Option<CourseDescriptor>, CatalogError> {
        Ok(self.by_department_and_number(prefix, number).await?)
    }
}

#[cfg(test)]
mod tests {
    use coursefinder_core::catalog::CourseCatalog;
    use coursefinder_core::domain::course::{CourseDescriptor, Schedule};

    use super::SqlCourseCatalog;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlCourseCatalog {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlCourseCatalog::new(pool)
    }

    fn course(sln: &str, prefix: &str, number: &str, title: &str) -> CourseDescriptor {
        CourseDescriptor {
            sln: sln.to_string(),
            prefix: prefix.to_string(),
            number: number.to_string(),
            title: title.to_string(),
            schedule: Schedule { days: "mwf".to_string(), start: 1130, end: 1220 },
            is_section: false,
            instructor: "Staff".to_string(),
            is_open: true,
            general_education: Some("NW".to_string()),
            is_writing: false,
            link: None,
        }
    }

    #[tokio::test]
    async fn save_and_find_round_trip_every_field() {
        let catalog = setup().await;
        let original = course("12345", "CSE", "344", "Introduction to Data Management");
        catalog.save(&original).await.expect("save");

        let found = catalog
            .find_by_department_and_number("CSE", "344")
            .await
            .expect("find")
            .expect("course should exist");
        assert_eq!(found, original);
        assert!(catalog.find_by_department_and_number("CSE", "999").await.expect("find").is_none());
    }

    #[tokio::test]
    async fn department_lookup_returns_matches_in_insertion_order() {
        let catalog = setup().await;
        catalog.save(&course("3", "CSE", "351", "Hardware/Software")).await.expect("save");
        catalog.save(&course("1", "CSE", "142", "Programming I")).await.expect("save");
        catalog.save(&course("2", "MATH", "124", "Calculus I")).await.expect("save");

        let cse = catalog.find_by_department("CSE").await.expect("find");
        assert_eq!(cse.iter().map(|c| c.number.as_str()).collect::<Vec<_>>(), vec!["351", "142"]);
        assert!(catalog.find_by_department("cse").await.expect("find").is_empty());
        assert_eq!(catalog.count().await.expect("count"), 3);
    }

    #[tokio::test]
    async fn save_upserts_on_sln() {
        let catalog = setup().await;
        let mut original = course("12345", "CSE", "344", "Data Management");
        catalog.save(&original).await.expect("save");

        original.is_open = false;
        catalog.save(&original).await.expect("upsert");

        let found = catalog.find_by_department_and_number("CSE", "344").await.expect("find");
        assert_eq!(found.map(|c| c.is_open), Some(false));
        assert_eq!(catalog.count().await.expect("count"), 1);
    }
}
