use async_trait::async_trait;

use crate::domain::course::CourseDescriptor;
use crate::errors::CatalogError;

/// Read-only course reference data. Lookups are exact-match.
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    async fn find_by_department(&self, prefix: &str)
        -> Result<Vec<CourseDescriptor>, CatalogError>;

    async fn find_by_department_and_number(
        &self,
        prefix: &str,
        number: &str,
    ) -> Result<Option<CourseDescriptor>, CatalogError>;
}

#[derive(Default)]
pub struct InMemoryCourseCatalog {
    courses: Vec<CourseDescriptor>,
}

impl InMemoryCourseCatalog {
    pub fn new(courses: Vec<CourseDescriptor>) -> Self {
        Self { courses }
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}

#[async_trait]
impl CourseCatalog for InMemoryCourseCatalog {
    async fn find_by_department(
        &self,
        prefix: &str,
    ) -> Result<Vec<CourseDescriptor>, CatalogError> {
        Ok(self.courses.iter().filter(|course| course.prefix == prefix).cloned().collect())
    }

    async fn find_by_department_and_number(
        &self,
        prefix: &str,
        number: &str,
    ) -> Result<Option<CourseDescriptor>, CatalogError> {
        Ok(self
            .courses
            .iter()
            .find(|course| course.prefix == prefix && course.number == number)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::{CourseCatalog, InMemoryCourseCatalog};
    use crate::domain::course::{CourseDescriptor, Schedule};

    fn course(sln: &str, prefix: &str, number: &str) -> CourseDescriptor {
        CourseDescriptor {
            sln: sln.to_owned(),
            prefix: prefix.to_owned(),
            number: number.to_owned(),
            title: format!("{prefix} {number}"),
            schedule: Schedule { days: "mwf".to_owned(), start: 1130, end: 1220 },
            is_section: false,
            instructor: "Staff".to_owned(),
            is_open: true,
            general_education: None,
            is_writing: false,
            link: None,
        }
    }

    #[tokio::test]
    async fn lookups_are_exact_match() {
        let catalog = InMemoryCourseCatalog::new(vec![
            course("12001", "CSE", "142"),
            course("12002", "CSE", "143"),
            course("20001", "MATH", "124"),
        ]);

        let cse = catalog.find_by_department("CSE").await.expect("lookup");
        assert_eq!(cse.len(), 2);
        assert!(catalog.find_by_department("cse").await.expect("lookup").is_empty());

        let found = catalog.find_by_department_and_number("CSE", "143").await.expect("lookup");
        assert_eq!(found.map(|course| course.sln), Some("12002".to_owned()));
        assert!(catalog
            .find_by_department_and_number("CSE", "14")
            .await
            .expect("lookup")
            .is_none());
    }
}
