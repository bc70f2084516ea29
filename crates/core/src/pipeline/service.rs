use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::catalog::CourseCatalog;
use crate::domain::course::{CourseDescriptor, CourseKey};
use crate::domain::user::{AddOutcome, CourseListEntry, RemoveOutcome, UserBootstrap, UserId};
use crate::errors::{ApplicationError, CatalogError, StoreError};
use crate::locks::UserLocks;
use crate::store::UserStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServiceTimeouts {
    pub store: Duration,
    pub catalog: Duration,
}

impl Default for ServiceTimeouts {
    fn default() -> Self {
        Self { store: Duration::from_secs(5), catalog: Duration::from_secs(5) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CourseListOutcome {
    Plan { entries: Vec<CourseListEntry> },
    DepartmentListing { department: String, courses: Vec<CourseDescriptor> },
    CourseDetail { course: CourseDescriptor },
    CourseNotFound { key: CourseKey },
    Added { course: CourseDescriptor },
    AddRejected { course: CourseDescriptor },
    RemoveAcknowledged { key: CourseKey, outcome: RemoveOutcome },
}

/// The five course-list operations.
///
/// Each one bootstraps the user first. Catalog reads run unserialized; store
/// mutations hold the per-user lock. Every store and catalog call is bounded
/// by [`ServiceTimeouts`].
pub struct CourseListService {
    store: Arc<dyn UserStore>,
    catalog: Arc<dyn CourseCatalog>,
    locks: UserLocks,
    timeouts: ServiceTimeouts,
}

impl CourseListService {
    pub fn new(
        store: Arc<dyn UserStore>,
        catalog: Arc<dyn CourseCatalog>,
        timeouts: ServiceTimeouts,
    ) -> Self {
        Self { store, catalog, locks: UserLocks::new(), timeouts }
    }

    pub async fn ensure_user(&self, user_id: &UserId) -> Result<UserBootstrap, ApplicationError> {
        let _guard = self.locks.acquire(user_id).await;
        let bootstrap = self.with_store(self.store.ensure_user(user_id)).await?;
        if bootstrap == UserBootstrap::Created {
            info!(
                event_name = "course_list.user.created",
                user_id = %user_id,
                "initialized course list for new user"
            );
        }
        Ok(bootstrap)
    }

    pub async fn my_plan(&self, user_id: &UserId) -> Result<CourseListOutcome, ApplicationError> {
        self.ensure_user(user_id).await?;
        let entries = self.with_store(self.store.get_list(user_id)).await?;
        Ok(CourseListOutcome::Plan { entries })
    }

    pub async fn list_department(
        &self,
        user_id: &UserId,
        department: &str,
    ) -> Result<CourseListOutcome, ApplicationError> {
        self.ensure_user(user_id).await?;
        debug!(event_name = "course_list.list", department, "finding courses in department");
        let courses = self.with_catalog(self.catalog.find_by_department(department)).await?;
        Ok(CourseListOutcome::DepartmentListing { department: department.to_owned(), courses })
    }

    pub async fn find(
        &self,
        user_id: &UserId,
        key: &CourseKey,
    ) -> Result<CourseListOutcome, ApplicationError> {
        self.ensure_user(user_id).await?;
        Ok(match self.resolve(key).await? {
            Some(course) => CourseListOutcome::CourseDetail { course },
            None => CourseListOutcome::CourseNotFound { key: key.clone() },
        })
    }

    pub async fn add(
        &self,
        user_id: &UserId,
        key: &CourseKey,
    ) -> Result<CourseListOutcome, ApplicationError> {
        self.ensure_user(user_id).await?;
        let Some(course) = self.resolve(key).await? else {
            return Ok(CourseListOutcome::CourseNotFound { key: key.clone() });
        };

        let entry = course.entry();
        let outcome = {
            let _guard = self.locks.acquire(user_id).await;
            self.with_store(self.store.add_entry(user_id, &entry)).await?
        };
        info!(
            event_name = "course_list.add",
            user_id = %user_id,
            course = %key,
            sln = %entry,
            added = outcome == AddOutcome::Added,
            "processed add request"
        );

        Ok(match outcome {
            AddOutcome::Added => CourseListOutcome::Added { course },
            AddOutcome::AlreadyPresent => CourseListOutcome::AddRejected { course },
        })
    }

    pub async fn remove(
        &self,
        user_id: &UserId,
        key: &CourseKey,
    ) -> Result<CourseListOutcome, ApplicationError> {
        self.ensure_user(user_id).await?;
        let Some(course) = self.resolve(key).await? else {
            return Ok(CourseListOutcome::CourseNotFound { key: key.clone() });
        };

        let entry = course.entry();
        let outcome = {
            let _guard = self.locks.acquire(user_id).await;
            self.with_store(self.store.remove_entry(user_id, &entry)).await?
        };
        info!(
            event_name = "course_list.remove",
            user_id = %user_id,
            course = %key,
            sln = %entry,
            outcome = outcome.as_str(),
            "processed remove request"
        );

        Ok(CourseListOutcome::RemoveAcknowledged { key: key.clone(), outcome })
    }

    async fn resolve(&self, key: &CourseKey) -> Result<Option<CourseDescriptor>, ApplicationError> {
        let found = self
            .with_catalog(self.catalog.find_by_department_and_number(&key.department, &key.number))
            .await?;
        if found.is_none() {
            debug!(event_name = "course_list.lookup_miss", course = %key, "course not in catalog");
        }
        Ok(found)
    }

    async fn with_store<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, ApplicationError> {
        match tokio::time::timeout(self.timeouts.store, call).await {
            Ok(result) => result.map_err(ApplicationError::from),
            Err(_) => {
                warn!(
                    event_name = "course_list.store_timeout",
                    timeout_ms = self.timeouts.store.as_millis() as u64,
                    "user store call timed out"
                );
                Err(StoreError::Unavailable(format!(
                    "timed out after {}ms",
                    self.timeouts.store.as_millis()
                ))
                .into())
            }
        }
    }

    async fn with_catalog<T>(
        &self,
        call: impl Future<Output = Result<T, CatalogError>>,
    ) -> Result<T, ApplicationError> {
        match tokio::time::timeout(self.timeouts.catalog, call).await {
            Ok(result) => result.map_err(ApplicationError::from),
            Err(_) => {
                warn!(
                    event_name = "course_list.catalog_timeout",
                    timeout_ms = self.timeouts.catalog.as_millis() as u64,
                    "course catalog call timed out"
                );
                Err(CatalogError::Unavailable(format!(
                    "timed out after {}ms",
                    self.timeouts.catalog.as_millis()
                ))
                .into())
            }
        }
    }
}
