use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use coursefinder_core::domain::user::{
    AddOutcome, CourseListEntry, RemoveOutcome, UserBootstrap, UserCourseList, UserId,
};
use coursefinder_core::errors::StoreError;
use coursefinder_core::store::UserStore;

use super::RepositoryError;
use crate::DbPool;

/// `user_courses` rows hold the whole list as a JSON array, sentinel first.
pub struct SqlUserStore {
    pool: DbPool,
}

impl SqlUserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn count_users(&self) -> Result<i64, RepositoryError> {
        Ok(sqlx::query_scalar("SELECT COUNT(1) FROM user_courses").fetch_one(&self.pool).await?)
    }

    async fn insert_if_absent(&self, user_id: &UserId) -> Result<bool, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let stored = encode_list(UserCourseList::initialized())?;
        let result = sqlx::query(
            "INSERT INTO user_courses (user_id, course_list, created_at, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(&user_id.0)
        .bind(stored)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn load(&self, user_id: &UserId) -> Result<Option<UserCourseList>, RepositoryError> {
        let row = sqlx::query("SELECT course_list FROM user_courses WHERE user_id = ?")
            .bind(&user_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode_row).transpose()
    }

    /// Read-modify-write of one user's list inside a single transaction.
    ///
    /// The transaction takes the write lock before the read, so a writer for
    /// another user waits on `busy_timeout` instead of failing with
    /// `SQLITE_BUSY` when a deferred read lock cannot be upgraded.
    async fn mutate<T>(
        &self,
        user_id: &UserId,
        change: impl FnOnce(&mut UserCourseList) -> (T, bool),
    ) -> Result<T, RepositoryError> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let row = sqlx::query("SELECT course_list FROM user_courses WHERE user_id = ?")
            .bind(&user_id.0)
            .fetch_optional(&mut *tx)
            .await?;
        let mut list = match row.as_ref() {
            Some(row) => decode_row(row)?,
            None => UserCourseList::initialized(),
        };

        let (outcome, changed) = change(&mut list);
        if changed {
            let now = Utc::now().to_rfc3339();
            sqlx::query(
                "INSERT INTO user_courses (user_id, course_list, created_at, updated_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(user_id) DO UPDATE SET
                     course_list = excluded.course_list,
                     updated_at = excluded.updated_at",
            )
            .bind(&user_id.0)
            .bind(encode_list(list)?)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(outcome)
    }
}

fn decode_row(row: &sqlx::sqlite::SqliteRow) -> Result<UserCourseList, RepositoryError> {
    let raw: String =
        row.try_get("course_list").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let stored: Vec<String> = serde_json::from_str(&raw)
        .map_err(|e| RepositoryError::Decode(format!("course_list is not a string array: {e}")))?;
    Ok(UserCourseList::from_stored(stored))
}

fn encode_list(list: UserCourseList) -> Result<String, RepositoryError> {
    serde_json::to_string(&list.into_stored()).map_err(|e| RepositoryError::Decode(e.to_string()))
}

#[async_trait]
impl UserStore for SqlUserStore {
    async fn ensure_user(&self, user_id: &UserId) -> Result<UserBootstrap, StoreError> {
        let created = self.insert_if_absent(user_id).await?;
        Ok(if created { UserBootstrap::Created } else { UserBootstrap::AlreadyExists })
    }

    async fn get_list(&self, user_id: &UserId) -> Result<Vec<CourseListEntry>, StoreError> {
        let list = self.load(user_id).await?;
        Ok(list.map(|list| list.entries()).unwrap_or_default())
    }

    async fn add_entry(
        &self,
        user_id: &UserId,
        entry: &CourseListEntry,
    ) -> Result<AddOutcome, StoreError> {
        let outcome = self
            .mutate(user_id, |list| {
                let outcome = list.add(entry.clone());
                (outcome, outcome == AddOutcome::Added)
            })
            .await?;
        Ok(outcome)
    }

    async fn remove_entry(
        &self,
        user_id: &UserId,
        entry: &CourseListEntry,
    ) -> Result<RemoveOutcome, StoreError> {
        let outcome = self
            .mutate(user_id, |list| {
                let outcome = list.remove(entry);
                (outcome, outcome == RemoveOutcome::Removed)
            })
            .await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use coursefinder_core::domain::user::{
        AddOutcome, CourseListEntry, RemoveOutcome, UserBootstrap, UserId,
    };
    use coursefinder_core::store::UserStore;

    use std::sync::Arc;

    use tempfile::TempDir;

    use super::SqlUserStore;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn u1() -> UserId {
        UserId("u1".to_string())
    }

    #[tokio::test]
    async fn ensure_then_add_persists_entry() {
        let store = SqlUserStore::new(setup().await);

        assert_eq!(store.ensure_user(&u1()).await.expect("ensure"), UserBootstrap::Created);
        assert_eq!(
            store.add_entry(&u1(), &CourseListEntry::new("344")).await.expect("add"),
            AddOutcome::Added
        );
        assert_eq!(store.get_list(&u1()).await.expect("list"), vec![CourseListEntry::new("344")]);
        assert_eq!(store.ensure_user(&u1()).await.expect("ensure"), UserBootstrap::AlreadyExists);
        assert_eq!(store.get_list(&u1()).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn stored_json_keeps_sentinel_first() {
        let pool = setup().await;
        let store = SqlUserStore::new(pool.clone());
        store.ensure_user(&u1()).await.expect("ensure");
        store.add_entry(&u1(), &CourseListEntry::new("12345")).await.expect("add");

        let raw: String =
            sqlx::query_scalar("SELECT course_list FROM user_courses WHERE user_id = 'u1'")
                .fetch_one(&pool)
                .await
                .expect("raw list");
        assert_eq!(raw, r#"["null","12345"]"#);
    }

    #[tokio::test]
    async fn duplicate_add_and_absent_remove_are_outcomes() {
        let store = SqlUserStore::new(setup().await);
        let entry = CourseListEntry::new("344");
        store.ensure_user(&u1()).await.expect("ensure");

        store.add_entry(&u1(), &entry).await.expect("add");
        assert_eq!(store.add_entry(&u1(), &entry).await.expect("add"), AddOutcome::AlreadyPresent);
        assert_eq!(store.remove_entry(&u1(), &entry).await.expect("remove"), RemoveOutcome::Removed);
        assert_eq!(
            store.remove_entry(&u1(), &entry).await.expect("remove"),
            RemoveOutcome::NotPresent
        );
        assert!(store.get_list(&u1()).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn add_for_unregistered_user_creates_row() {
        let store = SqlUserStore::new(setup().await);

        store.add_entry(&u1(), &CourseListEntry::new("142")).await.expect("add");
        assert_eq!(store.count_users().await.expect("count"), 1);
        assert_eq!(store.ensure_user(&u1()).await.expect("ensure"), UserBootstrap::AlreadyExists);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_for_different_users_all_succeed() {
        let dir = TempDir::new().expect("temp dir");
        let url = format!("sqlite://{}", dir.path().join("courses.db").display());
        let pool = connect_with_settings(&url, 5, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let store = Arc::new(SqlUserStore::new(pool));

        let users: Vec<UserId> = (0..20).map(|n| UserId(format!("user-{n}"))).collect();
        for user in &users {
            store.ensure_user(user).await.expect("ensure");
        }

        let mut handles = Vec::new();
        for user in users.clone() {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let mut failures = Vec::new();
                for n in 0..10 {
                    let entry = CourseListEntry::new((10000 + n).to_string());
                    if let Err(error) = store.add_entry(&user, &entry).await {
                        failures.push(error.to_string());
                    }
                }
                failures
            }));
        }

        let mut failures = Vec::new();
        for handle in handles {
            failures.extend(handle.await.expect("writer task"));
        }
        assert!(failures.is_empty(), "{} adds failed, first: {:?}", failures.len(), failures.first());

        for user in &users {
            assert_eq!(store.get_list(user).await.expect("list").len(), 10, "list for {}", user.0);
        }
    }

    #[tokio::test]
    async fn corrupt_row_surfaces_as_unavailable() {
        let pool = setup().await;
        sqlx::query(
            "INSERT INTO user_courses (user_id, course_list, created_at, updated_at) VALUES ('u1', '{\"a\":1}', 'now', 'now')",
        )
        .execute(&pool)
        .await
        .expect("insert corrupt row");

        let store = SqlUserStore::new(pool);
        assert!(store.get_list(&u1()).await.is_err());
    }
}
