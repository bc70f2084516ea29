use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::user::{
    AddOutcome, CourseListEntry, RemoveOutcome, UserBootstrap, UserCourseList, UserId,
};
use crate::errors::StoreError;

/// Per-user saved course lists.
///
/// `add_entry` and `remove_entry` are read-modify-write on the whole list;
/// callers serialize them per user (see [`crate::locks::UserLocks`]).
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn ensure_user(&self, user_id: &UserId) -> Result<UserBootstrap, StoreError>;

    /// Real entries only, in insertion order. Unknown users have none.
    async fn get_list(&self, user_id: &UserId) -> Result<Vec<CourseListEntry>, StoreError>;

    async fn add_entry(
        &self,
        user_id: &UserId,
        entry: &CourseListEntry,
    ) -> Result<AddOutcome, StoreError>;

    async fn remove_entry(
        &self,
        user_id: &UserId,
        entry: &CourseListEntry,
    ) -> Result<RemoveOutcome, StoreError>;
}

#[derive(Default)]
pub struct InMemoryUserStore {
    lists: RwLock<HashMap<String, UserCourseList>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.lists.read().await.len()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn ensure_user(&self, user_id: &UserId) -> Result<UserBootstrap, StoreError> {
        let mut lists = self.lists.write().await;
        if lists.contains_key(&user_id.0) {
            return Ok(UserBootstrap::AlreadyExists);
        }
        lists.insert(user_id.0.clone(), UserCourseList::initialized());
        Ok(UserBootstrap::Created)
    }

    async fn get_list(&self, user_id: &UserId) -> Result<Vec<CourseListEntry>, StoreError> {
        let lists = self.lists.read().await;
        Ok(lists.get(&user_id.0).map(UserCourseList::entries).unwrap_or_default())
    }

    async fn add_entry(
        &self,
        user_id: &UserId,
        entry: &CourseListEntry,
    ) -> Result<AddOutcome, StoreError> {
        let mut lists = self.lists.write().await;
        let list = lists.entry(user_id.0.clone()).or_default();
        Ok(list.add(entry.clone()))
    }

    async fn remove_entry(
        &self,
        user_id: &UserId,
        entry: &CourseListEntry,
    ) -> Result<RemoveOutcome, StoreError> {
        let mut lists = self.lists.write().await;
        Ok(match lists.get_mut(&user_id.0) {
            Some(list) => list.remove(entry),
            None => RemoveOutcome::NotPresent,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::user::{AddOutcome, CourseListEntry, RemoveOutcome, UserBootstrap, UserId};
    use crate::store::{InMemoryUserStore, UserStore};

    fn user(id: &str) -> UserId {
        UserId(id.to_owned())
    }

    #[tokio::test]
    async fn ensure_user_is_idempotent() {
        let store = InMemoryUserStore::new();
        let u1 = user("u1");

        assert_eq!(store.ensure_user(&u1).await.expect("ensure"), UserBootstrap::Created);
        store.add_entry(&u1, &CourseListEntry::new("344")).await.expect("add");
        assert_eq!(store.ensure_user(&u1).await.expect("ensure"), UserBootstrap::AlreadyExists);

        assert_eq!(store.get_list(&u1).await.expect("list"), vec![CourseListEntry::new("344")]);
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn add_twice_stores_entry_once() {
        let store = InMemoryUserStore::new();
        let u1 = user("u1");
        let entry = CourseListEntry::new("344");
        store.ensure_user(&u1).await.expect("ensure");

        assert_eq!(store.add_entry(&u1, &entry).await.expect("add"), AddOutcome::Added);
        assert_eq!(store.add_entry(&u1, &entry).await.expect("add"), AddOutcome::AlreadyPresent);
        assert_eq!(store.get_list(&u1).await.expect("list"), vec![entry]);
    }

    #[tokio::test]
    async fn add_then_remove_leaves_list_without_entry() {
        let store = InMemoryUserStore::new();
        let u1 = user("u1");
        let entry = CourseListEntry::new("344");
        store.ensure_user(&u1).await.expect("ensure");
        store.add_entry(&u1, &entry).await.expect("add");

        assert_eq!(store.remove_entry(&u1, &entry).await.expect("remove"), RemoveOutcome::Removed);
        assert_eq!(
            store.remove_entry(&u1, &entry).await.expect("remove"),
            RemoveOutcome::NotPresent
        );
        assert!(store.get_list(&u1).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn unknown_user_reads_as_empty() {
        let store = InMemoryUserStore::new();
        assert!(store.get_list(&user("ghost")).await.expect("list").is_empty());
        assert_eq!(
            store.remove_entry(&user("ghost"), &CourseListEntry::new("1")).await.expect("remove"),
            RemoveOutcome::NotPresent
        );
    }
}
