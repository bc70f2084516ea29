use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::user::UserId;

const PRUNE_THRESHOLD: usize = 1024;

/// Keyed async mutexes that serialize course-list mutations per user.
/// Different users never contend.
#[derive(Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user_id: &UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            if locks.len() >= PRUNE_THRESHOLD {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks.entry(user_id.0.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub fn tracked_users(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
