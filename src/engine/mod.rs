//! Engine façade orchestrating selection, lifecycle and stats over the store.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::Db;
use crate::error::Result;
use crate::models::UserStats;

mod lifecycle;
mod selector;
mod stats;

#[derive(Clone)]
pub struct QuizEngine {
    db: Db,
    /// Per-user keyed locks serializing check-then-create in `start_session`.
    /// The partial unique index on active sessions is the storage backstop.
    start_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl QuizEngine {
    pub fn new(db: Db) -> Self {
        Self {
            db,
            start_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub(crate) async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.start_locks.lock().await;
        locks
            .entry(user_id.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the user's lock entry once nobody else holds a clone, so the map
    /// tracks in-flight starts rather than every user ever seen. Two strong
    /// refs mean only the map and the caller: cloning requires the map mutex,
    /// which we hold here.
    pub(crate) async fn release_user_lock(&self, user_id: &str, lock: &Arc<Mutex<()>>) {
        let mut locks = self.start_locks.lock().await;
        if Arc::strong_count(lock) == 2 {
            locks.remove(user_id);
        }
    }

    /// Stored learner stats, zero-valued before the first completed session.
    pub async fn get_user_stats(&self, user_id: &str) -> Result<UserStats> {
        self.db.get_user_stats(user_id).await
    }
}
