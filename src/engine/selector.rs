use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::QuizEngine;
use crate::error::Result;
use crate::models::{QuestionFilter, QuizMode, Selection};

impl QuizEngine {
    /// Select up to `count` question ids for the user: unseen questions first
    /// (shuffled), then seen ones least-recently-seen-first once the unseen
    /// pool is exhausted. Ids already in the user's active session are never
    /// returned. A short pool degrades to fewer ids with a warning flag.
    pub async fn select_questions(
        &self,
        user_id: &str,
        mode: QuizMode,
        count: i32,
        filter: &QuestionFilter,
    ) -> Result<Selection> {
        self.select_questions_at(user_id, mode, count, filter, Utc::now())
            .await
    }

    pub async fn select_questions_at(
        &self,
        user_id: &str,
        mode: QuizMode,
        count: i32,
        filter: &QuestionFilter,
        now: DateTime<Utc>,
    ) -> Result<Selection> {
        tracing::debug!(
            "selecting questions: mode={}, count={count}",
            mode.kind()
        );

        let exclude: HashSet<String> = match self.db.find_active_session(user_id).await? {
            Some(session) => session.question_ids.into_iter().collect(),
            None => HashSet::new(),
        };
        let pool = self.db.question_ids_by_filter(filter).await?;
        let seen = self.db.seen_questions(user_id).await?;

        Ok(pick(user_id, count, now, pool, &exclude, &seen))
    }
}

/// Pure selection over already-fetched data. Seeded by (user, start time) so
/// a given start is reproducible without being globally fixed.
pub(crate) fn pick(
    user_id: &str,
    count: i32,
    started_at: DateTime<Utc>,
    pool: Vec<String>,
    exclude: &HashSet<String>,
    seen: &HashMap<String, DateTime<Utc>>,
) -> Selection {
    let count = count.max(0) as usize;

    let mut unseen = Vec::new();
    let mut seen_ids: Vec<(String, DateTime<Utc>)> = Vec::new();
    for id in pool {
        if exclude.contains(&id) {
            continue;
        }
        match seen.get(&id) {
            None => unseen.push(id),
            Some(&at) => seen_ids.push((id, at)),
        }
    }

    let eligible = unseen.len() + seen_ids.len();

    let mut rng = StdRng::seed_from_u64(selection_seed(user_id, started_at));
    unseen.shuffle(&mut rng);
    seen_ids.sort_by_key(|&(_, at)| at);

    let mut question_ids = unseen;
    question_ids.extend(seen_ids.into_iter().map(|(id, _)| id));
    question_ids.truncate(count);

    let insufficient_pool = eligible < count;
    if insufficient_pool {
        tracing::warn!("insufficient question pool: requested {count}, eligible {eligible}");
    }

    Selection {
        question_ids,
        insufficient_pool,
    }
}

fn selection_seed(user_id: &str, started_at: DateTime<Utc>) -> u64 {
    let mut hasher = DefaultHasher::new();
    user_id.hash(&mut hasher);
    started_at.timestamp_millis().hash(&mut hasher);
    hasher.finish()
}
