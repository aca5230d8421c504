use std::collections::HashMap;

use chrono::{DateTime, Utc};
use libsql::params;

use super::models::parse_ts;
use super::Db;
use crate::error::Result;

impl Db {
    /// Record a delivery in the seen-question ledger. Upsert semantics: at
    /// most one row per (user, question), redelivery only bumps the timestamp.
    pub async fn mark_seen(
        &self,
        user_id: &str,
        question_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO seen_questions (user_id, question_id, last_seen_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id, question_id)
            DO UPDATE SET last_seen_at = excluded.last_seen_at
            "#,
            params![user_id, question_id, at.to_rfc3339()],
        )
        .await?;
        Ok(())
    }

    /// The user's full ledger: question id -> last delivery time.
    pub async fn seen_questions(&self, user_id: &str) -> Result<HashMap<String, DateTime<Utc>>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT question_id, last_seen_at FROM seen_questions WHERE user_id = ?",
                params![user_id],
            )
            .await?;

        let mut seen = HashMap::new();
        while let Some(row) = rows.next().await? {
            let question_id = row.get::<String>(0)?;
            let last_seen_at = parse_ts(&row.get::<String>(1)?)?;
            seen.insert(question_id, last_seen_at);
        }
        Ok(seen)
    }
}
