use libsql::params;

use super::models::{ScoringRow, StatsRow};
use super::Db;
use crate::error::Result;
use crate::models::UserStats;

impl Db {
    /// Stored stats for the user, or zero-valued defaults before the first
    /// completed session.
    pub async fn get_user_stats(&self, user_id: &str) -> Result<UserStats> {
        let conn = self.connect()?;
        let row = conn
            .query(
                r#"
                SELECT user_id, points, level, streak, last_active_date,
                       accuracy, total_quizzes, total_questions_answered
                FROM user_stats WHERE user_id = ?
                "#,
                params![user_id],
            )
            .await?
            .next()
            .await?;

        match row {
            Some(row) => libsql::de::from_row::<StatsRow>(&row)?.into_stats(),
            None => Ok(UserStats::empty(user_id)),
        }
    }

    /// Difficulty and first-attempt flags for every question in the session,
    /// used to price a completion.
    pub(crate) async fn scoring_rows(&self, session_id: &str) -> Result<Vec<ScoringRow>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                r#"
                SELECT sq.question_id AS question_id,
                       q.difficulty AS difficulty,
                       sq.first_attempt AS first_attempt
                FROM session_questions sq
                JOIN questions q ON q.id = sq.question_id
                WHERE sq.session_id = ?
                ORDER BY sq.question_number
                "#,
                params![session_id],
            )
            .await?;

        let mut scoring = Vec::new();
        while let Some(row) = rows.next().await? {
            scoring.push(libsql::de::from_row::<ScoringRow>(&row)?);
        }
        Ok(scoring)
    }

    /// Write the recomputed stats atomically, gated on the session's
    /// `stats_applied` flag so application is exactly-once. Returns false when
    /// the session's stats were already applied and nothing was written.
    pub(crate) async fn apply_session_stats(
        &self,
        session_id: &str,
        stats: &UserStats,
    ) -> Result<bool> {
        let conn = self.connect()?;
        let tx = conn.transaction().await?;

        let claimed = tx
            .execute(
                "UPDATE quiz_sessions SET stats_applied = 1 \
                 WHERE id = ? AND stats_applied = 0",
                params![session_id],
            )
            .await?;
        if claimed == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.execute(
            r#"
            INSERT INTO user_stats
                (user_id, points, level, streak, last_active_date, accuracy,
                 total_quizzes, total_questions_answered)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                points = excluded.points,
                level = excluded.level,
                streak = excluded.streak,
                last_active_date = excluded.last_active_date,
                accuracy = excluded.accuracy,
                total_quizzes = excluded.total_quizzes,
                total_questions_answered = excluded.total_questions_answered
            "#,
            params![
                stats.user_id.clone(),
                stats.points,
                stats.level,
                stats.streak,
                stats.last_active_date.map(|d| d.to_string()),
                stats.accuracy,
                stats.total_quizzes,
                stats.total_questions_answered
            ],
        )
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}
