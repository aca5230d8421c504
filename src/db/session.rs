use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use libsql::params;

use super::models::{AnswerRow, SessionRow};
use super::Db;
use crate::error::{Error, Result};
use crate::models::{AnswerRecord, QuizSession};

const SESSION_COLUMNS: &str = "id, user_id, mode, time_limit_ms, question_count, \
     status, started_at, expires_at, completed_at, score";

impl Db {
    /// Insert a new session together with its ordered, immutable question set.
    /// The partial unique index on (user_id) WHERE status = 'active' rejects a
    /// second active session; callers map that onto `ActiveSessionExists`.
    pub async fn insert_session(
        &self,
        session: &QuizSession,
        first_attempts: &HashSet<String>,
    ) -> Result<()> {
        let conn = self.connect()?;
        let tx = conn.transaction().await?;

        tx.execute(
            r#"
            INSERT INTO quiz_sessions
                (id, user_id, mode, time_limit_ms, question_count, status, started_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                session.id.clone(),
                session.user_id.clone(),
                session.mode.kind(),
                session.mode.time_limit_ms(),
                session.question_ids.len() as i64,
                session.status.as_str(),
                session.started_at.to_rfc3339(),
                session.expires_at.to_rfc3339()
            ],
        )
        .await?;

        for (number, question_id) in session.question_ids.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO session_questions
                    (session_id, question_id, question_number, first_attempt)
                VALUES (?, ?, ?, ?)
                "#,
                params![
                    session.id.clone(),
                    question_id.clone(),
                    number as i64,
                    first_attempts.contains(question_id) as i64
                ],
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            "session created: session_id={}, mode={}, questions={}",
            session.id,
            session.mode.kind(),
            session.question_ids.len()
        );
        Ok(())
    }

    pub async fn get_session(&self, session_id: &str) -> Result<QuizSession> {
        let conn = self.connect()?;
        let row = conn
            .query(
                &format!("SELECT {SESSION_COLUMNS} FROM quiz_sessions WHERE id = ?"),
                params![session_id],
            )
            .await?
            .next()
            .await?
            .ok_or_else(|| Error::SessionNotFound(session_id.to_owned()))?;

        let session_row = libsql::de::from_row::<SessionRow>(&row)?;
        self.hydrate(session_row).await
    }

    /// The user's single active session, if any. Expiry is the caller's
    /// concern; this returns whatever is stored as `active`.
    pub async fn find_active_session(&self, user_id: &str) -> Result<Option<QuizSession>> {
        let conn = self.connect()?;
        let row = conn
            .query(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM quiz_sessions \
                     WHERE user_id = ? AND status = 'active'"
                ),
                params![user_id],
            )
            .await?
            .next()
            .await?;

        match row {
            Some(row) => {
                let session_row = libsql::de::from_row::<SessionRow>(&row)?;
                Ok(Some(self.hydrate(session_row).await?))
            }
            None => Ok(None),
        }
    }

    async fn hydrate(&self, row: SessionRow) -> Result<QuizSession> {
        let conn = self.connect()?;

        let mut question_ids = Vec::new();
        let mut rows = conn
            .query(
                "SELECT question_id FROM session_questions \
                 WHERE session_id = ? ORDER BY question_number",
                params![row.id.clone()],
            )
            .await?;
        while let Some(r) = rows.next().await? {
            question_ids.push(r.get::<String>(0)?);
        }

        let mut answers = BTreeMap::new();
        let mut rows = conn
            .query(
                "SELECT question_id, selected_index, is_correct, time_spent_ms, answered_at \
                 FROM session_answers WHERE session_id = ?",
                params![row.id.clone()],
            )
            .await?;
        while let Some(r) = rows.next().await? {
            let (question_id, record) = libsql::de::from_row::<AnswerRow>(&r)?.into_record()?;
            answers.insert(question_id, record);
        }

        row.into_session(question_ids, answers)
    }

    /// Append-only answer record. The unique constraint on
    /// (session_id, question_id) makes the first write win under races, and
    /// the status predicate keeps a racing writer from appending to a session
    /// that just reached a terminal state.
    pub async fn insert_answer(
        &self,
        session_id: &str,
        question_id: &str,
        record: &AnswerRecord,
    ) -> Result<()> {
        let conn = self.connect()?;
        let result = conn
            .execute(
                r#"
                INSERT INTO session_answers
                    (session_id, question_id, selected_index, is_correct, time_spent_ms, answered_at)
                SELECT ?, ?, ?, ?, ?, ?
                FROM quiz_sessions WHERE id = ? AND status = 'active'
                "#,
                params![
                    session_id,
                    question_id,
                    record.selected_index,
                    record.correct as i64,
                    record.time_spent_ms,
                    record.answered_at.to_rfc3339(),
                    session_id
                ],
            )
            .await;

        match result {
            Ok(0) => Err(Error::SessionNotActive(session_id.to_owned())),
            Ok(_) => {
                tracing::info!(
                    "answer recorded for session={session_id} question={question_id} correct={}",
                    record.correct
                );
                Ok(())
            }
            Err(e) => {
                let err = Error::from(e);
                if err.is_unique_violation() {
                    Err(Error::AlreadyAnswered {
                        session_id: session_id.to_owned(),
                        question_id: question_id.to_owned(),
                    })
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Flip an active session to abandoned. Returns false when the session was
    /// no longer active, so concurrent lazy-expiry passes are idempotent.
    pub async fn mark_abandoned(&self, session_id: &str) -> Result<bool> {
        let conn = self.connect()?;
        let affected = conn
            .execute(
                "UPDATE quiz_sessions SET status = 'abandoned' \
                 WHERE id = ? AND status = 'active'",
                params![session_id],
            )
            .await?;
        if affected > 0 {
            tracing::info!("session {session_id} abandoned");
        }
        Ok(affected > 0)
    }

    /// Terminal transition to completed. Guarded on `status = 'active'` so a
    /// second completion attempt changes nothing.
    pub async fn mark_completed(
        &self,
        session_id: &str,
        completed_at: DateTime<Utc>,
        score: f64,
    ) -> Result<bool> {
        let conn = self.connect()?;
        let affected = conn
            .execute(
                "UPDATE quiz_sessions \
                 SET status = 'completed', completed_at = ?, score = ? \
                 WHERE id = ? AND status = 'active'",
                params![completed_at.to_rfc3339(), score, session_id],
            )
            .await?;
        if affected > 0 {
            tracing::info!("session {session_id} completed with score {score:.2}");
        }
        Ok(affected > 0)
    }
}
