use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use ulid::Ulid;

use super::{stats, QuizEngine};
use crate::error::{Error, Result};
use crate::models::{
    AnswerOutcome, AnswerRecord, CompletionSummary, QuestionFilter, QuizMode, QuizSession,
    ResumedSession, SessionStatus, StartedSession,
};
use crate::names;

impl QuizEngine {
    pub async fn start_session(
        &self,
        user_id: &str,
        mode: QuizMode,
        filter: &QuestionFilter,
    ) -> Result<StartedSession> {
        self.start_session_at(user_id, mode, filter, Utc::now())
            .await
    }

    /// Create a new active session with a fixed question set and a 24h
    /// resumption window. Check-then-create runs under the per-user lock so a
    /// race between two starts yields exactly one session; the loser gets
    /// `ActiveSessionExists` naming it.
    pub async fn start_session_at(
        &self,
        user_id: &str,
        mode: QuizMode,
        filter: &QuestionFilter,
        now: DateTime<Utc>,
    ) -> Result<StartedSession> {
        let lock = self.user_lock(user_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.start_session_locked(user_id, mode, filter, now).await
        };
        self.release_user_lock(user_id, &lock).await;
        result
    }

    async fn start_session_locked(
        &self,
        user_id: &str,
        mode: QuizMode,
        filter: &QuestionFilter,
        now: DateTime<Utc>,
    ) -> Result<StartedSession> {
        if let Some(existing) = self.db().find_active_session(user_id).await? {
            if existing.is_expired(now) {
                // lazy abandonment on access
                self.db().mark_abandoned(&existing.id).await?;
            } else {
                return Err(Error::ActiveSessionExists {
                    session_id: existing.id,
                });
            }
        }

        let selection = self
            .select_questions_at(user_id, mode, mode.question_count(), filter, now)
            .await?;
        let seen = self.db().seen_questions(user_id).await?;
        let first_attempts: HashSet<String> = selection
            .question_ids
            .iter()
            .filter(|id| !seen.contains_key(*id))
            .cloned()
            .collect();

        let session = QuizSession {
            id: Ulid::new().to_string(),
            user_id: user_id.to_owned(),
            mode,
            question_ids: selection.question_ids,
            answers: BTreeMap::new(),
            status: SessionStatus::Active,
            started_at: now,
            expires_at: now + Duration::hours(names::SESSION_TTL_HOURS),
            completed_at: None,
            score: None,
        };

        if let Err(e) = self.db().insert_session(&session, &first_attempts).await {
            if e.is_unique_violation() {
                // another engine instance won the race past our lock
                if let Some(winner) = self.db().find_active_session(user_id).await? {
                    return Err(Error::ActiveSessionExists {
                        session_id: winner.id,
                    });
                }
            }
            return Err(e);
        }

        for question_id in &session.question_ids {
            self.db().mark_seen(user_id, question_id, now).await?;
        }

        Ok(StartedSession {
            session,
            insufficient_pool: selection.insufficient_pool,
        })
    }

    pub async fn submit_answer(
        &self,
        user_id: &str,
        session_id: &str,
        question_id: &str,
        selected_index: i64,
        time_spent_ms: i64,
    ) -> Result<AnswerOutcome> {
        self.submit_answer_at(
            user_id,
            session_id,
            question_id,
            selected_index,
            time_spent_ms,
            Utc::now(),
        )
        .await
    }

    /// Record one answer. Answers are immutable once recorded: a repeat
    /// submission fails with `AlreadyAnswered` and leaves the first intact.
    pub async fn submit_answer_at(
        &self,
        user_id: &str,
        session_id: &str,
        question_id: &str,
        selected_index: i64,
        time_spent_ms: i64,
        now: DateTime<Utc>,
    ) -> Result<AnswerOutcome> {
        let session = self.load_owned(user_id, session_id, now).await?;
        if session.status != SessionStatus::Active {
            return Err(Error::SessionNotActive(session_id.to_owned()));
        }
        if !session.question_ids.iter().any(|id| id == question_id) {
            return Err(Error::QuestionNotInSession {
                session_id: session_id.to_owned(),
                question_id: question_id.to_owned(),
            });
        }
        if session.answers.contains_key(question_id) {
            return Err(Error::AlreadyAnswered {
                session_id: session_id.to_owned(),
                question_id: question_id.to_owned(),
            });
        }

        let question = self.db().get_question(question_id).await?;
        if selected_index < 0 || selected_index >= question.options.len() as i64 {
            return Err(Error::InvalidOption {
                question_id: question_id.to_owned(),
                selected_index,
            });
        }

        let record = AnswerRecord {
            selected_index,
            correct: selected_index == question.correct_index,
            time_spent_ms,
            answered_at: now,
        };
        // unique constraint makes the first write win under concurrent submits
        self.db().insert_answer(session_id, question_id, &record).await?;
        self.db().mark_seen(user_id, question_id, now).await?;

        Ok(AnswerOutcome {
            correct: record.correct,
            correct_index: question.correct_index,
            explanation: question.explanation,
        })
    }

    pub async fn complete_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<CompletionSummary> {
        self.complete_session_at(user_id, session_id, Utc::now())
            .await
    }

    /// Terminal transition. Valid once every question is answered, or in
    /// timed mode once the limit elapsed, in which case unanswered questions
    /// score incorrect and the denominator stays the configured count. Stats
    /// apply exactly once; a stats failure is downgraded to a reconciliation
    /// warning and never rolls back completion.
    pub async fn complete_session_at(
        &self,
        user_id: &str,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CompletionSummary> {
        let session = self.load_owned(user_id, session_id, now).await?;
        if session.status != SessionStatus::Active {
            return Err(Error::SessionNotActive(session_id.to_owned()));
        }

        let remaining = session.unanswered_ids().len();
        if remaining > 0 && !session.time_limit_elapsed(now) {
            return Err(Error::UnansweredQuestions {
                session_id: session_id.to_owned(),
                remaining,
            });
        }

        let total = session.question_ids.len() as i64;
        let correct = session.correct_count() as i64;
        let score = if total > 0 {
            correct as f64 / total as f64
        } else {
            0.0
        };

        let transitioned = self.db().mark_completed(session_id, now, score).await?;
        if !transitioned {
            return Err(Error::SessionNotActive(session_id.to_owned()));
        }

        let (points_earned, stats) =
            match stats::on_session_completed(self.db(), &session, correct, total, now).await {
                Ok((points_earned, stats)) => (points_earned, Some(stats)),
                Err(e) => {
                    // the completed session remains the authoritative record;
                    // stats can be rebuilt from it by a repair pass
                    tracing::warn!("stats reconciliation failed for session {session_id}: {e}");
                    (0.0, None)
                }
            };

        Ok(CompletionSummary {
            session_id: session_id.to_owned(),
            score,
            correct,
            total,
            points_earned,
            stats,
        })
    }

    pub async fn resume_session(&self, user_id: &str, session_id: &str) -> Result<ResumedSession> {
        self.resume_session_at(user_id, session_id, Utc::now())
            .await
    }

    /// Return the session partitioned into answered/unanswered so the caller
    /// can continue from the first unanswered question. Resuming past the
    /// window fails with `SessionExpired` and leaves the session abandoned.
    pub async fn resume_session_at(
        &self,
        user_id: &str,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ResumedSession> {
        let session = self.load_owned(user_id, session_id, now).await?;
        if session.status != SessionStatus::Active {
            return Err(Error::SessionNotActive(session_id.to_owned()));
        }

        Ok(ResumedSession {
            answered: session.answered_ids(),
            unanswered: session.unanswered_ids(),
            session,
        })
    }

    /// Legacy-caller alias: explicitly abandon the caller's own active
    /// session. Same transition lazy expiry applies; stats are never touched.
    pub async fn abandon_session(&self, user_id: &str, session_id: &str) -> Result<()> {
        let session = self.db().get_session(session_id).await?;
        if session.user_id != user_id {
            return Err(Error::NotSessionOwner);
        }
        if session.status != SessionStatus::Active {
            return Err(Error::SessionNotActive(session_id.to_owned()));
        }
        self.db().mark_abandoned(session_id).await?;
        Ok(())
    }

    /// Load a session for the acting user, applying lazy expiry: any access
    /// past `expires_at` flips the session to abandoned as a side effect.
    async fn load_owned(
        &self,
        user_id: &str,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<QuizSession> {
        let session = self.db().get_session(session_id).await?;
        if session.user_id != user_id {
            return Err(Error::NotSessionOwner);
        }
        if session.is_expired(now) {
            self.db().mark_abandoned(session_id).await?;
            return Err(Error::SessionExpired {
                session_id: session_id.to_owned(),
            });
        }
        Ok(session)
    }
}
