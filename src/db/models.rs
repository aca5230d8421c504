// Database row structs, deserialized with `libsql::de::from_row`.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{
    AnswerRecord, Difficulty, Question, QuizMode, QuizSession, SessionStatus, UserStats,
};

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Corrupt(format!("bad timestamp '{s}': {e}")))
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| Error::Corrupt(format!("bad date '{s}': {e}")))
}

#[derive(Deserialize)]
pub(crate) struct QuestionRow {
    pub id: String,
    pub category: String,
    pub subject_category: Option<String>,
    pub difficulty: String,
    pub question: String,
    pub options: String,
    pub correct_index: i64,
    pub explanation: Option<String>,
    pub refs: String,
}

impl QuestionRow {
    pub(crate) fn into_question(self) -> Result<Question> {
        let difficulty = Difficulty::parse(&self.difficulty)
            .ok_or_else(|| Error::Corrupt(format!("bad difficulty '{}'", self.difficulty)))?;
        Ok(Question {
            id: self.id,
            category: self.category,
            subject_category: self.subject_category,
            difficulty,
            question: self.question,
            options: serde_json::from_str(&self.options)?,
            correct_index: self.correct_index,
            explanation: self.explanation,
            references: serde_json::from_str(&self.refs)?,
        })
    }
}

#[derive(Deserialize)]
pub(crate) struct SessionRow {
    pub id: String,
    pub user_id: String,
    pub mode: String,
    pub time_limit_ms: Option<i64>,
    pub question_count: i64,
    pub status: String,
    pub started_at: String,
    pub expires_at: String,
    pub completed_at: Option<String>,
    pub score: Option<f64>,
}

impl SessionRow {
    pub(crate) fn into_session(
        self,
        question_ids: Vec<String>,
        answers: BTreeMap<String, AnswerRecord>,
    ) -> Result<QuizSession> {
        let mode = match self.mode.as_str() {
            "quick" => QuizMode::Quick,
            "timed" => QuizMode::Timed {
                limit_ms: self
                    .time_limit_ms
                    .ok_or_else(|| Error::Corrupt("timed session without limit".into()))?,
            },
            "custom" => QuizMode::Custom {
                count: self.question_count as i32,
            },
            other => return Err(Error::Corrupt(format!("bad mode '{other}'"))),
        };
        let status = SessionStatus::parse(&self.status)
            .ok_or_else(|| Error::Corrupt(format!("bad status '{}'", self.status)))?;
        Ok(QuizSession {
            id: self.id,
            user_id: self.user_id,
            mode,
            question_ids,
            answers,
            status,
            started_at: parse_ts(&self.started_at)?,
            expires_at: parse_ts(&self.expires_at)?,
            completed_at: self.completed_at.as_deref().map(parse_ts).transpose()?,
            score: self.score,
        })
    }
}

#[derive(Deserialize)]
pub(crate) struct AnswerRow {
    pub question_id: String,
    pub selected_index: i64,
    pub is_correct: i64,
    pub time_spent_ms: i64,
    pub answered_at: String,
}

impl AnswerRow {
    pub(crate) fn into_record(self) -> Result<(String, AnswerRecord)> {
        let record = AnswerRecord {
            selected_index: self.selected_index,
            correct: self.is_correct != 0,
            time_spent_ms: self.time_spent_ms,
            answered_at: parse_ts(&self.answered_at)?,
        };
        Ok((self.question_id, record))
    }
}

#[derive(Deserialize)]
pub(crate) struct StatsRow {
    pub user_id: String,
    pub points: f64,
    pub level: i64,
    pub streak: i64,
    pub last_active_date: Option<String>,
    pub accuracy: f64,
    pub total_quizzes: i64,
    pub total_questions_answered: i64,
}

impl StatsRow {
    pub(crate) fn into_stats(self) -> Result<UserStats> {
        Ok(UserStats {
            user_id: self.user_id,
            points: self.points,
            level: self.level,
            streak: self.streak,
            last_active_date: self.last_active_date.as_deref().map(parse_date).transpose()?,
            accuracy: self.accuracy,
            total_quizzes: self.total_quizzes,
            total_questions_answered: self.total_questions_answered,
        })
    }
}

/// Per-question data the aggregator needs to price a completed session.
#[derive(Deserialize)]
pub(crate) struct ScoringRow {
    pub question_id: String,
    pub difficulty: String,
    pub first_attempt: i64,
}
