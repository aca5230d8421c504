use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::names;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            Difficulty::Easy => 1.0,
            Difficulty::Medium => 1.5,
            Difficulty::Hard => 2.0,
        }
    }
}

/// Quiz mode configuration. Closed variant so handling stays exhaustive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuizMode {
    Quick,
    Timed { limit_ms: i64 },
    Custom { count: i32 },
}

impl QuizMode {
    pub fn kind(self) -> &'static str {
        match self {
            QuizMode::Quick => "quick",
            QuizMode::Timed { .. } => "timed",
            QuizMode::Custom { .. } => "custom",
        }
    }

    pub fn question_count(self) -> i32 {
        match self {
            QuizMode::Quick => names::QUICK_QUESTION_COUNT,
            QuizMode::Timed { .. } => names::TIMED_QUESTION_COUNT,
            QuizMode::Custom { count } => {
                count.clamp(names::MIN_QUESTION_COUNT, names::MAX_QUESTION_COUNT)
            }
        }
    }

    pub fn time_limit_ms(self) -> Option<i64> {
        match self {
            QuizMode::Timed { limit_ms } => Some(limit_ms),
            QuizMode::Quick | QuizMode::Custom { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SessionStatus::Active),
            "completed" => Some(SessionStatus::Completed),
            "abandoned" => Some(SessionStatus::Abandoned),
            _ => None,
        }
    }
}

/// A published question. Immutable after load; the content pipeline owns it.
#[derive(Clone, Debug)]
pub struct Question {
    pub id: String,
    pub category: String,
    pub subject_category: Option<String>,
    pub difficulty: Difficulty,
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: i64,
    pub explanation: Option<String>,
    pub references: Vec<String>,
}

/// Import shape consumed from the content pipeline.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    pub question: String,
    pub category: String,
    pub subject_category: Option<String>,
    pub difficulty: Difficulty,
    pub options: Vec<String>,
    pub correct_index: i64,
    pub explanation: Option<String>,
    #[serde(default)]
    pub references: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct QuestionFilter {
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnswerRecord {
    pub selected_index: i64,
    pub correct: bool,
    pub time_spent_ms: i64,
    pub answered_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct QuizSession {
    pub id: String,
    pub user_id: String,
    pub mode: QuizMode,
    /// Ordered and fixed at creation.
    pub question_ids: Vec<String>,
    /// Append-only: keys are never overwritten once set.
    pub answers: BTreeMap<String, AnswerRecord>,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub score: Option<f64>,
}

impl QuizSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Active && now > self.expires_at
    }

    pub fn time_limit_elapsed(&self, now: DateTime<Utc>) -> bool {
        match self.mode.time_limit_ms() {
            Some(limit_ms) => now >= self.started_at + chrono::Duration::milliseconds(limit_ms),
            None => false,
        }
    }

    pub fn correct_count(&self) -> usize {
        self.answers.values().filter(|a| a.correct).count()
    }

    /// Answered question ids in question order.
    pub fn answered_ids(&self) -> Vec<String> {
        self.question_ids
            .iter()
            .filter(|id| self.answers.contains_key(*id))
            .cloned()
            .collect()
    }

    /// Unanswered question ids in question order.
    pub fn unanswered_ids(&self) -> Vec<String> {
        self.question_ids
            .iter()
            .filter(|id| !self.answers.contains_key(*id))
            .cloned()
            .collect()
    }
}

/// A resumed session, partitioned so the caller can continue from the first
/// unanswered question.
#[derive(Clone, Debug)]
pub struct ResumedSession {
    pub session: QuizSession,
    pub answered: Vec<String>,
    pub unanswered: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UserStats {
    pub user_id: String,
    pub points: f64,
    pub level: i64,
    pub streak: i64,
    pub last_active_date: Option<NaiveDate>,
    pub accuracy: f64,
    pub total_quizzes: i64,
    pub total_questions_answered: i64,
}

impl UserStats {
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_owned(),
            points: 0.0,
            level: 1,
            streak: 0,
            last_active_date: None,
            accuracy: 0.0,
            total_quizzes: 0,
            total_questions_answered: 0,
        }
    }
}

/// Selector output. A short pool degrades to fewer questions with a warning
/// flag rather than failing.
#[derive(Clone, Debug)]
pub struct Selection {
    pub question_ids: Vec<String>,
    pub insufficient_pool: bool,
}

/// A freshly started session together with any selection warning.
#[derive(Clone, Debug)]
pub struct StartedSession {
    pub session: QuizSession,
    pub insufficient_pool: bool,
}

/// Graded outcome of a single answer submission.
#[derive(Clone, Debug)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub correct_index: i64,
    pub explanation: Option<String>,
}

/// Result of completing a session. `stats` is `None` when stat application
/// failed and was downgraded to a reconciliation warning.
#[derive(Clone, Debug)]
pub struct CompletionSummary {
    pub session_id: String,
    pub score: f64,
    pub correct: i64,
    pub total: i64,
    pub points_earned: f64,
    pub stats: Option<UserStats>,
}
