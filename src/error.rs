use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Engine error taxonomy. Session ids may appear in payloads, user ids never do.
#[derive(Debug, Error)]
pub enum Error {
    /// A non-expired active session already exists; the caller should resume it.
    #[error("an active session already exists (session {session_id})")]
    ActiveSessionExists { session_id: String },

    /// The session passed its abandonment window; the caller must start a new one.
    #[error("session {session_id} has expired")]
    SessionExpired { session_id: String },

    /// Answers are immutable once recorded; the caller should resync session state.
    #[error("question {question_id} was already answered in session {session_id}")]
    AlreadyAnswered {
        session_id: String,
        question_id: String,
    },

    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("session {0} is not active")]
    SessionNotActive(String),

    #[error("question {question_id} is not part of session {session_id}")]
    QuestionNotInSession {
        session_id: String,
        question_id: String,
    },

    #[error("selected option {selected_index} is out of range for question {question_id}")]
    InvalidOption {
        question_id: String,
        selected_index: i64,
    },

    #[error("session {session_id} still has {remaining} unanswered question(s)")]
    UnansweredQuestions {
        session_id: String,
        remaining: usize,
    },

    #[error("session does not belong to the requesting user")]
    NotSessionOwner,

    #[error("question {0} not found")]
    QuestionNotFound(String),

    #[error(transparent)]
    Db(#[from] libsql::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A stored record failed to parse back into its domain type.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<serde::de::value::Error> for Error {
    fn from(e: serde::de::value::Error) -> Self {
        Error::Corrupt(e.to_string())
    }
}

impl Error {
    /// True when a stored unique constraint rejected the write, which the
    /// lifecycle layer maps onto `ActiveSessionExists` / `AlreadyAnswered`.
    pub(crate) fn is_unique_violation(&self) -> bool {
        match self {
            Error::Db(e) => e.to_string().contains("UNIQUE constraint failed"),
            _ => false,
        }
    }
}
