//! Stats aggregator: consumes a completed session and rolls the learner's
//! points, level, streak and weighted accuracy forward in one atomic write.

use chrono::{DateTime, NaiveDate, Utc};

use crate::db::Db;
use crate::error::{Error, Result};
use crate::models::{Difficulty, QuizSession, UserStats};
use crate::names;

/// Recompute and persist the user's stats for a session that just reached
/// `completed`. Returns the points earned and the written stats. Application
/// is exactly-once: a session whose stats were already applied is a no-op.
pub(crate) async fn on_session_completed(
    db: &Db,
    session: &QuizSession,
    correct: i64,
    total: i64,
    now: DateTime<Utc>,
) -> Result<(f64, UserStats)> {
    let mut points_earned = 0.0;
    for row in db.scoring_rows(&session.id).await? {
        let answered_correctly = session
            .answers
            .get(&row.question_id)
            .is_some_and(|a| a.correct);
        if !answered_correctly {
            continue;
        }
        let difficulty = Difficulty::parse(&row.difficulty)
            .ok_or_else(|| Error::Corrupt(format!("bad difficulty '{}'", row.difficulty)))?;
        let attempt_factor = if row.first_attempt != 0 {
            1.0
        } else {
            names::REPEAT_ATTEMPT_FACTOR
        };
        points_earned += names::BASE_POINTS * difficulty.multiplier() * attempt_factor;
    }

    let session_accuracy = if total > 0 {
        correct as f64 / total as f64
    } else {
        0.0
    };

    let prior = db.get_user_stats(&session.user_id).await?;
    let next = roll_forward(
        &prior,
        points_earned,
        session_accuracy,
        session.answers.len() as i64,
        now.date_naive(),
    );

    if !db.apply_session_stats(&session.id, &next).await? {
        tracing::warn!("stats already applied for session {}", session.id);
        return Ok((0.0, prior));
    }

    tracing::info!(
        "stats rolled forward: +{points_earned:.1} points, level {}, streak {}",
        next.level,
        next.streak
    );
    Ok((points_earned, next))
}

/// Pure stats roll-forward for one completed session.
pub(crate) fn roll_forward(
    prior: &UserStats,
    points_earned: f64,
    session_accuracy: f64,
    answered: i64,
    today: NaiveDate,
) -> UserStats {
    let points = prior.points + points_earned;
    let level = (points / names::POINTS_PER_LEVEL).floor() as i64 + 1;

    // EMA weighting the just-completed session 3:1 against the prior value,
    // seeded directly on the first completion
    let accuracy = if prior.total_quizzes == 0 {
        session_accuracy
    } else {
        (prior.accuracy + names::RECENT_SESSION_WEIGHT * session_accuracy)
            / (1.0 + names::RECENT_SESSION_WEIGHT)
    };

    UserStats {
        user_id: prior.user_id.clone(),
        points,
        level,
        streak: next_streak(prior.streak, prior.last_active_date, today),
        last_active_date: Some(today),
        accuracy,
        total_quizzes: prior.total_quizzes + 1,
        total_questions_answered: prior.total_questions_answered + answered,
    }
}

/// Daily streak: +1 on consecutive calendar days, unchanged within the same
/// day, reset to 1 after any gap.
pub(crate) fn next_streak(streak: i64, last_active: Option<NaiveDate>, today: NaiveDate) -> i64 {
    match last_active {
        Some(day) if day == today => streak,
        Some(day) if day.succ_opt() == Some(today) => streak + 1,
        _ => 1,
    }
}
