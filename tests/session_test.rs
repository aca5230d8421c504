mod common;

use chrono::{Duration, TimeZone, Utc};
use common::engine_with_pool;
use quizcore::models::{AnswerRecord, Difficulty, QuestionFilter, QuizMode, SessionStatus};
use quizcore::{Error, QuizEngine};

const USER: &str = "user-a";

async fn answer_all_correct(engine: &QuizEngine, session_id: &str, question_ids: &[String]) {
    for qid in question_ids {
        engine
            .submit_answer(USER, session_id, qid, 0, 1_000)
            .await
            .expect("answer should be accepted");
    }
}

#[tokio::test]
async fn test_migrations_applied() {
    let db = common::create_test_db().await;
    assert!(db.migration_applied("V1").await.unwrap());
    assert!(db.migration_applied("V2").await.unwrap());
    assert!(db.migration_applied("V3").await.unwrap());
}

#[tokio::test]
async fn test_start_creates_active_session() {
    let engine = engine_with_pool(12, Difficulty::Easy).await;

    let started = engine
        .start_session(USER, QuizMode::Quick, &QuestionFilter::default())
        .await
        .unwrap();

    assert_eq!(started.session.status, SessionStatus::Active);
    assert_eq!(started.session.question_ids.len(), 10);
    assert!(!started.insufficient_pool);
    assert_eq!(
        started.session.expires_at,
        started.session.started_at + Duration::hours(24)
    );

    let stored = engine.db().get_session(&started.session.id).await.unwrap();
    assert_eq!(stored.status, SessionStatus::Active);
    assert_eq!(stored.question_ids, started.session.question_ids);
}

#[tokio::test]
async fn test_start_twice_fails_with_existing_session_id() {
    let engine = engine_with_pool(12, Difficulty::Easy).await;

    let first = engine
        .start_session(USER, QuizMode::Quick, &QuestionFilter::default())
        .await
        .unwrap();

    let err = engine
        .start_session(USER, QuizMode::Quick, &QuestionFilter::default())
        .await
        .unwrap_err();

    match err {
        Error::ActiveSessionExists { session_id } => assert_eq!(session_id, first.session.id),
        other => panic!("expected ActiveSessionExists, got {other:?}"),
    }
}

#[tokio::test]
async fn test_concurrent_starts_create_exactly_one_session() {
    let engine = engine_with_pool(12, Difficulty::Easy).await;
    let other = engine.clone();

    let filter = QuestionFilter::default();
    let (a, b) = tokio::join!(
        engine.start_session(USER, QuizMode::Quick, &filter),
        other.start_session(USER, QuizMode::Quick, &filter),
    );

    let (winner, loser) = match (a, b) {
        (Ok(w), Err(l)) => (w, l),
        (Err(l), Ok(w)) => (w, l),
        (Ok(_), Ok(_)) => panic!("both concurrent starts succeeded"),
        (Err(e1), Err(e2)) => panic!("both concurrent starts failed: {e1:?} / {e2:?}"),
    };

    match loser {
        Error::ActiveSessionExists { session_id } => assert_eq!(session_id, winner.session.id),
        other => panic!("expected ActiveSessionExists, got {other:?}"),
    }
}

#[tokio::test]
async fn test_submit_answer_grades_and_records() {
    let engine = engine_with_pool(12, Difficulty::Easy).await;
    let started = engine
        .start_session(USER, QuizMode::Quick, &QuestionFilter::default())
        .await
        .unwrap();
    let qid = &started.session.question_ids[0];

    let outcome = engine
        .submit_answer(USER, &started.session.id, qid, 0, 2_500)
        .await
        .unwrap();
    assert!(outcome.correct);
    assert_eq!(outcome.correct_index, 0);

    let resumed = engine.resume_session(USER, &started.session.id).await.unwrap();
    assert_eq!(resumed.answered, vec![qid.clone()]);
    assert_eq!(resumed.unanswered.len(), 9);
    let record = &resumed.session.answers[qid];
    assert!(record.correct);
    assert_eq!(record.time_spent_ms, 2_500);
}

#[tokio::test]
async fn test_submit_answer_outside_session_rejected() {
    let engine = engine_with_pool(12, Difficulty::Easy).await;
    let started = engine
        .start_session(USER, QuizMode::Quick, &QuestionFilter::default())
        .await
        .unwrap();

    // 12 in the pool, 10 in the session: find one outside it
    let pool = engine
        .db()
        .question_ids_by_filter(&QuestionFilter::default())
        .await
        .unwrap();
    let outside = pool
        .iter()
        .find(|&id| !started.session.question_ids.contains(id))
        .expect("pool should have a question outside the session");

    let err = engine
        .submit_answer(USER, &started.session.id, outside, 0, 1_000)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::QuestionNotInSession { .. }));
}

#[tokio::test]
async fn test_repeat_submission_leaves_first_answer_unchanged() {
    let engine = engine_with_pool(12, Difficulty::Easy).await;
    let started = engine
        .start_session(USER, QuizMode::Quick, &QuestionFilter::default())
        .await
        .unwrap();
    let qid = &started.session.question_ids[0];

    // first answer: wrong option
    engine
        .submit_answer(USER, &started.session.id, qid, 1, 1_000)
        .await
        .unwrap();

    // second answer with a different option must be rejected
    let err = engine
        .submit_answer(USER, &started.session.id, qid, 0, 1_000)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyAnswered { .. }));

    let resumed = engine.resume_session(USER, &started.session.id).await.unwrap();
    let record = &resumed.session.answers[qid];
    assert_eq!(record.selected_index, 1);
    assert!(!record.correct);
}

#[tokio::test]
async fn test_invalid_option_index_rejected() {
    let engine = engine_with_pool(12, Difficulty::Easy).await;
    let started = engine
        .start_session(USER, QuizMode::Quick, &QuestionFilter::default())
        .await
        .unwrap();
    let qid = &started.session.question_ids[0];

    let err = engine
        .submit_answer(USER, &started.session.id, qid, 99, 1_000)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidOption { .. }));
}

#[tokio::test]
async fn test_resume_round_trip() {
    let engine = engine_with_pool(12, Difficulty::Easy).await;
    let started = engine
        .start_session(USER, QuizMode::Quick, &QuestionFilter::default())
        .await
        .unwrap();

    for qid in &started.session.question_ids[..3] {
        engine
            .submit_answer(USER, &started.session.id, qid, 0, 1_000)
            .await
            .unwrap();
    }

    let resumed = engine.resume_session(USER, &started.session.id).await.unwrap();
    assert_eq!(resumed.session.question_ids, started.session.question_ids);
    assert_eq!(resumed.answered, started.session.question_ids[..3].to_vec());
    assert_eq!(
        resumed.unanswered,
        started.session.question_ids[3..].to_vec()
    );

    // resuming again returns the same recorded answers
    let again = engine.resume_session(USER, &started.session.id).await.unwrap();
    assert_eq!(again.session.answers, resumed.session.answers);
}

#[tokio::test]
async fn test_resume_expired_session_becomes_abandoned() {
    let engine = engine_with_pool(12, Difficulty::Easy).await;
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

    let started = engine
        .start_session_at(USER, QuizMode::Quick, &QuestionFilter::default(), now)
        .await
        .unwrap();

    let later = now + Duration::hours(25);
    let err = engine
        .resume_session_at(USER, &started.session.id, later)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SessionExpired { .. }));

    // observably abandoned afterwards
    let stored = engine.db().get_session(&started.session.id).await.unwrap();
    assert_eq!(stored.status, SessionStatus::Abandoned);

    // and the user can start a fresh session
    let fresh = engine
        .start_session_at(USER, QuizMode::Quick, &QuestionFilter::default(), later)
        .await
        .unwrap();
    assert_ne!(fresh.session.id, started.session.id);
}

#[tokio::test]
async fn test_start_expires_stale_active_session_lazily() {
    let engine = engine_with_pool(12, Difficulty::Easy).await;
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

    let stale = engine
        .start_session_at(USER, QuizMode::Quick, &QuestionFilter::default(), now)
        .await
        .unwrap();

    // no resume in between: the expired session is flipped on the next start
    let fresh = engine
        .start_session_at(
            USER,
            QuizMode::Quick,
            &QuestionFilter::default(),
            now + Duration::hours(25),
        )
        .await
        .unwrap();
    assert_ne!(fresh.session.id, stale.session.id);

    let stored = engine.db().get_session(&stale.session.id).await.unwrap();
    assert_eq!(stored.status, SessionStatus::Abandoned);
}

#[tokio::test]
async fn test_complete_requires_all_answers() {
    let engine = engine_with_pool(12, Difficulty::Easy).await;
    let started = engine
        .start_session(USER, QuizMode::Quick, &QuestionFilter::default())
        .await
        .unwrap();

    let err = engine
        .complete_session(USER, &started.session.id)
        .await
        .unwrap_err();
    match err {
        Error::UnansweredQuestions { remaining, .. } => assert_eq!(remaining, 10),
        other => panic!("expected UnansweredQuestions, got {other:?}"),
    }
}

#[tokio::test]
async fn test_complete_scores_session() {
    let engine = engine_with_pool(12, Difficulty::Easy).await;
    let started = engine
        .start_session(USER, QuizMode::Quick, &QuestionFilter::default())
        .await
        .unwrap();

    for (i, qid) in started.session.question_ids.iter().enumerate() {
        // 7 correct, 3 wrong
        let selected = if i < 7 { 0 } else { 1 };
        engine
            .submit_answer(USER, &started.session.id, qid, selected, 1_000)
            .await
            .unwrap();
    }

    let summary = engine
        .complete_session(USER, &started.session.id)
        .await
        .unwrap();
    assert_eq!(summary.correct, 7);
    assert_eq!(summary.total, 10);
    assert!((summary.score - 0.7).abs() < 1e-9);

    let stored = engine.db().get_session(&started.session.id).await.unwrap();
    assert_eq!(stored.status, SessionStatus::Completed);
    assert!(stored.completed_at.is_some());
}

#[tokio::test]
async fn test_complete_twice_rejected() {
    let engine = engine_with_pool(12, Difficulty::Easy).await;
    let started = engine
        .start_session(USER, QuizMode::Quick, &QuestionFilter::default())
        .await
        .unwrap();
    answer_all_correct(&engine, &started.session.id, &started.session.question_ids).await;

    engine
        .complete_session(USER, &started.session.id)
        .await
        .unwrap();

    let err = engine
        .complete_session(USER, &started.session.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SessionNotActive(_)));
}

#[tokio::test]
async fn test_timed_autocompletion_scores_unanswered_incorrect() {
    let engine = engine_with_pool(12, Difficulty::Easy).await;
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    let mode = QuizMode::Timed { limit_ms: 60_000 };

    let started = engine
        .start_session_at(USER, mode, &QuestionFilter::default(), now)
        .await
        .unwrap();

    for qid in &started.session.question_ids[..4] {
        engine
            .submit_answer_at(USER, &started.session.id, qid, 0, 5_000, now)
            .await
            .unwrap();
    }

    // before the limit, completion with blanks is rejected
    let err = engine
        .complete_session_at(USER, &started.session.id, now + Duration::seconds(30))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnansweredQuestions { .. }));

    // past the limit, blanks score incorrect and the denominator stays 10
    let summary = engine
        .complete_session_at(USER, &started.session.id, now + Duration::seconds(61))
        .await
        .unwrap();
    assert_eq!(summary.correct, 4);
    assert_eq!(summary.total, 10);
    assert!((summary.score - 0.4).abs() < 1e-9);

    // only recorded answers count as answered
    let stats = summary.stats.expect("stats should apply");
    assert_eq!(stats.total_questions_answered, 4);
}

#[tokio::test]
async fn test_answer_write_rejected_once_session_completes() {
    let engine = engine_with_pool(12, Difficulty::Easy).await;
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    let mode = QuizMode::Timed { limit_ms: 60_000 };

    let started = engine
        .start_session_at(USER, mode, &QuestionFilter::default(), now)
        .await
        .unwrap();

    for qid in &started.session.question_ids[..4] {
        engine
            .submit_answer_at(USER, &started.session.id, qid, 0, 5_000, now)
            .await
            .unwrap();
    }

    engine
        .complete_session_at(USER, &started.session.id, now + Duration::seconds(61))
        .await
        .unwrap();

    // a write that raced past the engine's status snapshot still bounces off
    // the terminal session at the storage layer
    let late = AnswerRecord {
        selected_index: 0,
        correct: true,
        time_spent_ms: 5_000,
        answered_at: now + Duration::seconds(62),
    };
    let err = engine
        .db()
        .insert_answer(&started.session.id, &started.session.question_ids[5], &late)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SessionNotActive(_)));

    let session = engine.db().get_session(&started.session.id).await.unwrap();
    assert_eq!(session.answers.len(), 4);
}

#[tokio::test]
async fn test_abandon_session_alias_skips_stats() {
    let engine = engine_with_pool(12, Difficulty::Easy).await;
    let started = engine
        .start_session(USER, QuizMode::Quick, &QuestionFilter::default())
        .await
        .unwrap();
    let qid = &started.session.question_ids[0];
    engine
        .submit_answer(USER, &started.session.id, qid, 0, 1_000)
        .await
        .unwrap();

    engine
        .abandon_session(USER, &started.session.id)
        .await
        .unwrap();

    let stored = engine.db().get_session(&started.session.id).await.unwrap();
    assert_eq!(stored.status, SessionStatus::Abandoned);

    let stats = engine.get_user_stats(USER).await.unwrap();
    assert_eq!(stats.total_quizzes, 0);
    assert_eq!(stats.points, 0.0);

    let err = engine
        .submit_answer(USER, &started.session.id, qid, 0, 1_000)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SessionNotActive(_)));
}

#[tokio::test]
async fn test_short_pool_degrades_with_warning() {
    let engine = engine_with_pool(4, Difficulty::Easy).await;

    let started = engine
        .start_session(USER, QuizMode::Quick, &QuestionFilter::default())
        .await
        .unwrap();
    assert_eq!(started.session.question_ids.len(), 4);
    assert!(started.insufficient_pool);

    answer_all_correct(&engine, &started.session.id, &started.session.question_ids).await;
    let summary = engine
        .complete_session(USER, &started.session.id)
        .await
        .unwrap();
    assert_eq!(summary.total, 4);
}

#[tokio::test]
async fn test_other_user_cannot_access_session() {
    let engine = engine_with_pool(12, Difficulty::Easy).await;
    let started = engine
        .start_session(USER, QuizMode::Quick, &QuestionFilter::default())
        .await
        .unwrap();

    let err = engine
        .resume_session("user-b", &started.session.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotSessionOwner));

    let err = engine
        .submit_answer(
            "user-b",
            &started.session.id,
            &started.session.question_ids[0],
            0,
            1_000,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotSessionOwner));
}
