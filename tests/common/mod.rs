#![allow(dead_code)]

use quizcore::db::Db;
use quizcore::models::{Difficulty, NewQuestion};
use quizcore::QuizEngine;

pub async fn create_test_db() -> Db {
    use std::sync::atomic::{AtomicU32, Ordering};
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "quizcore=info".to_owned());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let path = std::env::temp_dir().join(format!("quizcore_test_{}_{}.db", std::process::id(), id));
    // Clean up leftover file from previous runs
    let _ = std::fs::remove_file(&path);
    let url = format!("file:{}", path.display());
    Db::new(url, String::new())
        .await
        .expect("failed to create test database")
}

pub async fn create_test_engine() -> QuizEngine {
    QuizEngine::new(create_test_db().await)
}

pub fn make_questions(n: usize, difficulty: Difficulty) -> Vec<NewQuestion> {
    (0..n)
        .map(|i| NewQuestion {
            question: format!("Question {}", i + 1),
            category: format!("Category {}", i % 3),
            subject_category: None,
            difficulty,
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_index: 0,
            explanation: Some(format!("Because {}", i + 1)),
            references: vec![],
        })
        .collect()
}

/// Seed the pool and return an engine over it.
pub async fn engine_with_pool(n: usize, difficulty: Difficulty) -> QuizEngine {
    let engine = create_test_engine().await;
    engine
        .db()
        .load_questions(make_questions(n, difficulty))
        .await
        .expect("failed to seed question pool");
    engine
}
