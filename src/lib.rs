//! Quiz session & learning-progress engine.
//!
//! Manages the lifecycle of a single quiz attempt (start, answer, resume,
//! complete, lazy abandonment), selects questions so a learner is not shown
//! the same item again before the pool is exhausted, and maintains derived
//! learner statistics (points, level, streak, weighted accuracy).
//!
//! UI rendering, routing and authentication are external collaborators; every
//! operation takes the acting user id explicitly.

pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod names;

pub use engine::QuizEngine;
pub use error::{Error, Result};
