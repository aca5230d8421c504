/// Abandonment window: how long an active session stays resumable.
pub const SESSION_TTL_HOURS: i64 = 24;

pub const QUICK_QUESTION_COUNT: i32 = 10;
pub const TIMED_QUESTION_COUNT: i32 = 10;
pub const MIN_QUESTION_COUNT: i32 = 1;
pub const MAX_QUESTION_COUNT: i32 = 50;

/// Points for a correct answer before difficulty weighting.
pub const BASE_POINTS: f64 = 10.0;
pub const POINTS_PER_LEVEL: f64 = 100.0;

/// Weight of the just-completed session in the rolling accuracy average,
/// against a prior weight of 1.
pub const RECENT_SESSION_WEIGHT: f64 = 3.0;

/// Points factor for questions the user had already seen before this session.
pub const REPEAT_ATTEMPT_FACTOR: f64 = 0.5;
