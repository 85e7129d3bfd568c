/// All persisted entities are keyed by a BIGSERIAL surrogate id.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Step index of a script entry. `-1` is the "before the first step" sentinel.
pub type StepIndex = i32;
