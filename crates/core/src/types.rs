/// Caller-supplied job identifier. Uniqueness is the caller's responsibility.
pub type JobUid = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
