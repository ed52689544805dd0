/// Workspace and user identifiers issued by the surrounding platform.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Batch job identifier.
pub type JobId = uuid::Uuid;
