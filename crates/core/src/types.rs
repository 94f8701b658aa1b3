/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Zero-based position of a work unit within its job.
pub type SequenceIndex = u64;
