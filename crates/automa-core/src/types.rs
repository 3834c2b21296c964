/// Primary key of a `jobs` row (SQLite rowid).
pub type JobId = i64;

/// Primary key of a `scripts` row (SQLite rowid).
pub type ScriptId = i64;
