use rusqlite::Connection;

use crate::error::Result;

/// Initialise the `scripts` and `jobs` tables.
///
/// Safe to call on every startup (`IF NOT EXISTS` throughout).
/// `jobs.script_id` has no foreign key; deleting a script leaves the jobs
/// that reference it in place.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS scripts (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT    NOT NULL UNIQUE,
            path        TEXT    NOT NULL,
            description TEXT
        );

        CREATE TABLE IF NOT EXISTS jobs (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            script_id       INTEGER,            -- may dangle after script deletion
            schedule        TEXT,               -- requested run time, RFC 3339
            status          TEXT    NOT NULL DEFAULT 'pending',
            last_run_at     TEXT,               -- RFC 3339 or NULL
            last_exit_code  INTEGER,
            last_error      TEXT,
            created_at      TEXT    NOT NULL,
            updated_at      TEXT    NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs (status);
        ",
    )?;
    Ok(())
}
