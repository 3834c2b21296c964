use std::sync::{Mutex, MutexGuard};

use automa_core::types::{JobId, ScriptId};
use chrono::{DateTime, Utc};
use rusqlite::{
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
    Connection, ErrorCode, OptionalExtension, ToSql,
};
use tracing::{debug, info, instrument};

use crate::{
    db::init_db,
    error::{Result, StoreError},
    types::{Job, JobStatus, Script},
};

/// Durable record of jobs and scripts.
///
/// Implementations must make each individual call atomic; nothing here spans
/// calls, so callers that read-modify-write must re-read before writing.
pub trait JobStore: Send + Sync {
    /// Point lookup; `Ok(None)` when no such job exists.
    fn get_job(&self, id: JobId) -> Result<Option<Job>>;

    /// Upsert. Assigns an id on first save and returns the stored record.
    fn save_job(&self, job: &Job) -> Result<Job>;

    /// Point lookup; `Ok(None)` when no such script exists.
    fn get_script(&self, id: ScriptId) -> Result<Option<Script>>;

    /// Upsert. Assigns an id on first save and returns the stored record.
    fn save_script(&self, script: &Script) -> Result<Script>;

    fn list_jobs(&self) -> Result<Vec<Job>>;

    fn list_jobs_with_status(&self, status: JobStatus) -> Result<Vec<Job>>;

    fn list_scripts(&self) -> Result<Vec<Script>>;

    /// Returns `NotFound` if no row was deleted.
    fn delete_job(&self, id: JobId) -> Result<()>;

    /// Returns `NotFound` if no row was deleted. Jobs referencing the script
    /// are left untouched.
    fn delete_script(&self, id: ScriptId) -> Result<()>;
}

const JOB_COLUMNS: &str = "id, script_id, schedule, status, last_run_at, last_exit_code,
                           last_error, created_at, updated_at";

/// SQLite-backed [`JobStore`].
///
/// Wraps a single connection in a `Mutex`; every method holds the lock for
/// exactly one statement.
pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap an open connection, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Poisoning is ignored: a panic mid-statement leaves SQLite consistent.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn query_jobs(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Job>> {
        let db = self.conn();
        let mut stmt = db.prepare(sql)?;
        let jobs = stmt
            .query_map(params, row_to_job)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }
}

impl JobStore for SqliteStore {
    #[instrument(skip(self))]
    fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        let db = self.conn();
        let job = db
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                [id],
                row_to_job,
            )
            .optional()?;
        Ok(job)
    }

    #[instrument(skip(self, job), fields(job_id = ?job.id, status = %job.status))]
    fn save_job(&self, job: &Job) -> Result<Job> {
        let now = Utc::now();
        let db = self.conn();
        db.execute(
            "INSERT INTO jobs
             (id, script_id, schedule, status, last_run_at, last_exit_code,
              last_error, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)
             ON CONFLICT(id) DO UPDATE SET
                script_id      = excluded.script_id,
                schedule       = excluded.schedule,
                status         = excluded.status,
                last_run_at    = excluded.last_run_at,
                last_exit_code = excluded.last_exit_code,
                last_error     = excluded.last_error,
                updated_at     = excluded.updated_at",
            rusqlite::params![
                job.id,
                job.script_id,
                job.schedule,
                job.status,
                job.last_run_at.map(|t| t.to_rfc3339()),
                job.last_exit_code,
                job.last_error,
                job.created_at.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;
        let id = job.id.unwrap_or_else(|| db.last_insert_rowid());
        if job.id.is_none() {
            info!(job_id = id, "job created");
        } else {
            debug!(job_id = id, "job saved");
        }
        Ok(Job {
            id: Some(id),
            updated_at: now,
            ..job.clone()
        })
    }

    #[instrument(skip(self))]
    fn get_script(&self, id: ScriptId) -> Result<Option<Script>> {
        let db = self.conn();
        let script = db
            .query_row(
                "SELECT id, name, path, description FROM scripts WHERE id = ?1",
                [id],
                row_to_script,
            )
            .optional()?;
        Ok(script)
    }

    #[instrument(skip(self, script), fields(name = %script.name))]
    fn save_script(&self, script: &Script) -> Result<Script> {
        let db = self.conn();
        let outcome = db.execute(
            "INSERT INTO scripts (id, name, path, description)
             VALUES (?1,?2,?3,?4)
             ON CONFLICT(id) DO UPDATE SET
                name        = excluded.name,
                path        = excluded.path,
                description = excluded.description",
            rusqlite::params![script.id, script.name, script.path, script.description],
        );
        match outcome {
            Ok(_) => {}
            // The only other constraint on the table is UNIQUE(name).
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::DuplicateScriptName(script.name.clone()));
            }
            Err(e) => return Err(e.into()),
        }
        let id = script.id.unwrap_or_else(|| db.last_insert_rowid());
        info!(script_id = id, name = %script.name, "script saved");
        Ok(Script {
            id: Some(id),
            ..script.clone()
        })
    }

    fn list_jobs(&self) -> Result<Vec<Job>> {
        self.query_jobs(&format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY id"), [])
    }

    fn list_jobs_with_status(&self, status: JobStatus) -> Result<Vec<Job>> {
        self.query_jobs(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE status = ?1 ORDER BY id"),
            [status],
        )
    }

    fn list_scripts(&self) -> Result<Vec<Script>> {
        let db = self.conn();
        let mut stmt = db.prepare("SELECT id, name, path, description FROM scripts ORDER BY id")?;
        let scripts = stmt
            .query_map([], row_to_script)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(scripts)
    }

    #[instrument(skip(self))]
    fn delete_job(&self, id: JobId) -> Result<()> {
        let n = self.conn().execute("DELETE FROM jobs WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(StoreError::NotFound { entity: "Job", id });
        }
        info!(job_id = id, "job deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    fn delete_script(&self, id: ScriptId) -> Result<()> {
        let n = self.conn().execute("DELETE FROM scripts WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(StoreError::NotFound {
                entity: "Script",
                id,
            });
        }
        info!(script_id = id, "script deleted");
        Ok(())
    }
}

impl ToSql for JobStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for JobStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// Map a SELECT row (column order from `JOB_COLUMNS`) to a `Job`.
fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    let last_run_at = match row.get::<_, Option<String>>(4)? {
        Some(s) => Some(parse_timestamp(4, &s)?),
        None => None,
    };
    Ok(Job {
        id: row.get(0)?,
        script_id: row.get(1)?,
        schedule: row.get(2)?,
        status: row.get(3)?,
        last_run_at,
        last_exit_code: row.get(5)?,
        last_error: row.get(6)?,
        created_at: parse_timestamp(7, &row.get::<_, String>(7)?)?,
        updated_at: parse_timestamp(8, &row.get::<_, String>(8)?)?,
    })
}

fn row_to_script(row: &rusqlite::Row<'_>) -> rusqlite::Result<Script> {
    Ok(Script {
        id: row.get(0)?,
        name: row.get(1)?,
        path: row.get(2)?,
        description: row.get(3)?,
    })
}

fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
