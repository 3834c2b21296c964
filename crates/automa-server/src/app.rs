use std::sync::Arc;

use automa_core::AutomaConfig;
use automa_scheduler::{JobExecutor, Scheduler};
use automa_store::{JobStore, SqliteStore};
use tracing::info;

/// Everything a command needs, wired from one config.
pub struct App {
    pub store: Arc<dyn JobStore>,
    pub scheduler: Scheduler,
}

impl App {
    pub fn build(config: &AutomaConfig) -> anyhow::Result<Self> {
        let db_path = &config.database.path;
        config.database.ensure_parent_dir()?;
        info!(path = %db_path, "opening SQLite database");

        let db = rusqlite::Connection::open(db_path)?;
        db.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store: Arc<dyn JobStore> = Arc::new(SqliteStore::new(db)?);

        let sandbox = automa_sandbox::build_runner(&config.sandbox);
        info!(mode = ?config.sandbox.mode, "sandbox runner ready");

        let executor = Arc::new(JobExecutor::new(Arc::clone(&store), sandbox));
        let scheduler = Scheduler::new(executor, config.scheduler.clone());

        Ok(Self { store, scheduler })
    }

    /// Build against an already-open connection (in-memory databases in tests).
    #[cfg(test)]
    pub fn with_connection(config: &AutomaConfig, db: rusqlite::Connection) -> anyhow::Result<Self> {
        let store: Arc<dyn JobStore> = Arc::new(SqliteStore::new(db)?);
        let executor = Arc::new(JobExecutor::new(
            Arc::clone(&store),
            automa_sandbox::build_runner(&config.sandbox),
        ));
        let scheduler = Scheduler::new(executor, config.scheduler.clone());
        Ok(Self { store, scheduler })
    }
}
