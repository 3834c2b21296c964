//! `automa-store` — Job and Script persistence.
//!
//! The executor only needs point lookups and upserts ([`JobStore`]); the
//! listing and deletion methods exist for the composition root and tests.
//! [`SqliteStore`] is the production implementation.

pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use store::{JobStore, SqliteStore};
pub use types::{Job, JobStatus, Script};
