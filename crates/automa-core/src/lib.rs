//! `automa-core` — configuration, shared error type and id aliases used by
//! every other automa crate.

pub mod config;
pub mod error;
pub mod types;

pub use config::AutomaConfig;
pub use error::{AutomaError, Result};
pub use types::{JobId, ScriptId};
