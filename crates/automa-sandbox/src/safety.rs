//! Script path validation, applied before anything is spawned.
//!
//! Paths are resolved against the sandbox working directory, so a `..`
//! component could walk out of it. Absolute paths are allowed: registering a
//! script is an administrator action.

use std::path::{Component, Path};

/// Check whether `path` may be handed to the process runner.
///
/// Returns `Ok(())` if acceptable, or `Err(reason)` explaining the rejection.
pub fn check_script_path(path: &str) -> Result<(), String> {
    if path.trim().is_empty() {
        return Err("path is empty".to_string());
    }
    if path.contains('\0') {
        return Err("path contains a NUL byte".to_string());
    }
    if Path::new(path)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(format!("path `{path}` escapes the working directory"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_relative_path_allowed() {
        assert!(check_script_path("scripts/dummy").is_ok());
        assert!(check_script_path("./scripts/backup.sh").is_ok());
    }

    #[test]
    fn absolute_path_allowed() {
        assert!(check_script_path("/opt/automa/scripts/report.sh").is_ok());
    }

    #[test]
    fn empty_and_blank_rejected() {
        assert!(check_script_path("").is_err());
        assert!(check_script_path("   ").is_err());
    }

    #[test]
    fn nul_byte_rejected() {
        assert!(check_script_path("scripts/a\0b").is_err());
    }

    #[test]
    fn parent_traversal_rejected() {
        let err = check_script_path("scripts/../../etc/passwd").unwrap_err();
        assert!(err.contains("escapes"));
        assert!(check_script_path("../outside.sh").is_err());
    }

    #[test]
    fn dots_inside_names_allowed() {
        assert!(check_script_path("scripts/v1..2/run.sh").is_ok());
    }
}
