//! Configuration management.
//!
//! Resolves where the local database lives and loads engine settings.
//!
//! # Layout
//!
//! - **Database**: `~/.fieldsync/data/fieldsync.db`
//! - **Test database**: `~/.fieldsync/test/fieldsync.db` (when `FIELDSYNC_TEST_DB` is set)
//! - **Settings**: `~/.fieldsync/config.json`

mod settings;

pub use settings::{
    apply_env_overrides, load_settings, load_settings_from, save_settings, save_settings_to,
    settings_path, Settings,
};

use std::path::{Path, PathBuf};

/// Get the global fieldsync directory location (`~/.fieldsync/`).
#[must_use]
pub fn global_fieldsync_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".fieldsync"))
}

/// Check if test mode is enabled.
///
/// Set `FIELDSYNC_TEST_DB=1` (or any non-empty value other than `0` or
/// `false`) to redirect all database operations to an isolated database.
#[must_use]
pub fn is_test_mode() -> bool {
    std::env::var("FIELDSYNC_TEST_DB").is_ok_and(|v| is_truthy(&v))
}

fn is_truthy(value: &str) -> bool {
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

/// Get the test database path (`~/.fieldsync/test/fieldsync.db`).
#[must_use]
pub fn test_db_path() -> Option<PathBuf> {
    global_fieldsync_dir().map(|dir| dir.join("test").join("fieldsync.db"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. `explicit_path` (the `--db` flag, which also reads `FIELDSYNC_DB`)
/// 2. `FIELDSYNC_TEST_DB` → test database
/// 3. Global location: `~/.fieldsync/data/fieldsync.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if is_test_mode() {
        return test_db_path();
    }

    global_fieldsync_dir().map(|dir| dir.join("data").join("fieldsync.db"))
}

/// Get the default actor name recorded in the audit log.
///
/// Priority:
/// 1. `FIELDSYNC_ACTOR` environment variable
/// 2. System username
/// 3. "unknown"
#[must_use]
pub fn default_actor() -> String {
    if let Ok(actor) = std::env::var("FIELDSYNC_ACTOR") {
        if !actor.is_empty() {
            return actor;
        }
    }

    if let Ok(user) = std::env::var("USER") {
        if !user.is_empty() {
            return user;
        }
    }

    "unknown".to_string()
}
