//! Session identity resolution.
//!
//! An agent proves who it is with the session token minted at `join`.
//! The token travels either through the `HIVE_SESSION` environment
//! variable or through a `.hive_session_<name>` file written next to the
//! store, so shell-script agents survive losing their environment.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use hive_core::{Error, Result};

use crate::db::HiveDb;

/// Environment variable carrying the session token directly
pub const SESSION_TOKEN_ENV: &str = "HIVE_SESSION";

/// Environment variable naming the agent whose session file to read
pub const AGENT_NAME_ENV: &str = "HIVE_AGENT";

/// Path of the session file for `name`, next to the store
pub fn session_file_path(db_dir: &Path, name: &str) -> PathBuf {
    db_dir.join(format!(".hive_session_{name}"))
}

/// Persist a freshly minted token so later invocations can find it
pub fn write_session_file(db_dir: &Path, name: &str, token: &str) -> Result<PathBuf> {
    let path = session_file_path(db_dir, name);
    fs::write(&path, token)
        .map_err(|e| Error::io_error(format!("Failed to write session file: {e}")))?;
    Ok(path)
}

/// Resolve the caller's session token
///
/// Order: `HIVE_SESSION` env var, then the session file named by
/// `name_arg` or the `HIVE_AGENT` env var.
///
/// # Errors
///
/// Returns `Error::InvalidArgument` when no source names a session, and
/// `Error::NotFound` when the named session file is missing.
pub fn resolve_token(db_dir: &Path, name_arg: Option<&str>) -> Result<String> {
    if let Ok(token) = env::var(SESSION_TOKEN_ENV) {
        let token = token.trim();
        if !token.is_empty() {
            return Ok(token.to_string());
        }
    }

    let name = name_arg
        .map(str::to_string)
        .or_else(|| env::var(AGENT_NAME_ENV).ok().filter(|n| !n.trim().is_empty()))
        .ok_or_else(|| {
            Error::invalid_argument(format!(
                "No session identity: set {SESSION_TOKEN_ENV}, pass --name, or set {AGENT_NAME_ENV}"
            ))
        })?;

    let path = session_file_path(db_dir, &name);
    let token = fs::read_to_string(&path).map_err(|_| {
        Error::not_found(format!(
            "No session file for agent '{name}' at {}; run 'hive join' first",
            path.display()
        ))
    })?;

    let token = token.trim().to_string();
    if token.is_empty() {
        return Err(Error::parse_error(format!(
            "Session file {} is empty",
            path.display()
        )));
    }
    Ok(token)
}

/// Resolve the calling agent's registry row
///
/// # Errors
///
/// Returns `Error::NotFound` when the token no longer matches a
/// registered agent (reaped since the last call).
pub async fn current_agent(
    db: &HiveDb,
    db_dir: &Path,
    name_arg: Option<&str>,
) -> Result<hive_core::Agent> {
    let token = resolve_token(db_dir, name_arg)?;
    db.agent_by_token(&token).await?.ok_or_else(|| {
        Error::not_found("Session token does not match a registered agent; run 'hive join' again")
    })
}
