//! Command implementations.
//!
//! Each command follows the same shape: an `Options` struct filled by
//! the CLI layer, a serializable `Output` struct, and a `run` function
//! that talks to the store and renders either JSON (wrapped in a
//! `SchemaEnvelope`) or human text.

pub mod agents;
pub mod done;
pub mod init;
pub mod join;
pub mod lock;
pub mod logs;
pub mod next;
pub mod start;
pub mod status;
pub mod task;

use std::path::PathBuf;

use hive_core::Result;

use crate::db::{find_db_path, HiveDb};

/// Open the store discovered from the working directory, returning it
/// together with the directory that holds it (where session files live)
pub(crate) async fn open_store() -> Result<(HiveDb, PathBuf)> {
    let path = find_db_path()?;
    let dir = path
        .parent()
        .map_or_else(|| PathBuf::from("."), std::path::Path::to_path_buf);
    let db = HiveDb::open(&path).await?;
    Ok((db, dir))
}
