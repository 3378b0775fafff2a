//! Init command - create the shared store in the working directory

use anyhow::Result;
use hive_core::{OutputFormat, SchemaEnvelope};
use serde::Serialize;

use crate::db::{HiveDb, DB_FILE_NAME};

/// Options for the init command
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Wipe an existing store and start fresh
    pub force: bool,
    /// Output format
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct InitOutput {
    initialized: bool,
    created: bool,
    path: String,
}

/// Run the init command
pub async fn run(options: &InitOptions) -> Result<()> {
    let path = std::env::current_dir()?.join(DB_FILE_NAME);
    let existed = path.exists();

    if existed && options.force {
        // WAL sidecars must go with the main file
        std::fs::remove_file(&path)?;
        for suffix in ["-wal", "-shm"] {
            let sidecar = path.with_file_name(format!("{DB_FILE_NAME}{suffix}"));
            if sidecar.exists() {
                std::fs::remove_file(&sidecar)?;
            }
        }
    }

    let _db = HiveDb::create_or_open(&path).await?;

    let output = InitOutput {
        initialized: true,
        created: !existed || options.force,
        path: path.display().to_string(),
    };

    if options.format.is_json() {
        let envelope = SchemaEnvelope::new("init", output);
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else if output.created {
        println!("✓ Initialized store at {}", output.path);
    } else {
        println!("✓ Store already exists at {}", output.path);
    }

    Ok(())
}
