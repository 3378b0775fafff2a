//! Status command - one-screen summary of the hive

use anyhow::Result;
use hive_core::{OutputFormat, SchemaEnvelope};

use crate::commands::open_store;

/// Options for the status command
#[derive(Debug, Clone)]
pub struct StatusOptions {
    pub format: OutputFormat,
}

/// Run the status command
pub async fn run(options: &StatusOptions) -> Result<()> {
    let (db, _dir) = open_store().await?;
    let summary = db.summary().await?;

    if options.format.is_json() {
        let envelope = SchemaEnvelope::new("status", summary);
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        println!(
            "Agents: {} ({} working, {} waiting)",
            summary.agents_total, summary.agents_working, summary.agents_waiting
        );
        println!(
            "Tasks:  {} pending, {} in progress, {} done",
            summary.tasks_pending, summary.tasks_in_progress, summary.tasks_done
        );
        println!("Locks:  {} held", summary.locks_held);
    }

    Ok(())
}
