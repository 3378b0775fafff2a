//! Done command - complete this agent's current task

use anyhow::Result;
use hive_core::{OutputFormat, SchemaEnvelope};
use serde::Serialize;

use crate::{commands::open_store, session};

/// Options for the done command
#[derive(Debug, Clone)]
pub struct DoneOptions {
    /// What got accomplished
    pub summary: String,
    /// Agent name when the token is not in the environment
    pub name: Option<String>,
    /// Output format
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct DoneOutput {
    completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_id: Option<i64>,
}

/// Run the done command
pub async fn run(options: &DoneOptions) -> Result<()> {
    let (db, dir) = open_store().await?;
    let agent = session::current_agent(&db, &dir, options.name.as_deref()).await?;

    let task_id = agent.current_task_id;
    let completed = db.complete_current(agent.id, &options.summary).await?;

    let output = DoneOutput {
        completed,
        task_id: if completed { task_id } else { None },
    };

    if options.format.is_json() {
        let envelope = SchemaEnvelope::new("done", output);
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else if let Some(task_id) = output.task_id {
        println!("✓ Completed task #{task_id}");
    } else {
        println!("No task in progress; nothing to complete");
    }

    Ok(())
}
