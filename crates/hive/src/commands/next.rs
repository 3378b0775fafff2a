//! Next command - claim the best eligible task for this agent

use anyhow::Result;
use hive_core::{OutputFormat, SchemaEnvelope, Task};
use serde::Serialize;

use crate::{commands::open_store, session};

/// Options for the next command
#[derive(Debug, Clone)]
pub struct NextOptions {
    /// Agent name when the token is not in the environment
    pub name: Option<String>,
    /// Output format
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct NextOutput {
    claimed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    task: Option<Task>,
}

/// Run the next command
pub async fn run(options: &NextOptions) -> Result<()> {
    let (db, dir) = open_store().await?;
    let agent = session::current_agent(&db, &dir, options.name.as_deref()).await?;

    let task = db.claim_next(&agent).await?;

    let output = NextOutput {
        claimed: task.is_some(),
        task,
    };

    if options.format.is_json() {
        let envelope = SchemaEnvelope::new("next", output);
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else if let Some(task) = &output.task {
        println!("✓ Claimed task #{}: {}", task.id, task.description);
        println!("  Priority: {}", task.priority);
        if let Some(dep) = task.depends_on {
            println!("  Depended on: #{dep} (done)");
        }
    } else {
        println!("No eligible task in the queue");
    }

    Ok(())
}
