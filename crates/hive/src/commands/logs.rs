//! Logs command - read the event trail

use anyhow::Result;
use chrono::{TimeZone, Utc};
use hive_core::{EventRecord, OutputFormat, SchemaEnvelope};
use serde::Serialize;

use crate::commands::open_store;

/// Default number of events shown
pub const DEFAULT_LIMIT: i64 = 20;

/// Options for the logs command
#[derive(Debug, Clone)]
pub struct LogsOptions {
    /// Maximum number of events, newest first
    pub limit: i64,
    /// Only events touching this task
    pub task_id: Option<i64>,
    /// Only events touching this agent
    pub agent_id: Option<i64>,
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct LogsOutput {
    count: usize,
    events: Vec<EventRecord>,
}

/// Run the logs command
pub async fn run(options: &LogsOptions) -> Result<()> {
    let (db, _dir) = open_store().await?;
    let events = db
        .recent_events(options.limit, options.task_id, options.agent_id)
        .await?;

    let output = LogsOutput {
        count: events.len(),
        events,
    };

    if options.format.is_json() {
        let envelope = SchemaEnvelope::new("logs", output);
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else if output.events.is_empty() {
        println!("No events recorded");
    } else {
        for event in &output.events {
            let when = Utc
                .timestamp_opt(event.created_at, 0)
                .single()
                .map_or_else(|| event.created_at.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
            let task = event
                .task_id
                .map_or_else(String::new, |id| format!(" task #{id}"));
            let agent = event
                .agent_id
                .map_or_else(String::new, |id| format!(" agent {id}"));
            let message = event
                .message
                .as_deref()
                .map_or_else(String::new, |m| format!(": {m}"));
            println!("{when}  {:<17}{task}{agent}{message}", event.kind.to_string());
        }
    }

    Ok(())
}
