//! Agents command - list the registry and reap dead members

use anyhow::Result;
use hive_core::{Agent, OutputFormat, SchemaEnvelope};
use serde::Serialize;

use crate::commands::open_store;

/// Heartbeat age after which an agent is a reaping candidate
pub const DEFAULT_MAX_AGE_SECS: i64 = 300;

/// Options for `agents list`
#[derive(Debug, Clone)]
pub struct ListAgentsOptions {
    /// Output format
    pub format: OutputFormat,
}

/// Options for `agents reap`
#[derive(Debug, Clone)]
pub struct ReapOptions {
    /// Heartbeat age in seconds before an agent counts as stale
    pub max_age_secs: i64,
    /// Also probe recorded process ids of fresh agents
    pub check_pid: bool,
    /// Remove every agent regardless of heartbeat or process state
    pub force_all: bool,
    /// Output format
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct ListAgentsOutput {
    count: usize,
    agents: Vec<Agent>,
}

#[derive(Debug, Serialize)]
struct ReapOutput {
    reaped: usize,
    agents: Vec<Agent>,
}

/// Run `agents list`
pub async fn run_list(options: &ListAgentsOptions) -> Result<()> {
    let (db, _dir) = open_store().await?;
    let agents = db.list_agents().await?;

    let output = ListAgentsOutput {
        count: agents.len(),
        agents,
    };

    if options.format.is_json() {
        let envelope = SchemaEnvelope::new("agents-list", output);
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else if output.agents.is_empty() {
        println!("No agents registered");
    } else {
        for agent in &output.agents {
            let task = agent
                .current_task_id
                .map_or_else(String::new, |id| format!(" (task #{id})"));
            println!(
                "{:>4}  {:<20} {:<10} {:<12} {}{task}",
                agent.id, agent.name, agent.category, agent.role, agent.status
            );
        }
    }

    Ok(())
}

/// Run `agents reap`
pub async fn run_reap(options: &ReapOptions) -> Result<()> {
    let (db, _dir) = open_store().await?;
    let reaped = db
        .reap_agents(options.max_age_secs, options.check_pid, options.force_all)
        .await?;

    let output = ReapOutput {
        reaped: reaped.len(),
        agents: reaped,
    };

    if options.format.is_json() {
        let envelope = SchemaEnvelope::new("agents-reap", output);
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else if output.agents.is_empty() {
        println!("No dead agents to reap");
    } else {
        for agent in &output.agents {
            println!("✓ Reaped '{}' (agent {})", agent.name, agent.id);
        }
    }

    Ok(())
}
