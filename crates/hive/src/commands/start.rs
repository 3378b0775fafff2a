//! Start command - broadcast a start signal to registered agents
//!
//! Purely informational: it logs an `agent_started` event per targeted
//! agent. Agents still have to claim work themselves with `hive next`.

use anyhow::Result;
use hive_core::{Agent, Error, EventKind, OutputFormat, SchemaEnvelope};
use serde::Serialize;

use crate::commands::open_store;

/// Options for the start command
#[derive(Debug, Clone)]
pub struct StartOptions {
    /// Signal every registered agent
    pub all: bool,
    /// Signal one agent by name
    pub name: Option<String>,
    /// Signal every agent in a category
    pub category: Option<String>,
    /// Output format
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct StartOutput {
    signaled: usize,
    agents: Vec<Agent>,
}

/// Run the start command
pub async fn run(options: &StartOptions) -> Result<()> {
    let (db, _dir) = open_store().await?;

    let agents = db.list_agents().await?;
    if agents.is_empty() {
        return Err(Error::not_found("No agents registered; run 'hive join' first").into());
    }

    let targets: Vec<Agent> = if options.all {
        agents
    } else if let Some(name) = &options.name {
        let matched: Vec<Agent> = agents.into_iter().filter(|a| &a.name == name).collect();
        if matched.is_empty() {
            return Err(Error::not_found(format!("Agent '{name}' does not exist")).into());
        }
        matched
    } else if let Some(category) = &options.category {
        let matched: Vec<Agent> = agents
            .into_iter()
            .filter(|a| &a.category == category)
            .collect();
        if matched.is_empty() {
            return Err(
                Error::not_found(format!("No agents in category '{category}'")).into(),
            );
        }
        matched
    } else {
        return Err(Error::invalid_argument("Pass --all, --name, or --category").into());
    };

    for agent in &targets {
        db.append_event(
            EventKind::AgentStarted,
            None,
            Some(agent.id),
            Some("start signal from the coordinator"),
        )
        .await?;
    }

    let output = StartOutput {
        signaled: targets.len(),
        agents: targets,
    };

    if options.format.is_json() {
        let envelope = SchemaEnvelope::new("start", output);
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        println!("✓ Start signal sent to {} agent(s)", output.signaled);
        for agent in &output.agents {
            println!("  {} ({}/{})", agent.name, agent.category, agent.role);
        }
        println!("Agents claim work with 'hive next'");
    }

    Ok(())
}
