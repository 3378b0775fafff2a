//! Join command - register this agent and mint its session token

use anyhow::Result;
use hive_core::{OutputFormat, SchemaEnvelope};
use serde::Serialize;

use crate::{commands::open_store, session};

/// Options for the join command
#[derive(Debug, Clone)]
pub struct JoinOptions {
    /// Worker kind, e.g. the agent binary's family
    pub category: String,
    /// Unique agent name
    pub name: String,
    /// Role tag, e.g. developer or reviewer
    pub role: String,
    /// Process id to record for liveness probing; defaults to the
    /// calling process
    pub pid: Option<i64>,
    /// Output format
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct JoinOutput {
    agent_id: i64,
    name: String,
    category: String,
    role: String,
    session_token: String,
    session_file: String,
}

/// Run the join command
pub async fn run(options: &JoinOptions) -> Result<()> {
    let (db, dir) = open_store().await?;

    let pid = options.pid.unwrap_or_else(|| i64::from(std::process::id()));
    let agent = db
        .register_agent(&options.category, &options.name, &options.role, Some(pid))
        .await?;

    let session_file = session::write_session_file(&dir, &agent.name, &agent.session_token)?;

    let output = JoinOutput {
        agent_id: agent.id,
        name: agent.name,
        category: agent.category,
        role: agent.role,
        session_token: agent.session_token,
        session_file: session_file.display().to_string(),
    };

    if options.format.is_json() {
        let envelope = SchemaEnvelope::new("join", output);
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        println!("✓ Joined as '{}' (agent {})", output.name, output.agent_id);
        println!("  Session token: {}", output.session_token);
        println!("  Session file:  {}", output.session_file);
        println!();
        println!(
            "  export {}={}",
            session::SESSION_TOKEN_ENV,
            output.session_token
        );
    }

    Ok(())
}
