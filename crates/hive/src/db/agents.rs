//! Agent registry: registration, lookup, heartbeats, and reaping.

use std::str::FromStr;

use hive_core::{Agent, AgentStatus, Error, EventKind, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{events, is_unique_violation, now_ts};

/// Register a new agent under a freshly minted session token
///
/// # Errors
///
/// Returns `Error::Conflict` when the name is already registered.
pub async fn register(
    pool: &SqlitePool,
    category: &str,
    name: &str,
    role: &str,
    pid: Option<i64>,
) -> Result<Agent> {
    if name.trim().is_empty() {
        return Err(Error::invalid_argument("agent name must not be empty"));
    }

    let token = Uuid::new_v4().to_string();
    let now = now_ts();

    let id = sqlx::query(
        "INSERT INTO agents (session_token, category, name, role, status, registered_at, last_heartbeat, pid)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&token)
    .bind(category)
    .bind(name)
    .bind(role)
    .bind(AgentStatus::Idle.to_string())
    .bind(now)
    .bind(now)
    .bind(pid)
    .execute(pool)
    .await
    .map(|result| result.last_insert_rowid())
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::conflict(format!("Agent '{name}' is already registered"))
        } else {
            Error::from(e)
        }
    })?;

    events::append(
        pool,
        EventKind::AgentRegistered,
        None,
        Some(id),
        Some(&format!("{name} ({category}/{role})")),
    )
    .await?;

    Ok(Agent {
        id,
        session_token: token,
        category: category.to_string(),
        name: name.to_string(),
        role: role.to_string(),
        status: AgentStatus::Idle,
        current_task_id: None,
        registered_at: now,
        last_heartbeat: now,
        pid,
    })
}

const AGENT_COLUMNS: &str = "id, session_token, category, name, role, status, current_task_id, \
                             registered_at, last_heartbeat, pid";

/// Look up an agent by session token
pub async fn get_by_token(pool: &SqlitePool, token: &str) -> Result<Option<Agent>> {
    sqlx::query(&format!(
        "SELECT {AGENT_COLUMNS} FROM agents WHERE session_token = ?"
    ))
    .bind(token)
    .fetch_optional(pool)
    .await?
    .map(parse_agent_row)
    .transpose()
}

/// Look up an agent by id
pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Agent>> {
    sqlx::query(&format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(parse_agent_row)
        .transpose()
}

/// Look up an agent by name
pub async fn get_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Agent>> {
    sqlx::query(&format!("SELECT {AGENT_COLUMNS} FROM agents WHERE name = ?"))
        .bind(name)
        .fetch_optional(pool)
        .await?
        .map(parse_agent_row)
        .transpose()
}

/// List all agents in registration order
pub async fn list(pool: &SqlitePool) -> Result<Vec<Agent>> {
    sqlx::query(&format!(
        "SELECT {AGENT_COLUMNS} FROM agents ORDER BY registered_at, id"
    ))
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(parse_agent_row)
    .collect()
}

/// Refresh an agent's liveness timestamp
///
/// # Errors
///
/// Returns `Error::NotFound` when the agent no longer exists (reaped).
pub async fn heartbeat(pool: &SqlitePool, agent_id: i64) -> Result<()> {
    let affected = sqlx::query("UPDATE agents SET last_heartbeat = ? WHERE id = ?")
        .bind(now_ts())
        .bind(agent_id)
        .execute(pool)
        .await?
        .rows_affected();

    if affected == 0 {
        return Err(Error::not_found(format!("Agent {agent_id} does not exist")));
    }
    Ok(())
}

/// Flip an agent's lifecycle status and current task, refreshing the heartbeat
pub(crate) async fn set_status(
    pool: &SqlitePool,
    agent_id: i64,
    status: AgentStatus,
    task_id: Option<i64>,
) -> Result<()> {
    sqlx::query("UPDATE agents SET status = ?, current_task_id = ?, last_heartbeat = ? WHERE id = ?")
        .bind(status.to_string())
        .bind(task_id)
        .bind(now_ts())
        .bind(agent_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Remove dead agents from the registry
///
/// An agent whose heartbeat is older than `max_age_secs` is dead. With
/// `check_pid` the remaining agents are probed too: one whose recorded
/// process no longer exists (or was never recorded) is dead regardless
/// of heartbeat freshness. `force_all` removes every agent. Claimed
/// tasks and held locks are left in place for a human to force-close
/// or force-release.
pub async fn reap(
    pool: &SqlitePool,
    max_age_secs: i64,
    check_pid: bool,
    force_all: bool,
) -> Result<Vec<Agent>> {
    let cutoff = now_ts() - max_age_secs;

    let candidates: Vec<Agent> = if force_all {
        list(pool).await?
    } else {
        let mut dead: Vec<Agent> = Vec::new();
        for agent in list(pool).await? {
            if agent.last_heartbeat < cutoff {
                dead.push(agent);
            } else if check_pid && !agent.pid.is_some_and(process_alive) {
                dead.push(agent);
            }
        }
        dead
    };

    let mut reaped = Vec::new();
    for agent in candidates {
        let affected = sqlx::query("DELETE FROM agents WHERE id = ?")
            .bind(agent.id)
            .execute(pool)
            .await?
            .rows_affected();

        if affected > 0 {
            events::append(
                pool,
                EventKind::AgentReaped,
                agent.current_task_id,
                Some(agent.id),
                Some(&agent.name),
            )
            .await?;
            reaped.push(agent);
        }
    }

    Ok(reaped)
}

/// Whether the given OS process still exists
#[cfg(unix)]
fn process_alive(pid: i64) -> bool {
    std::path::Path::new(&format!("/proc/{pid}")).exists()
}

/// Without procfs there is no cheap probe; treat the process as alive so
/// reaping stays conservative.
#[cfg(not(unix))]
fn process_alive(_pid: i64) -> bool {
    true
}

/// Parse a database row into an `Agent`
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn parse_agent_row(row: sqlx::sqlite::SqliteRow) -> Result<Agent> {
    let status_str: String = row.try_get("status")?;
    Ok(Agent {
        id: row.try_get("id")?,
        session_token: row.try_get("session_token")?,
        category: row.try_get("category")?,
        name: row.try_get("name")?,
        role: row.try_get("role")?,
        status: AgentStatus::from_str(&status_str)?,
        current_task_id: row.try_get("current_task_id")?,
        registered_at: row.try_get("registered_at")?,
        last_heartbeat: row.try_get("last_heartbeat")?,
        pid: row.try_get("pid")?,
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::db::HiveDb;

    async fn setup() -> Result<(HiveDb, TempDir)> {
        let dir = TempDir::new().map_err(|e| Error::io_error(e.to_string()))?;
        let db = HiveDb::create_or_open(&dir.path().join("hive.db")).await?;
        Ok((db, dir))
    }

    #[tokio::test]
    async fn test_register_returns_fresh_token() -> Result<()> {
        let (db, _dir) = setup().await?;
        let a = db.register_agent("claude", "alice", "developer", None).await?;
        let b = db.register_agent("claude", "bob", "developer", None).await?;

        assert_ne!(a.session_token, b.session_token);
        assert_eq!(a.status, AgentStatus::Idle);
        Ok(())
    }

    #[tokio::test]
    async fn test_register_duplicate_name_conflicts() -> Result<()> {
        let (db, _dir) = setup().await?;
        db.register_agent("claude", "alice", "developer", None).await?;

        let result = db.register_agent("codex", "alice", "reviewer", None).await;
        assert!(matches!(result, Err(Error::Conflict(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_register_empty_name_rejected() -> Result<()> {
        let (db, _dir) = setup().await?;
        let result = db.register_agent("claude", "   ", "developer", None).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_token_lookup_round_trip() -> Result<()> {
        let (db, _dir) = setup().await?;
        let agent = db.register_agent("claude", "alice", "developer", None).await?;

        let found = db.agent_by_token(&agent.session_token).await?;
        assert_eq!(found.map(|a| a.id), Some(agent.id));

        let missing = db.agent_by_token("no-such-token").await?;
        assert!(missing.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_heartbeat_updates_timestamp() -> Result<()> {
        let (db, _dir) = setup().await?;
        let agent = db.register_agent("claude", "alice", "developer", None).await?;

        sqlx::query("UPDATE agents SET last_heartbeat = 0 WHERE id = ?")
            .bind(agent.id)
            .execute(db.pool())
            .await?;

        db.heartbeat(agent.id).await?;
        let refreshed = db
            .agent_by_id(agent.id)
            .await?
            .ok_or_else(|| Error::not_found("agent"))?;
        assert!(refreshed.last_heartbeat > 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_heartbeat_unknown_agent_not_found() -> Result<()> {
        let (db, _dir) = setup().await?;
        let result = db.heartbeat(999).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_set_status_tracks_task_and_heartbeat() -> Result<()> {
        let (db, _dir) = setup().await?;
        let agent = db.register_agent("claude", "alice", "developer", None).await?;

        sqlx::query("UPDATE agents SET last_heartbeat = 0 WHERE id = ?")
            .bind(agent.id)
            .execute(db.pool())
            .await?;

        set_status(db.pool(), agent.id, AgentStatus::Waiting, Some(7)).await?;

        let refreshed = db
            .agent_by_id(agent.id)
            .await?
            .ok_or_else(|| Error::not_found("agent"))?;
        assert_eq!(refreshed.status, AgentStatus::Waiting);
        assert_eq!(refreshed.current_task_id, Some(7));
        assert!(refreshed.last_heartbeat > 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_reap_ignores_fresh_agents() -> Result<()> {
        let (db, _dir) = setup().await?;
        db.register_agent("claude", "alice", "developer", None).await?;

        let reaped = db.reap_agents(300, false, false).await?;
        assert!(reaped.is_empty());
        assert_eq!(db.list_agents().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_reap_removes_stale_agent() -> Result<()> {
        let (db, _dir) = setup().await?;
        let agent = db.register_agent("claude", "alice", "developer", None).await?;

        sqlx::query("UPDATE agents SET last_heartbeat = 0 WHERE id = ?")
            .bind(agent.id)
            .execute(db.pool())
            .await?;

        let reaped = db.reap_agents(300, false, false).await?;
        assert_eq!(reaped.len(), 1);
        assert!(db.list_agents().await?.is_empty());
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reap_staleness_overrides_live_process() -> Result<()> {
        let (db, _dir) = setup().await?;
        let own_pid = i64::from(std::process::id());
        let agent = db
            .register_agent("claude", "alice", "developer", Some(own_pid))
            .await?;

        sqlx::query("UPDATE agents SET last_heartbeat = 0 WHERE id = ?")
            .bind(agent.id)
            .execute(db.pool())
            .await?;

        let reaped = db.reap_agents(300, true, false).await?;
        assert_eq!(reaped.len(), 1);
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reap_pid_probe_removes_fresh_agent_without_process() -> Result<()> {
        let (db, _dir) = setup().await?;
        let own_pid = i64::from(std::process::id());
        db.register_agent("claude", "alice", "developer", Some(own_pid))
            .await?;
        // Fresh heartbeat but no recorded pid: dead under the probe
        let ghost = db.register_agent("claude", "bob", "developer", None).await?;

        let reaped = db.reap_agents(300, true, false).await?;
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].id, ghost.id);
        assert_eq!(db.list_agents().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_reap_force_all_removes_everyone() -> Result<()> {
        let (db, _dir) = setup().await?;
        let own_pid = i64::from(std::process::id());
        db.register_agent("claude", "alice", "developer", Some(own_pid))
            .await?;
        db.register_agent("claude", "bob", "developer", None).await?;

        let reaped = db.reap_agents(300, false, true).await?;
        assert_eq!(reaped.len(), 2);
        assert!(db.list_agents().await?.is_empty());
        Ok(())
    }
}
