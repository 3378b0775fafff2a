//! Append-only event log.
//!
//! Events are observability output only; no coordination decision ever
//! reads them back.

use std::str::FromStr;

use hive_core::{EventKind, EventRecord, Result};
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::now_ts;

/// Append one event through the pool
pub async fn append(
    pool: &SqlitePool,
    kind: EventKind,
    task_id: Option<i64>,
    agent_id: Option<i64>,
    message: Option<&str>,
) -> Result<()> {
    sqlx::query("INSERT INTO events (task_id, agent_id, kind, message, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(task_id)
        .bind(agent_id)
        .bind(kind.to_string())
        .bind(message)
        .bind(now_ts())
        .execute(pool)
        .await?;
    Ok(())
}

/// Append one event inside an open transaction, so it commits or rolls
/// back together with the state change it describes
pub async fn append_tx(
    conn: &mut SqliteConnection,
    kind: EventKind,
    task_id: Option<i64>,
    agent_id: Option<i64>,
    message: Option<&str>,
) -> Result<()> {
    sqlx::query("INSERT INTO events (task_id, agent_id, kind, message, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(task_id)
        .bind(agent_id)
        .bind(kind.to_string())
        .bind(message)
        .bind(now_ts())
        .execute(conn)
        .await?;
    Ok(())
}

/// Read the newest events first, optionally filtered by task or agent
pub async fn recent(
    pool: &SqlitePool,
    limit: i64,
    task_id: Option<i64>,
    agent_id: Option<i64>,
) -> Result<Vec<EventRecord>> {
    let mut sql = String::from(
        "SELECT id, task_id, agent_id, kind, message, created_at FROM events WHERE 1=1",
    );
    if task_id.is_some() {
        sql.push_str(" AND task_id = ?");
    }
    if agent_id.is_some() {
        sql.push_str(" AND agent_id = ?");
    }
    sql.push_str(" ORDER BY id DESC LIMIT ?");

    let mut query = sqlx::query(&sql);
    if let Some(t) = task_id {
        query = query.bind(t);
    }
    if let Some(a) = agent_id {
        query = query.bind(a);
    }
    query = query.bind(limit);

    query
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(parse_event_row)
        .collect()
}

#[allow(clippy::needless_pass_by_value)]
fn parse_event_row(row: sqlx::sqlite::SqliteRow) -> Result<EventRecord> {
    let kind_str: String = row.try_get("kind")?;
    Ok(EventRecord {
        id: row.try_get("id")?,
        task_id: row.try_get("task_id")?,
        agent_id: row.try_get("agent_id")?,
        kind: EventKind::from_str(&kind_str)?,
        message: row.try_get("message")?,
        created_at: row.try_get("created_at")?,
    })
}
