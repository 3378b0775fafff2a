//! Resource locks: exclusive advisory locks keyed by normalized strings.
//!
//! Acquisition is a plain INSERT against a UNIQUE column, so exactly one
//! agent wins a contended key. Batch acquisition sorts its keys before
//! waiting on them, which keeps two agents wanting the same set from
//! deadlocking against each other.

use std::time::Duration;

use hive_core::{validation, Agent, AgentStatus, Error, EventKind, ResourceLock, Result};
use itertools::Itertools;
use serde::Serialize;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tokio::time::Instant;

use super::{agents, events, is_unique_violation, now_ts};

/// How long a batch waits on each contended key before giving up
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Delay between acquisition retries while waiting
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

const LOCK_COLUMNS: &str = "id, resource_key, locked_by, task_id, locked_at";

/// What a batch acquisition managed to take, in the order attempted
#[derive(Debug, Clone, Serialize)]
pub struct BatchAcquireOutcome {
    pub acquired: Vec<String>,
    pub failed: Vec<String>,
}

impl BatchAcquireOutcome {
    pub fn all_acquired(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Try to take one lock without waiting
///
/// Returns `false` when another holder already has the key.
pub async fn try_acquire(
    pool: &SqlitePool,
    key: &str,
    agent_id: i64,
    task_id: i64,
) -> Result<bool> {
    let key = validation::normalize_resource_key(key)?;
    try_acquire_normalized(pool, &key, agent_id, task_id).await
}

async fn try_acquire_normalized(
    pool: &SqlitePool,
    key: &str,
    agent_id: i64,
    task_id: i64,
) -> Result<bool> {
    let inserted = sqlx::query(
        "INSERT INTO resource_locks (resource_key, locked_by, task_id, locked_at) VALUES (?, ?, ?, ?)",
    )
    .bind(key)
    .bind(agent_id)
    .bind(task_id)
    .bind(now_ts())
    .execute(pool)
    .await;

    match inserted {
        Ok(_) => {
            events::append(pool, EventKind::LockAcquired, Some(task_id), Some(agent_id), Some(key))
                .await?;
            Ok(true)
        }
        Err(e) if is_unique_violation(&e) => Ok(false),
        Err(e) => Err(Error::from(e)),
    }
}

/// Acquire a batch of locks, waiting on contended keys
///
/// Keys are normalized, deduplicated, and taken in sorted order. The
/// first contention flips the agent to waiting and logs it once; the
/// agent keeps heartbeating between retries so it is not reaped while
/// parked. Each key gets its own timeout window; keys that never free up
/// land in `failed` and the rest are still attempted.
pub async fn acquire_with_wait(
    pool: &SqlitePool,
    agent: &Agent,
    task_id: i64,
    keys: &[String],
    timeout: Duration,
    poll_interval: Duration,
) -> Result<BatchAcquireOutcome> {
    let keys: Vec<String> = keys
        .iter()
        .map(|k| validation::normalize_resource_key(k))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .sorted()
        .dedup()
        .collect();

    let mut outcome = BatchAcquireOutcome {
        acquired: Vec::new(),
        failed: Vec::new(),
    };
    let mut announced_wait = false;

    for key in &keys {
        let deadline = Instant::now() + timeout;
        loop {
            if try_acquire_normalized(pool, key, agent.id, task_id).await? {
                outcome.acquired.push(key.clone());
                break;
            }

            if !announced_wait {
                agents::set_status(pool, agent.id, AgentStatus::Waiting, Some(task_id)).await?;
                events::append(
                    pool,
                    EventKind::WaitingForLock,
                    Some(task_id),
                    Some(agent.id),
                    Some(key),
                )
                .await?;
                announced_wait = true;
            }

            if Instant::now() >= deadline {
                events::append(
                    pool,
                    EventKind::Error,
                    Some(task_id),
                    Some(agent.id),
                    Some(&format!("lock wait timed out: {key}")),
                )
                .await?;
                outcome.failed.push(key.clone());
                break;
            }

            agents::heartbeat(pool, agent.id).await?;
            tokio::time::sleep(poll_interval).await;
        }
    }

    if announced_wait {
        agents::set_status(pool, agent.id, AgentStatus::Working, Some(task_id)).await?;
    }

    Ok(outcome)
}

/// Release one lock
///
/// `owner` of `None` forces release regardless of holder. Returns
/// whether a row was removed: `false` when the key is not locked or is
/// held by someone other than `owner`. One guarded DELETE, so a
/// concurrent release-and-reacquire cannot slip between a check and
/// the removal.
pub async fn release(pool: &SqlitePool, key: &str, owner: Option<i64>) -> Result<bool> {
    let key = validation::normalize_resource_key(key)?;

    let row = sqlx::query(
        "DELETE FROM resource_locks
         WHERE resource_key = ? AND (? IS NULL OR locked_by = ?)
         RETURNING locked_by, task_id",
    )
    .bind(&key)
    .bind(owner)
    .bind(owner)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(false);
    };

    let locked_by: i64 = row.try_get("locked_by")?;
    let task_id: i64 = row.try_get("task_id")?;
    events::append(
        pool,
        EventKind::LockReleased,
        Some(task_id),
        Some(locked_by),
        Some(&key),
    )
    .await?;

    Ok(true)
}

/// Drop every lock a task holds, returning the freed keys
///
/// Runs inside the caller's transaction; the caller logs the releases.
pub(crate) async fn release_all_for_task(
    conn: &mut SqliteConnection,
    task_id: i64,
) -> Result<Vec<String>> {
    let rows = sqlx::query("DELETE FROM resource_locks WHERE task_id = ? RETURNING resource_key")
        .bind(task_id)
        .fetch_all(conn)
        .await?;

    rows.into_iter()
        .map(|row| row.try_get::<String, _>("resource_key").map_err(Error::from))
        .collect()
}

/// List all held locks, sorted by key
pub async fn list(pool: &SqlitePool) -> Result<Vec<ResourceLock>> {
    sqlx::query(&format!(
        "SELECT {LOCK_COLUMNS} FROM resource_locks ORDER BY resource_key"
    ))
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(parse_lock_row)
    .collect()
}

#[allow(clippy::needless_pass_by_value)]
fn parse_lock_row(row: sqlx::sqlite::SqliteRow) -> Result<ResourceLock> {
    Ok(ResourceLock {
        id: row.try_get("id")?,
        resource_key: row.try_get("resource_key")?,
        locked_by: row.try_get("locked_by")?,
        task_id: row.try_get("task_id")?,
        locked_at: row.try_get("locked_at")?,
    })
}
