//! Task queue: creation, claiming, completion, and administrative closure.
//!
//! Claiming is the contended path. The eligible-task selection and the
//! status flip happen in one guarded `UPDATE ... RETURNING` as the first
//! write of a transaction, so SQLite's single-writer rule guarantees at
//! most one agent wins each task.

use std::str::FromStr;

use hive_core::{
    validation, Agent, Error, EventKind, Result, Task, TaskFilter, TaskSpec, TaskStatus,
};
use sqlx::{Row, SqlitePool};

use super::{events, idle_agent, locks, now_ts};

const TASK_COLUMNS: &str = "id, description, priority, target_category, target_name, \
                            target_role, status, assigned_to, depends_on, summary, \
                            created_at, started_at, completed_at";

/// Enqueue a new task
///
/// # Errors
///
/// Returns `Error::InvalidArgument` for an out-of-range priority or a
/// dependency on a task that does not exist.
pub async fn create(pool: &SqlitePool, spec: &TaskSpec) -> Result<Task> {
    validation::validate_priority(spec.priority)?;

    if spec.description.trim().is_empty() {
        return Err(Error::invalid_argument("task description must not be empty"));
    }

    if let Some(dep) = spec.depends_on {
        if get(pool, dep).await?.is_none() {
            return Err(Error::invalid_argument(format!(
                "dependency task {dep} does not exist"
            )));
        }
    }

    let now = now_ts();
    let id = sqlx::query(
        "INSERT INTO tasks (description, priority, target_category, target_name, target_role, status, depends_on, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&spec.description)
    .bind(spec.priority)
    .bind(&spec.target_category)
    .bind(&spec.target_name)
    .bind(&spec.target_role)
    .bind(TaskStatus::Pending.to_string())
    .bind(spec.depends_on)
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    events::append(pool, EventKind::TaskCreated, Some(id), None, Some(&spec.description)).await?;

    Ok(Task {
        id,
        description: spec.description.clone(),
        priority: spec.priority,
        target_category: spec.target_category.clone(),
        target_name: spec.target_name.clone(),
        target_role: spec.target_role.clone(),
        status: TaskStatus::Pending,
        assigned_to: None,
        depends_on: spec.depends_on,
        summary: None,
        created_at: now,
        started_at: None,
        completed_at: None,
    })
}

/// Claim the best eligible pending task for `agent`
///
/// Eligibility: status pending, dependency (if any) done, and each
/// target field either unset or matching the agent. Best means lowest
/// priority number, then lowest id.
///
/// Returns `Ok(None)` when the queue holds nothing eligible.
///
/// # Errors
///
/// Returns `Error::InvalidState` when the agent already holds a task.
pub async fn claim_next(pool: &SqlitePool, agent: &Agent) -> Result<Option<Task>> {
    let mut tx = pool.begin().await?;

    // Re-check inside the transaction; the caller's snapshot may be stale
    let current: Option<i64> =
        sqlx::query("SELECT current_task_id FROM agents WHERE id = ?")
            .bind(agent.id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::not_found(format!("Agent {} does not exist", agent.id)))?
            .try_get("current_task_id")?;

    if let Some(task_id) = current {
        return Err(Error::invalid_state(format!(
            "Agent '{}' already holds task {task_id}; complete it first",
            agent.name
        )));
    }

    let now = now_ts();
    let row = sqlx::query(&format!(
        "UPDATE tasks SET status = 'in_progress', assigned_to = ?, started_at = ?
         WHERE id = (
             SELECT t.id FROM tasks t
             WHERE t.status = 'pending'
               AND (t.depends_on IS NULL
                    OR EXISTS (SELECT 1 FROM tasks d WHERE d.id = t.depends_on AND d.status = 'done'))
               AND (t.target_category IS NULL OR t.target_category = ?)
               AND (t.target_name IS NULL OR t.target_name = ?)
               AND (t.target_role IS NULL OR t.target_role = ?)
             ORDER BY t.priority ASC, t.id ASC
             LIMIT 1
         )
         AND status = 'pending'
         RETURNING {TASK_COLUMNS}"
    ))
    .bind(agent.id)
    .bind(now)
    .bind(&agent.category)
    .bind(&agent.name)
    .bind(&agent.role)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = row else {
        tx.commit().await?;
        return Ok(None);
    };
    let task = parse_task_row(row)?;

    sqlx::query(
        "UPDATE agents SET status = 'working', current_task_id = ?, last_heartbeat = ? WHERE id = ?",
    )
    .bind(task.id)
    .bind(now)
    .bind(agent.id)
    .execute(&mut *tx)
    .await?;

    events::append_tx(
        &mut *tx,
        EventKind::TaskStarted,
        Some(task.id),
        Some(agent.id),
        Some(&task.description),
    )
    .await?;

    tx.commit().await?;
    Ok(Some(task))
}

/// Complete the agent's current task
///
/// Marks the task done, records the summary, releases every lock the
/// task holds, and returns the agent to idle. All in one transaction.
///
/// Returns `false` when the agent holds no task.
pub async fn complete(pool: &SqlitePool, agent_id: i64, summary: &str) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let current: Option<i64> =
        sqlx::query("SELECT current_task_id FROM agents WHERE id = ?")
            .bind(agent_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::not_found(format!("Agent {agent_id} does not exist")))?
            .try_get("current_task_id")?;

    let Some(task_id) = current else {
        return Ok(false);
    };

    let affected = sqlx::query(
        "UPDATE tasks SET status = 'done', summary = ?, completed_at = ?
         WHERE id = ? AND assigned_to = ? AND status = 'in_progress'",
    )
    .bind(summary)
    .bind(now_ts())
    .bind(task_id)
    .bind(agent_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if affected == 0 {
        // Task was force-closed underneath us; just clear the agent
        idle_agent(&mut *tx, agent_id).await?;
        tx.commit().await?;
        return Ok(false);
    }

    let released = locks::release_all_for_task(&mut *tx, task_id).await?;
    for key in &released {
        events::append_tx(&mut *tx, EventKind::LockReleased, Some(task_id), Some(agent_id), Some(key))
            .await?;
    }

    idle_agent(&mut *tx, agent_id).await?;

    events::append_tx(&mut *tx, EventKind::TaskDone, Some(task_id), Some(agent_id), Some(summary))
        .await?;

    tx.commit().await?;
    Ok(true)
}

/// Administratively close a task, whoever holds it
///
/// Closing an already-done task is a no-op that preserves its original
/// summary. Otherwise the task is marked done with `reason` as summary,
/// its locks are released, and any holding agent is returned to idle.
///
/// # Errors
///
/// Returns `Error::NotFound` for an unknown task id.
pub async fn force_close(pool: &SqlitePool, task_id: i64, reason: &str) -> Result<Task> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
        .bind(task_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::not_found(format!("Task {task_id} does not exist")))?;
    let task = parse_task_row(row)?;

    if task.status == TaskStatus::Done {
        tx.commit().await?;
        return Ok(task);
    }

    let now = now_ts();
    sqlx::query("UPDATE tasks SET status = 'done', summary = ?, completed_at = ? WHERE id = ?")
        .bind(reason)
        .bind(now)
        .bind(task_id)
        .execute(&mut *tx)
        .await?;

    let released = locks::release_all_for_task(&mut *tx, task_id).await?;
    for key in &released {
        events::append_tx(
            &mut *tx,
            EventKind::LockReleased,
            Some(task_id),
            task.assigned_to,
            Some(key),
        )
        .await?;
    }

    if let Some(agent_id) = task.assigned_to {
        // Only reset the agent if it still holds this task
        sqlx::query(
            "UPDATE agents SET status = 'idle', current_task_id = NULL
             WHERE id = ? AND current_task_id = ?",
        )
        .bind(agent_id)
        .bind(task_id)
        .execute(&mut *tx)
        .await?;
    }

    events::append_tx(
        &mut *tx,
        EventKind::TaskDone,
        Some(task_id),
        task.assigned_to,
        Some(&format!("force closed: {reason}")),
    )
    .await?;

    tx.commit().await?;

    Ok(Task {
        status: TaskStatus::Done,
        assigned_to: task.assigned_to,
        summary: Some(reason.to_string()),
        completed_at: Some(now),
        ..task
    })
}

/// Retarget a pending task at a category, name, or role
///
/// # Errors
///
/// Returns `Error::NotFound` for an unknown task, `Error::InvalidState`
/// for a task that already left the queue, and `Error::InvalidArgument`
/// when no target field is given.
pub async fn assign_target(
    pool: &SqlitePool,
    task_id: i64,
    category: Option<&str>,
    name: Option<&str>,
    role: Option<&str>,
) -> Result<Task> {
    if category.is_none() && name.is_none() && role.is_none() {
        return Err(Error::invalid_argument(
            "assign requires at least one of --category, --name, --role",
        ));
    }

    let task = get(pool, task_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Task {task_id} does not exist")))?;

    if task.status != TaskStatus::Pending {
        return Err(Error::invalid_state(format!(
            "Task {task_id} is {}; only pending tasks can be retargeted",
            task.status
        )));
    }

    let row = sqlx::query(&format!(
        "UPDATE tasks SET
             target_category = COALESCE(?, target_category),
             target_name = COALESCE(?, target_name),
             target_role = COALESCE(?, target_role)
         WHERE id = ? AND status = 'pending'
         RETURNING {TASK_COLUMNS}"
    ))
    .bind(category)
    .bind(name)
    .bind(role)
    .bind(task_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| {
        Error::invalid_state(format!("Task {task_id} left the queue while retargeting"))
    })?;

    parse_task_row(row)
}

/// Fetch one task by id
pub async fn get(pool: &SqlitePool, task_id: i64) -> Result<Option<Task>> {
    sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
        .bind(task_id)
        .fetch_optional(pool)
        .await?
        .map(parse_task_row)
        .transpose()
}

/// List tasks matching the filter, in queue order (priority, then id)
pub async fn list(pool: &SqlitePool, filter: &TaskFilter) -> Result<Vec<Task>> {
    let mut sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE 1=1");
    if filter.status.is_some() {
        sql.push_str(" AND status = ?");
    }
    if filter.assigned_to.is_some() {
        sql.push_str(" AND assigned_to = ?");
    }
    if filter.priority.is_some() {
        sql.push_str(" AND priority = ?");
    }
    sql.push_str(" ORDER BY priority, id");

    let mut query = sqlx::query(&sql);
    if let Some(status) = filter.status {
        query = query.bind(status.to_string());
    }
    if let Some(agent) = filter.assigned_to {
        query = query.bind(agent);
    }
    if let Some(priority) = filter.priority {
        query = query.bind(priority);
    }

    query
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(parse_task_row)
        .collect()
}

/// Parse a database row into a `Task`
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn parse_task_row(row: sqlx::sqlite::SqliteRow) -> Result<Task> {
    let status_str: String = row.try_get("status")?;
    Ok(Task {
        id: row.try_get("id")?,
        description: row.try_get("description")?,
        priority: row.try_get("priority")?,
        target_category: row.try_get("target_category")?,
        target_name: row.try_get("target_name")?,
        target_role: row.try_get("target_role")?,
        status: TaskStatus::from_str(&status_str)?,
        assigned_to: row.try_get("assigned_to")?,
        depends_on: row.try_get("depends_on")?,
        summary: row.try_get("summary")?,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
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

    async fn join(db: &HiveDb, name: &str) -> Result<Agent> {
        db.register_agent("claude", name, "developer", None).await
    }

    #[tokio::test]
    async fn test_create_rejects_bad_priority() -> Result<()> {
        let (db, _dir) = setup().await?;
        let mut spec = TaskSpec::new("write docs");
        spec.priority = 9;
        assert!(matches!(
            db.create_task(&spec).await,
            Err(Error::InvalidArgument(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_rejects_missing_dependency() -> Result<()> {
        let (db, _dir) = setup().await?;
        let mut spec = TaskSpec::new("write docs");
        spec.depends_on = Some(42);
        assert!(matches!(
            db.create_task(&spec).await,
            Err(Error::InvalidArgument(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_claim_orders_by_priority_then_id() -> Result<()> {
        let (db, _dir) = setup().await?;
        let agent = join(&db, "alice").await?;

        let mut low = TaskSpec::new("low urgency");
        low.priority = 5;
        db.create_task(&low).await?;
        let mut high = TaskSpec::new("high urgency");
        high.priority = 1;
        let high = db.create_task(&high).await?;

        let claimed = db
            .claim_next(&agent)
            .await?
            .ok_or_else(|| Error::not_found("task"))?;
        assert_eq!(claimed.id, high.id);
        assert_eq!(claimed.status, TaskStatus::InProgress);
        assert_eq!(claimed.assigned_to, Some(agent.id));
        assert!(claimed.started_at.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_claim_skips_gated_dependency() -> Result<()> {
        let (db, _dir) = setup().await?;
        let agent = join(&db, "alice").await?;

        let base = db.create_task(&TaskSpec::new("base")).await?;
        let mut follow = TaskSpec::new("follow-up");
        follow.priority = 1;
        follow.depends_on = Some(base.id);
        db.create_task(&follow).await?;

        // Despite higher priority, follow-up is gated until base is done
        let claimed = db
            .claim_next(&agent)
            .await?
            .ok_or_else(|| Error::not_found("task"))?;
        assert_eq!(claimed.id, base.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_claim_respects_target_name() -> Result<()> {
        let (db, _dir) = setup().await?;
        let alice = join(&db, "alice").await?;
        let bob = join(&db, "bob").await?;

        let mut spec = TaskSpec::new("bob only");
        spec.target_name = Some("bob".to_string());
        db.create_task(&spec).await?;

        assert!(db.claim_next(&alice).await?.is_none());
        assert!(db.claim_next(&bob).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_double_claim_is_invalid_state() -> Result<()> {
        let (db, _dir) = setup().await?;
        let agent = join(&db, "alice").await?;
        db.create_task(&TaskSpec::new("one")).await?;
        db.create_task(&TaskSpec::new("two")).await?;

        db.claim_next(&agent).await?;
        // Even with the stale pre-claim snapshot, the store says no
        assert!(matches!(
            db.claim_next(&agent).await,
            Err(Error::InvalidState(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_round_trip() -> Result<()> {
        let (db, _dir) = setup().await?;
        let agent = join(&db, "alice").await?;
        let task = db.create_task(&TaskSpec::new("work")).await?;

        db.claim_next(&agent).await?;
        assert!(db.complete_current(agent.id, "all done").await?);

        let task = db
            .get_task(task.id)
            .await?
            .ok_or_else(|| Error::not_found("task"))?;
        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(task.summary.as_deref(), Some("all done"));

        let agent = db
            .agent_by_id(agent.id)
            .await?
            .ok_or_else(|| Error::not_found("agent"))?;
        assert_eq!(agent.status, hive_core::AgentStatus::Idle);
        assert!(agent.current_task_id.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_without_task_returns_false() -> Result<()> {
        let (db, _dir) = setup().await?;
        let agent = join(&db, "alice").await?;
        assert!(!db.complete_current(agent.id, "nothing").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_unblocks_dependent() -> Result<()> {
        let (db, _dir) = setup().await?;
        let agent = join(&db, "alice").await?;

        let base = db.create_task(&TaskSpec::new("base")).await?;
        let mut follow = TaskSpec::new("follow-up");
        follow.depends_on = Some(base.id);
        let follow = db.create_task(&follow).await?;

        db.claim_next(&agent).await?;
        db.complete_current(agent.id, "done").await?;

        let next = db
            .claim_next(&agent)
            .await?
            .ok_or_else(|| Error::not_found("task"))?;
        assert_eq!(next.id, follow.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_force_close_frees_agent_and_is_idempotent() -> Result<()> {
        let (db, _dir) = setup().await?;
        let agent = join(&db, "alice").await?;
        let task = db.create_task(&TaskSpec::new("stuck work")).await?;
        db.claim_next(&agent).await?;

        let closed = db.force_close_task(task.id, "operator gave up").await?;
        assert_eq!(closed.status, TaskStatus::Done);
        assert_eq!(closed.summary.as_deref(), Some("operator gave up"));

        let agent = db
            .agent_by_id(agent.id)
            .await?
            .ok_or_else(|| Error::not_found("agent"))?;
        assert!(agent.current_task_id.is_none());

        // Second close keeps the original summary
        let again = db.force_close_task(task.id, "different reason").await?;
        assert_eq!(again.summary.as_deref(), Some("operator gave up"));
        Ok(())
    }

    #[tokio::test]
    async fn test_force_close_unknown_task_not_found() -> Result<()> {
        let (db, _dir) = setup().await?;
        assert!(matches!(
            db.force_close_task(404, "gone").await,
            Err(Error::NotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_assign_target_only_pending() -> Result<()> {
        let (db, _dir) = setup().await?;
        let agent = join(&db, "alice").await?;
        let task = db.create_task(&TaskSpec::new("work")).await?;

        let updated = db
            .assign_target(task.id, Some("claude"), None, Some("reviewer"))
            .await?;
        assert_eq!(updated.target_category.as_deref(), Some("claude"));
        assert_eq!(updated.target_role.as_deref(), Some("reviewer"));

        db.claim_next(&agent).await?;
        assert!(matches!(
            db.assign_target(task.id, None, Some("bob"), None).await,
            Err(Error::InvalidState(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_assign_target_requires_a_field() -> Result<()> {
        let (db, _dir) = setup().await?;
        let task = db.create_task(&TaskSpec::new("work")).await?;
        assert!(matches!(
            db.assign_target(task.id, None, None, None).await,
            Err(Error::InvalidArgument(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_filters_by_status() -> Result<()> {
        let (db, _dir) = setup().await?;
        let agent = join(&db, "alice").await?;
        db.create_task(&TaskSpec::new("one")).await?;
        db.create_task(&TaskSpec::new("two")).await?;
        db.claim_next(&agent).await?;

        let pending = db
            .list_tasks(&TaskFilter {
                status: Some(TaskStatus::Pending),
                ..TaskFilter::default()
            })
            .await?;
        assert_eq!(pending.len(), 1);

        let mine = db
            .list_tasks(&TaskFilter {
                assigned_to: Some(agent.id),
                ..TaskFilter::default()
            })
            .await?;
        assert_eq!(mine.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_orders_by_priority_then_id() -> Result<()> {
        let (db, _dir) = setup().await?;
        let mut low = TaskSpec::new("later");
        low.priority = 5;
        let low = db.create_task(&low).await?;
        let mut high = TaskSpec::new("sooner");
        high.priority = 1;
        let high = db.create_task(&high).await?;
        let mut peer = TaskSpec::new("after sooner");
        peer.priority = 1;
        let peer = db.create_task(&peer).await?;

        let listed: Vec<i64> = db
            .list_tasks(&TaskFilter::default())
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(listed, vec![high.id, peer.id, low.id]);
        Ok(())
    }
}
