//! Persistence layer for coordination state using `SQLx`
//!
//! One SQLite file holds all four record collections: agents, tasks,
//! resource locks, and events. WAL mode plus a busy timeout lets many
//! agent processes share the file; SQLite's single-writer rule is what
//! serializes competing claims.
//!
//! `HiveDb` is a thin cloneable wrapper over a connection pool; the
//! actual queries live as free functions in the submodules.

pub mod agents;
pub mod events;
pub mod locks;
pub mod tasks;

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use hive_core::{
    Agent, AgentStatus, Error, EventKind, EventRecord, ResourceLock, Result, Task, TaskFilter,
    TaskSpec,
};
use serde::Serialize;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Row, SqlitePool,
};

pub use locks::BatchAcquireOutcome;

/// Name of the store file, discovered by walking up from the working
/// directory.
pub const DB_FILE_NAME: &str = "hive.db";

const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Database schema as SQL string - executed once on init
const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY CHECK(version = 1)
);

CREATE TABLE IF NOT EXISTS agents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_token TEXT UNIQUE NOT NULL,
    category TEXT NOT NULL,
    name TEXT UNIQUE NOT NULL,
    role TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'idle' CHECK(status IN ('idle', 'working', 'waiting', 'done')),
    current_task_id INTEGER,
    registered_at INTEGER NOT NULL,
    last_heartbeat INTEGER NOT NULL,
    pid INTEGER
);

CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    description TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 3 CHECK(priority BETWEEN 1 AND 5),
    target_category TEXT,
    target_name TEXT,
    target_role TEXT,
    status TEXT NOT NULL DEFAULT 'pending' CHECK(status IN ('pending', 'in_progress', 'done', 'blocked')),
    assigned_to INTEGER REFERENCES agents(id),
    depends_on INTEGER REFERENCES tasks(id),
    summary TEXT,
    created_at INTEGER NOT NULL,
    started_at INTEGER,
    completed_at INTEGER
);

CREATE TABLE IF NOT EXISTS resource_locks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    resource_key TEXT UNIQUE NOT NULL,
    locked_by INTEGER NOT NULL REFERENCES agents(id),
    task_id INTEGER NOT NULL REFERENCES tasks(id),
    locked_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id INTEGER,
    agent_id INTEGER,
    kind TEXT NOT NULL,
    message TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_agents_status ON agents(status);
CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
CREATE INDEX IF NOT EXISTS idx_tasks_assigned ON tasks(assigned_to);
CREATE INDEX IF NOT EXISTS idx_events_task ON events(task_id);
CREATE INDEX IF NOT EXISTS idx_events_created ON events(created_at);
";

/// Database wrapper for coordination state with connection pooling
#[derive(Clone)]
pub struct HiveDb {
    pool: SqlitePool,
}

impl HiveDb {
    /// Get a reference to the underlying connection pool
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open an existing store at the given path
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the file is missing, corrupted, or
    /// carries a different schema version.
    pub async fn open(path: &Path) -> Result<Self> {
        Self::open_internal(path, false).await
    }

    /// Create or open the store (for the init command only)
    pub async fn create_or_open(path: &Path) -> Result<Self> {
        Self::open_internal(path, true).await
    }

    async fn open_internal(path: &Path, allow_create: bool) -> Result<Self> {
        if !allow_create && !path.exists() {
            return Err(Error::database_error(format!(
                "Store file does not exist: {}\n\nRun 'hive init' to initialize.",
                path.display()
            )));
        }

        if let Some(parent) = path.parent() {
            if allow_create && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::io_error(format!("Failed to create parent directory: {e}"))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(allow_create)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| Error::unavailable(format!("Failed to connect to store: {e}")))?;

        init_schema(&pool).await?;
        check_schema_version(&pool).await?;

        Ok(Self { pool })
    }

    // === AGENTS ===

    /// Register a new agent, minting a fresh session token
    pub async fn register_agent(
        &self,
        category: &str,
        name: &str,
        role: &str,
        pid: Option<i64>,
    ) -> Result<Agent> {
        agents::register(&self.pool, category, name, role, pid).await
    }

    /// Look up an agent by its session token
    pub async fn agent_by_token(&self, token: &str) -> Result<Option<Agent>> {
        agents::get_by_token(&self.pool, token).await
    }

    /// Look up an agent by id
    pub async fn agent_by_id(&self, id: i64) -> Result<Option<Agent>> {
        agents::get_by_id(&self.pool, id).await
    }

    /// List all registered agents, oldest first
    pub async fn list_agents(&self) -> Result<Vec<Agent>> {
        agents::list(&self.pool).await
    }

    /// Refresh an agent's liveness timestamp
    pub async fn heartbeat(&self, agent_id: i64) -> Result<()> {
        agents::heartbeat(&self.pool, agent_id).await
    }

    /// Remove agents with stale heartbeats, optionally probing process liveness
    pub async fn reap_agents(
        &self,
        max_age_secs: i64,
        check_pid: bool,
        force_all: bool,
    ) -> Result<Vec<Agent>> {
        agents::reap(&self.pool, max_age_secs, check_pid, force_all).await
    }

    // === TASKS ===

    /// Enqueue a new task
    pub async fn create_task(&self, spec: &TaskSpec) -> Result<Task> {
        tasks::create(&self.pool, spec).await
    }

    /// Atomically claim the best eligible task for `agent`
    ///
    /// Returns `Ok(None)` when nothing is eligible.
    pub async fn claim_next(&self, agent: &Agent) -> Result<Option<Task>> {
        tasks::claim_next(&self.pool, agent).await
    }

    /// Complete the agent's current task, releasing its locks
    ///
    /// Returns `false` when the agent holds no task.
    pub async fn complete_current(&self, agent_id: i64, summary: &str) -> Result<bool> {
        tasks::complete(&self.pool, agent_id, summary).await
    }

    /// Administratively close a task regardless of who holds it
    pub async fn force_close_task(&self, task_id: i64, reason: &str) -> Result<Task> {
        tasks::force_close(&self.pool, task_id, reason).await
    }

    /// Retarget a pending task at a category, name, or role
    pub async fn assign_target(
        &self,
        task_id: i64,
        category: Option<&str>,
        name: Option<&str>,
        role: Option<&str>,
    ) -> Result<Task> {
        tasks::assign_target(&self.pool, task_id, category, name, role).await
    }

    /// Fetch one task by id
    pub async fn get_task(&self, task_id: i64) -> Result<Option<Task>> {
        tasks::get(&self.pool, task_id).await
    }

    /// List tasks matching the filter, oldest first
    pub async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        tasks::list(&self.pool, filter).await
    }

    // === LOCKS ===

    /// Try to acquire one resource lock without waiting
    ///
    /// Returns `false` when the key is already held.
    pub async fn try_acquire(&self, key: &str, agent_id: i64, task_id: i64) -> Result<bool> {
        locks::try_acquire(&self.pool, key, agent_id, task_id).await
    }

    /// Acquire a batch of locks, polling until each is held or times out
    pub async fn acquire_locks(
        &self,
        agent: &Agent,
        task_id: i64,
        keys: &[String],
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<BatchAcquireOutcome> {
        locks::acquire_with_wait(&self.pool, agent, task_id, keys, timeout, poll_interval).await
    }

    /// Release one lock. `owner` of `None` forces release regardless of
    /// holder.
    pub async fn release_lock(&self, key: &str, owner: Option<i64>) -> Result<bool> {
        locks::release(&self.pool, key, owner).await
    }

    /// List all currently held locks
    pub async fn list_locks(&self) -> Result<Vec<ResourceLock>> {
        locks::list(&self.pool).await
    }

    // === EVENTS ===

    /// Append one entry to the event log
    pub async fn append_event(
        &self,
        kind: EventKind,
        task_id: Option<i64>,
        agent_id: Option<i64>,
        message: Option<&str>,
    ) -> Result<()> {
        events::append(&self.pool, kind, task_id, agent_id, message).await
    }

    /// Read recent events, newest first
    pub async fn recent_events(
        &self,
        limit: i64,
        task_id: Option<i64>,
        agent_id: Option<i64>,
    ) -> Result<Vec<EventRecord>> {
        events::recent(&self.pool, limit, task_id, agent_id).await
    }

    /// Aggregate counts for the status command
    pub async fn summary(&self) -> Result<StoreSummary> {
        query_summary(&self.pool).await
    }
}

/// Counts shown by `hive status`
#[derive(Debug, Clone, Serialize)]
pub struct StoreSummary {
    pub agents_total: i64,
    pub agents_working: i64,
    pub agents_waiting: i64,
    pub tasks_pending: i64,
    pub tasks_in_progress: i64,
    pub tasks_done: i64,
    pub locks_held: i64,
}

/// Locate the store by walking from the working directory toward root
///
/// # Errors
///
/// Returns `Error::NotFound` when no ancestor directory contains a
/// `hive.db`.
pub fn find_db_path() -> Result<PathBuf> {
    let cwd = std::env::current_dir()
        .map_err(|e| Error::io_error(format!("Cannot read working directory: {e}")))?;

    let mut dir: &Path = &cwd;
    loop {
        let candidate = dir.join(DB_FILE_NAME);
        if candidate.exists() {
            return Ok(candidate);
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => {
                return Err(Error::not_found(format!(
                    "No {DB_FILE_NAME} found in {} or any parent directory.\n\nRun 'hive init' first.",
                    cwd.display()
                )))
            }
        }
    }
}

/// Current Unix timestamp in seconds
pub(crate) fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

/// SQLite reports uniqueness violations only through the message text
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.to_string().to_lowercase().contains("unique")
}

// === IMPERATIVE SHELL (Database Side Effects) ===

/// Initialize database schema
async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| Error::database_error(format!("Failed to initialize schema: {e}")))?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(CURRENT_SCHEMA_VERSION)
        .execute(pool)
        .await
        .map_err(|e| Error::database_error(format!("Failed to set schema version: {e}")))?;

    Ok(())
}

/// Check database schema version matches expected
async fn check_schema_version(pool: &SqlitePool) -> Result<()> {
    let version: Option<i64> = sqlx::query("SELECT version FROM schema_version")
        .fetch_optional(pool)
        .await
        .map_err(|e| Error::database_error(format!("Failed to read schema version: {e}")))?
        .map(|row| {
            row.try_get("version")
                .map_err(|e| Error::database_error(format!("Failed to parse schema version: {e}")))
        })
        .transpose()?;

    match version {
        Some(v) if v == CURRENT_SCHEMA_VERSION => Ok(()),
        Some(v) => Err(Error::database_error(format!(
            "Schema version mismatch: store has version {v}, but hive expects version {CURRENT_SCHEMA_VERSION}\n\n\
             The store may have been created by a different version of hive.\n\n\
             To reset: rm {DB_FILE_NAME} && hive init"
        ))),
        None => Err(Error::database_error(format!(
            "Schema version not found in store. The store may be corrupted.\n\n\
             To reset: rm {DB_FILE_NAME} && hive init"
        ))),
    }
}

async fn query_summary(pool: &SqlitePool) -> Result<StoreSummary> {
    let row = sqlx::query(
        "SELECT
            (SELECT COUNT(*) FROM agents) AS agents_total,
            (SELECT COUNT(*) FROM agents WHERE status = 'working') AS agents_working,
            (SELECT COUNT(*) FROM agents WHERE status = 'waiting') AS agents_waiting,
            (SELECT COUNT(*) FROM tasks WHERE status = 'pending') AS tasks_pending,
            (SELECT COUNT(*) FROM tasks WHERE status = 'in_progress') AS tasks_in_progress,
            (SELECT COUNT(*) FROM tasks WHERE status = 'done') AS tasks_done,
            (SELECT COUNT(*) FROM resource_locks) AS locks_held",
    )
    .fetch_one(pool)
    .await?;

    Ok(StoreSummary {
        agents_total: row.try_get("agents_total")?,
        agents_working: row.try_get("agents_working")?,
        agents_waiting: row.try_get("agents_waiting")?,
        tasks_pending: row.try_get("tasks_pending")?,
        tasks_in_progress: row.try_get("tasks_in_progress")?,
        tasks_done: row.try_get("tasks_done")?,
        locks_held: row.try_get("locks_held")?,
    })
}

/// Reset an agent's bookkeeping after its task leaves its hands
pub(crate) async fn idle_agent(
    conn: &mut sqlx::SqliteConnection,
    agent_id: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE agents SET status = ?, current_task_id = NULL, last_heartbeat = ? WHERE id = ?",
    )
    .bind(AgentStatus::Idle.to_string())
    .bind(now_ts())
    .bind(agent_id)
    .execute(conn)
    .await?;
    Ok(())
}
