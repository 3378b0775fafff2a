//! Domain models: agents, tasks, resource locks, and log events.
//!
//! These mirror the four record collections in the store. All timestamps are
//! Unix seconds; database ids are `i64` rowids.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Agent lifecycle state.
///
/// `Done` is reserved; no current transition reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Registered, no task claimed
    #[default]
    Idle,
    /// Executing a claimed task
    Working,
    /// Blocked on a contended resource lock
    Waiting,
    /// Reserved for forward use
    Done,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Working => write!(f, "working"),
            Self::Waiting => write!(f, "waiting"),
            Self::Done => write!(f, "done"),
        }
    }
}

impl FromStr for AgentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "idle" => Ok(Self::Idle),
            "working" => Ok(Self::Working),
            "waiting" => Ok(Self::Waiting),
            "done" => Ok(Self::Done),
            _ => Err(Error::parse_error(format!("Invalid agent status: {s}"))),
        }
    }
}

/// Task lifecycle state.
///
/// `Blocked` is modeled but unused: nothing transitions into or out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in the queue
    #[default]
    Pending,
    /// Claimed by exactly one agent
    InProgress,
    /// Finished, via completion or forced closure
    Done,
    /// Reserved
    Blocked,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Done => write!(f, "done"),
            Self::Blocked => write!(f, "blocked"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "blocked" => Ok(Self::Blocked),
            _ => Err(Error::parse_error(format!("Invalid task status: {s}"))),
        }
    }
}

/// Event kinds recorded in the append-only log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskCreated,
    TaskStarted,
    TaskDone,
    LockAcquired,
    LockReleased,
    WaitingForLock,
    AgentRegistered,
    AgentStarted,
    AgentReaped,
    Error,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TaskCreated => write!(f, "task_created"),
            Self::TaskStarted => write!(f, "task_started"),
            Self::TaskDone => write!(f, "task_done"),
            Self::LockAcquired => write!(f, "lock_acquired"),
            Self::LockReleased => write!(f, "lock_released"),
            Self::WaitingForLock => write!(f, "waiting_for_lock"),
            Self::AgentRegistered => write!(f, "agent_registered"),
            Self::AgentStarted => write!(f, "agent_started"),
            Self::AgentReaped => write!(f, "agent_reaped"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "task_created" => Ok(Self::TaskCreated),
            "task_started" => Ok(Self::TaskStarted),
            "task_done" => Ok(Self::TaskDone),
            "lock_acquired" => Ok(Self::LockAcquired),
            "lock_released" => Ok(Self::LockReleased),
            "waiting_for_lock" => Ok(Self::WaitingForLock),
            "agent_registered" => Ok(Self::AgentRegistered),
            "agent_started" => Ok(Self::AgentStarted),
            "agent_reaped" => Ok(Self::AgentReaped),
            "error" => Ok(Self::Error),
            _ => Err(Error::parse_error(format!("Invalid event kind: {s}"))),
        }
    }
}

/// A registered worker agent.
///
/// Invariant: `current_task_id` is non-null iff `status` is working or
/// waiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Database id (monotonic)
    pub id: i64,
    /// Unique session credential identifying the agent's process
    pub session_token: String,
    /// Category tag (e.g. the kind of worker binary)
    pub category: String,
    /// Unique human-readable name
    pub name: String,
    /// Role tag
    pub role: String,
    /// Current lifecycle state
    pub status: AgentStatus,
    /// The task this agent currently executes, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_task_id: Option<i64>,
    /// Unix timestamp of registration
    pub registered_at: i64,
    /// Unix timestamp of the last heartbeat
    pub last_heartbeat: i64,
    /// OS process id, used by liveness reaping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<i64>,
}

impl Agent {
    /// Whether the agent currently holds a task.
    pub const fn is_busy(&self) -> bool {
        self.current_task_id.is_some()
    }
}

/// A unit of work in the shared queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Database id (monotonic; insertion order breaks priority ties)
    pub id: i64,
    /// What needs doing
    pub description: String,
    /// 1 (highest) through 5 (lowest)
    pub priority: i64,
    /// Only agents of this category may claim, if set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_category: Option<String>,
    /// Only the agent with this name may claim, if set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    /// Only agents with this role may claim, if set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_role: Option<String>,
    /// Current lifecycle state
    pub status: TaskStatus,
    /// The claiming agent; non-null iff in progress
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<i64>,
    /// Task that must be done before this one becomes claimable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<i64>,
    /// Completion summary, or the forced-closure reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

/// Parameters for enqueuing a new task.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub description: String,
    pub priority: i64,
    pub target_category: Option<String>,
    pub target_name: Option<String>,
    pub target_role: Option<String>,
    pub depends_on: Option<i64>,
}

impl TaskSpec {
    /// Default priority for tasks that do not specify one.
    pub const DEFAULT_PRIORITY: i64 = 3;

    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            priority: Self::DEFAULT_PRIORITY,
            target_category: None,
            target_name: None,
            target_role: None,
            depends_on: None,
        }
    }
}

/// Optional filters for listing tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub assigned_to: Option<i64>,
    pub priority: Option<i64>,
}

/// An exclusive advisory lock on a named resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLock {
    pub id: i64,
    /// Normalized resource key, unique among active locks
    pub resource_key: String,
    /// Holding agent
    pub locked_by: i64,
    /// Owning task; completion of this task releases the lock
    pub task_id: i64,
    pub locked_at: i64,
}

/// One append-only log entry. Never read back for control decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<i64>,
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_status_round_trip() -> Result<()> {
        for s in ["idle", "working", "waiting", "done"] {
            assert_eq!(AgentStatus::from_str(s)?.to_string(), s);
        }
        Ok(())
    }

    #[test]
    fn test_task_status_round_trip() -> Result<()> {
        for s in ["pending", "in_progress", "done", "blocked"] {
            assert_eq!(TaskStatus::from_str(s)?.to_string(), s);
        }
        Ok(())
    }

    #[test]
    fn test_invalid_status_rejected() {
        assert!(AgentStatus::from_str("sleeping").is_err());
        assert!(TaskStatus::from_str("paused").is_err());
        assert!(EventKind::from_str("mystery").is_err());
    }

    #[test]
    fn test_event_kind_serializes_snake_case() -> Result<()> {
        let json = serde_json::to_string(&EventKind::WaitingForLock)?;
        assert_eq!(json, "\"waiting_for_lock\"");
        Ok(())
    }

    #[test]
    fn test_task_spec_defaults() {
        let spec = TaskSpec::new("write docs");
        assert_eq!(spec.priority, 3);
        assert!(spec.target_name.is_none());
        assert!(spec.depends_on.is_none());
    }

    #[test]
    fn test_agent_busy_tracks_current_task() {
        let mut agent = Agent {
            id: 1,
            session_token: "tok".to_string(),
            category: "claude".to_string(),
            name: "alice".to_string(),
            role: "developer".to_string(),
            status: AgentStatus::Idle,
            current_task_id: None,
            registered_at: 0,
            last_heartbeat: 0,
            pid: None,
        };
        assert!(!agent.is_busy());
        agent.current_task_id = Some(9);
        assert!(agent.is_busy());
    }

    #[test]
    fn test_task_none_fields_omitted_from_json() -> Result<()> {
        let task = Task {
            id: 1,
            description: "t".to_string(),
            priority: 1,
            target_category: None,
            target_name: None,
            target_role: None,
            status: TaskStatus::Pending,
            assigned_to: None,
            depends_on: None,
            summary: None,
            created_at: 0,
            started_at: None,
            completed_at: None,
        };
        let json = serde_json::to_string(&task)?;
        assert!(!json.contains("assigned_to"));
        assert!(!json.contains("summary"));
        assert!(json.contains("\"status\":\"pending\""));
        Ok(())
    }
}
