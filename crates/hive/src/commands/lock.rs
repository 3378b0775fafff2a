//! Lock command - acquire, release, and list resource locks

use std::time::Duration;

use anyhow::Result;
use hive_core::{Error, OutputFormat, ResourceLock, SchemaEnvelope};
use serde::Serialize;

use crate::{
    commands::open_store,
    db::locks::{DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT},
    session,
};

/// Options for `lock acquire`
#[derive(Debug, Clone)]
pub struct AcquireOptions {
    /// Resource keys to take, order irrelevant
    pub keys: Vec<String>,
    /// Poll until each key frees up instead of failing fast
    pub wait: bool,
    /// Per-key wait deadline in seconds
    pub timeout_secs: Option<u64>,
    /// Agent name when the token is not in the environment
    pub name: Option<String>,
    pub format: OutputFormat,
}

/// Options for `lock release`
#[derive(Debug, Clone)]
pub struct ReleaseOptions {
    pub key: String,
    /// Release even if another agent holds the key
    pub force: bool,
    pub name: Option<String>,
    pub format: OutputFormat,
}

/// Options for `lock list`
#[derive(Debug, Clone)]
pub struct ListLocksOptions {
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct AcquireOutput {
    all_acquired: bool,
    acquired: Vec<String>,
    failed: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ReleaseOutput {
    released: bool,
    key: String,
}

#[derive(Debug, Serialize)]
struct ListLocksOutput {
    count: usize,
    locks: Vec<ResourceLock>,
}

/// Run `lock acquire`
pub async fn run_acquire(options: &AcquireOptions) -> Result<()> {
    let (db, dir) = open_store().await?;
    let agent = session::current_agent(&db, &dir, options.name.as_deref()).await?;

    let task_id = agent.current_task_id.ok_or_else(|| {
        Error::invalid_state("Locks belong to tasks; claim a task with 'hive next' first")
    })?;

    let outcome = if options.wait {
        let timeout = options
            .timeout_secs
            .map_or(DEFAULT_WAIT_TIMEOUT, Duration::from_secs);
        db.acquire_locks(&agent, task_id, &options.keys, timeout, DEFAULT_POLL_INTERVAL)
            .await?
    } else {
        let mut acquired = Vec::new();
        let mut failed = Vec::new();
        for key in &options.keys {
            if db.try_acquire(key, agent.id, task_id).await? {
                acquired.push(key.clone());
            } else {
                failed.push(key.clone());
            }
        }
        crate::db::BatchAcquireOutcome { acquired, failed }
    };

    let output = AcquireOutput {
        all_acquired: outcome.all_acquired(),
        acquired: outcome.acquired,
        failed: outcome.failed,
    };

    if options.format.is_json() {
        let envelope = SchemaEnvelope::new("lock-acquire", output);
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        if !envelope.data.all_acquired {
            return Err(Error::timeout("some locks could not be acquired").into());
        }
    } else if output.all_acquired {
        for key in &output.acquired {
            println!("✓ Locked '{key}'");
        }
    } else {
        #[allow(clippy::print_stderr)]
        for key in &output.failed {
            eprintln!("✗ Could not lock '{key}'");
        }
        return Err(Error::timeout("some locks could not be acquired").into());
    }

    Ok(())
}

/// Run `lock release`
pub async fn run_release(options: &ReleaseOptions) -> Result<()> {
    let (db, dir) = open_store().await?;

    let owner = if options.force {
        None
    } else {
        let agent = session::current_agent(&db, &dir, options.name.as_deref()).await?;
        Some(agent.id)
    };

    let released = db.release_lock(&options.key, owner).await?;

    let output = ReleaseOutput {
        released,
        key: options.key.clone(),
    };

    if options.format.is_json() {
        let envelope = SchemaEnvelope::new("lock-release", output);
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else if output.released {
        println!("✓ Released '{}'", output.key);
    } else {
        println!("'{}' was not released (not locked, or held by another agent)", output.key);
    }

    Ok(())
}

/// Run `lock list`
pub async fn run_list(options: &ListLocksOptions) -> Result<()> {
    let (db, _dir) = open_store().await?;
    let locks = db.list_locks().await?;

    let output = ListLocksOutput {
        count: locks.len(),
        locks,
    };

    if options.format.is_json() {
        let envelope = SchemaEnvelope::new("lock-list", output);
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else if output.locks.is_empty() {
        println!("No locks held");
    } else {
        for lock in &output.locks {
            println!(
                "{:<40} agent {} (task #{})",
                lock.resource_key, lock.locked_by, lock.task_id
            );
        }
    }

    Ok(())
}
