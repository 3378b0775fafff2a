//! Behavior tests for multi-agent coordination through a shared store.
//!
//! These exercise the properties agents rely on: exclusive claims under
//! contention, priority and dependency ordering, exclusive locks, and
//! locks dying with their task.

use std::time::Duration;

use hive::db::HiveDb;
use hive_core::{AgentStatus, Error, EventKind, Result, TaskSpec, TaskStatus};
use tempfile::TempDir;

async fn setup() -> Result<(HiveDb, TempDir)> {
    let dir = TempDir::new().map_err(|e| Error::io_error(e.to_string()))?;
    let db = HiveDb::create_or_open(&dir.path().join("hive.db")).await?;
    Ok((db, dir))
}

/// GIVEN: One pending task and many idle agents
/// WHEN: All agents claim concurrently
/// THEN: Exactly one claim succeeds
#[tokio::test]
async fn concurrent_claims_are_exclusive() -> Result<()> {
    let (db, _dir) = setup().await?;
    db.create_task(&TaskSpec::new("contested work")).await?;

    let mut agents = Vec::new();
    for i in 0..5 {
        agents.push(
            db.register_agent("claude", &format!("agent-{i}"), "developer", None)
                .await?,
        );
    }

    let mut handles = Vec::new();
    for agent in agents {
        let db = db.clone();
        handles.push(tokio::spawn(async move { db.claim_next(&agent).await }));
    }

    let mut winners = 0;
    for handle in handles {
        let claimed = handle.await.map_err(|e| Error::unknown(e.to_string()))??;
        if claimed.is_some() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1, "exactly one agent may win a task");
    Ok(())
}

/// GIVEN: Tasks across the whole priority range
/// WHEN: One agent drains the queue
/// THEN: Tasks come out by priority, then insertion order
#[tokio::test]
async fn queue_drains_in_priority_then_insertion_order() -> Result<()> {
    let (db, _dir) = setup().await?;
    let agent = db.register_agent("claude", "alice", "developer", None).await?;

    let mut ids_by_rank = Vec::new();
    for (priority, desc) in [(3, "first p3"), (1, "only p1"), (3, "second p3"), (5, "p5")] {
        let mut spec = TaskSpec::new(desc);
        spec.priority = priority;
        ids_by_rank.push((priority, db.create_task(&spec).await?.id));
    }

    let mut drained = Vec::new();
    while let Some(task) = db.claim_next(&agent).await? {
        drained.push(task.id);
        db.complete_current(agent.id, "done").await?;
    }

    let expected = vec![ids_by_rank[1].1, ids_by_rank[0].1, ids_by_rank[2].1, ids_by_rank[3].1];
    assert_eq!(drained, expected);
    Ok(())
}

/// GIVEN: A dependency chain a <- b <- c
/// WHEN: An agent works through it
/// THEN: Each link only becomes claimable after its parent completes
#[tokio::test]
async fn dependency_chain_gates_claims() -> Result<()> {
    let (db, _dir) = setup().await?;
    let agent = db.register_agent("claude", "alice", "developer", None).await?;

    let a = db.create_task(&TaskSpec::new("a")).await?;
    let mut spec_b = TaskSpec::new("b");
    spec_b.depends_on = Some(a.id);
    spec_b.priority = 1;
    let b = db.create_task(&spec_b).await?;
    let mut spec_c = TaskSpec::new("c");
    spec_c.depends_on = Some(b.id);
    spec_c.priority = 1;
    let c = db.create_task(&spec_c).await?;

    for expected in [a.id, b.id, c.id] {
        let task = db.claim_next(&agent).await?.expect("a link should be open");
        assert_eq!(task.id, expected);
        db.complete_current(agent.id, "done").await?;
    }
    assert!(db.claim_next(&agent).await?.is_none());
    Ok(())
}

/// GIVEN: An agent mid-task
/// WHEN: It claims again without completing
/// THEN: The store refuses
#[tokio::test]
async fn double_claim_is_refused() -> Result<()> {
    let (db, _dir) = setup().await?;
    let agent = db.register_agent("claude", "alice", "developer", None).await?;
    db.create_task(&TaskSpec::new("one")).await?;
    db.create_task(&TaskSpec::new("two")).await?;

    db.claim_next(&agent).await?;
    let second = db.claim_next(&agent).await;
    assert!(matches!(second, Err(Error::InvalidState(_))));
    Ok(())
}

/// GIVEN: An idle agent
/// WHEN: It reports completion
/// THEN: The result is false, not an error
#[tokio::test]
async fn completing_nothing_is_false_not_fatal() -> Result<()> {
    let (db, _dir) = setup().await?;
    let agent = db.register_agent("claude", "alice", "developer", None).await?;
    assert!(!db.complete_current(agent.id, "nothing happened").await?);
    Ok(())
}

/// GIVEN: A task an agent is working with locks held
/// WHEN: An operator force-closes it, twice
/// THEN: Locks free, the agent idles, and the first reason survives
#[tokio::test]
async fn force_close_cleans_up_and_is_idempotent() -> Result<()> {
    let (db, _dir) = setup().await?;
    let agent = db.register_agent("claude", "alice", "developer", None).await?;
    let task = db.create_task(&TaskSpec::new("stuck")).await?;

    db.claim_next(&agent).await?;
    db.try_acquire("src/main.rs", agent.id, task.id).await?;

    let closed = db.force_close_task(task.id, "hung process").await?;
    assert_eq!(closed.status, TaskStatus::Done);
    assert!(db.list_locks().await?.is_empty());

    let agent = db.agent_by_id(agent.id).await?.expect("agent still registered");
    assert_eq!(agent.status, AgentStatus::Idle);
    assert!(agent.current_task_id.is_none());

    let again = db.force_close_task(task.id, "other reason").await?;
    assert_eq!(again.summary.as_deref(), Some("hung process"));
    Ok(())
}

/// GIVEN: One resource key and many agents
/// WHEN: All try to take it at once
/// THEN: Exactly one insert wins
#[tokio::test]
async fn concurrent_lock_attempts_have_one_winner() -> Result<()> {
    let (db, _dir) = setup().await?;

    let mut contenders = Vec::new();
    for i in 0..5 {
        let agent = db
            .register_agent("claude", &format!("agent-{i}"), "developer", None)
            .await?;
        let task = db.create_task(&TaskSpec::new(format!("work {i}"))).await?;
        contenders.push((agent.id, task.id));
    }

    let mut handles = Vec::new();
    for (agent_id, task_id) in contenders {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            db.try_acquire("shared/config.toml", agent_id, task_id).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.map_err(|e| Error::unknown(e.to_string()))?? {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(db.list_locks().await?.len(), 1);
    Ok(())
}

/// GIVEN: An agent holding locks for its task
/// WHEN: The task completes
/// THEN: Another agent can take the keys immediately
#[tokio::test]
async fn completion_frees_locks_for_the_next_agent() -> Result<()> {
    let (db, _dir) = setup().await?;
    let alice = db.register_agent("claude", "alice", "developer", None).await?;
    let bob = db.register_agent("claude", "bob", "developer", None).await?;
    let first = db.create_task(&TaskSpec::new("first")).await?;
    let second = db.create_task(&TaskSpec::new("second")).await?;

    let claimed = db.claim_next(&alice).await?.expect("first task open");
    assert_eq!(claimed.id, first.id);
    db.try_acquire("docs/readme.md", alice.id, first.id).await?;

    // Held while the task lives
    assert!(!db.try_acquire("docs/readme.md", bob.id, second.id).await?);

    db.complete_current(alice.id, "shipped").await?;

    db.claim_next(&bob).await?;
    assert!(db.try_acquire("docs/readme.md", bob.id, second.id).await?);
    Ok(())
}

/// GIVEN: Two agents wanting overlapping key sets, stated in opposite order
/// WHEN: Both batch-acquire with waiting
/// THEN: Both finish; sorted wait order prevents deadlock
#[tokio::test]
async fn overlapping_batches_complete_without_deadlock() -> Result<()> {
    let (db, _dir) = setup().await?;
    let alice = db.register_agent("claude", "alice", "developer", None).await?;
    let bob = db.register_agent("claude", "bob", "developer", None).await?;
    let task_a = db.create_task(&TaskSpec::new("alice work")).await?;
    let task_b = db.create_task(&TaskSpec::new("bob work")).await?;

    let run = |agent: hive_core::Agent, task_id: i64, keys: Vec<String>| {
        let db = db.clone();
        tokio::spawn(async move {
            let outcome = db
                .acquire_locks(
                    &agent,
                    task_id,
                    &keys,
                    Duration::from_secs(10),
                    Duration::from_millis(10),
                )
                .await?;
            for key in &outcome.acquired {
                db.release_lock(key, Some(agent.id)).await?;
            }
            Ok::<_, Error>(outcome)
        })
    };

    let first = run(
        alice,
        task_a.id,
        vec!["x.txt".to_string(), "y.txt".to_string()],
    );
    let second = run(
        bob,
        task_b.id,
        vec!["y.txt".to_string(), "x.txt".to_string()],
    );

    let a = first.await.map_err(|e| Error::unknown(e.to_string()))??;
    let b = second.await.map_err(|e| Error::unknown(e.to_string()))??;
    assert!(a.all_acquired());
    assert!(b.all_acquired());
    Ok(())
}

/// GIVEN: A full claim/lock/complete cycle
/// WHEN: The event log is read back
/// THEN: Every step left its trace, newest first
#[tokio::test]
async fn lifecycle_leaves_a_full_event_trail() -> Result<()> {
    let (db, _dir) = setup().await?;
    let agent = db.register_agent("claude", "alice", "developer", None).await?;
    let task = db.create_task(&TaskSpec::new("observable work")).await?;

    db.claim_next(&agent).await?;
    db.try_acquire("src/lib.rs", agent.id, task.id).await?;
    db.complete_current(agent.id, "done").await?;

    let kinds: Vec<EventKind> = db
        .recent_events(50, None, None)
        .await?
        .into_iter()
        .map(|e| e.kind)
        .collect();

    assert_eq!(
        kinds,
        vec![
            EventKind::TaskDone,
            EventKind::LockReleased,
            EventKind::LockAcquired,
            EventKind::TaskStarted,
            EventKind::TaskCreated,
            EventKind::AgentRegistered,
        ]
    );
    Ok(())
}
