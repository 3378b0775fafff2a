//! Task command - enqueue, list, retarget, and force-close tasks

use std::str::FromStr;

use anyhow::Result;
use hive_core::{OutputFormat, SchemaEnvelope, Task, TaskFilter, TaskSpec, TaskStatus};
use serde::Serialize;

use crate::{commands::open_store, session};

/// Options for `task add`
#[derive(Debug, Clone)]
pub struct AddTaskOptions {
    pub description: String,
    pub priority: i64,
    pub target_category: Option<String>,
    pub target_name: Option<String>,
    pub target_role: Option<String>,
    pub depends_on: Option<i64>,
    pub format: OutputFormat,
}

/// Options for `task list`
#[derive(Debug, Clone)]
pub struct ListTasksOptions {
    /// Filter by lifecycle state
    pub status: Option<String>,
    /// Only tasks claimed by the calling agent
    pub mine: bool,
    /// Agent name when `mine` needs a session and the token is not in
    /// the environment
    pub name: Option<String>,
    pub format: OutputFormat,
}

/// Options for `task close`
#[derive(Debug, Clone)]
pub struct CloseTaskOptions {
    pub task_id: i64,
    pub reason: String,
    pub format: OutputFormat,
}

/// Options for `task assign`
#[derive(Debug, Clone)]
pub struct AssignTaskOptions {
    pub task_id: i64,
    pub category: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct TaskOutput {
    task: Task,
}

#[derive(Debug, Serialize)]
struct ListTasksOutput {
    count: usize,
    tasks: Vec<Task>,
}

/// Run `task add`
pub async fn run_add(options: &AddTaskOptions) -> Result<()> {
    let (db, _dir) = open_store().await?;

    let spec = TaskSpec {
        description: options.description.clone(),
        priority: options.priority,
        target_category: options.target_category.clone(),
        target_name: options.target_name.clone(),
        target_role: options.target_role.clone(),
        depends_on: options.depends_on,
    };
    let task = db.create_task(&spec).await?;

    let output = TaskOutput { task };

    if options.format.is_json() {
        let envelope = SchemaEnvelope::new("task-add", output);
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        println!(
            "✓ Added task #{} (priority {}): {}",
            output.task.id, output.task.priority, output.task.description
        );
    }

    Ok(())
}

/// Run `task list`
pub async fn run_list(options: &ListTasksOptions) -> Result<()> {
    let (db, dir) = open_store().await?;

    let status = options
        .status
        .as_deref()
        .map(TaskStatus::from_str)
        .transpose()?;

    let assigned_to = if options.mine {
        let agent = session::current_agent(&db, &dir, options.name.as_deref()).await?;
        Some(agent.id)
    } else {
        None
    };

    let tasks = db
        .list_tasks(&TaskFilter {
            status,
            assigned_to,
            priority: None,
        })
        .await?;

    let output = ListTasksOutput {
        count: tasks.len(),
        tasks,
    };

    if options.format.is_json() {
        let envelope = SchemaEnvelope::new("task-list", output);
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else if output.tasks.is_empty() {
        println!("No matching tasks");
    } else {
        for task in &output.tasks {
            let owner = task
                .assigned_to
                .map_or_else(String::new, |id| format!(" -> agent {id}"));
            println!(
                "{:>4}  p{}  {:<12} {}{owner}",
                task.id, task.priority, task.status.to_string(), task.description
            );
        }
    }

    Ok(())
}

/// Run `task close`
pub async fn run_close(options: &CloseTaskOptions) -> Result<()> {
    let (db, _dir) = open_store().await?;
    let task = db.force_close_task(options.task_id, &options.reason).await?;

    let output = TaskOutput { task };

    if options.format.is_json() {
        let envelope = SchemaEnvelope::new("task-close", output);
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        println!(
            "✓ Closed task #{}: {}",
            output.task.id,
            output.task.summary.as_deref().unwrap_or("")
        );
    }

    Ok(())
}

/// Run `task assign`
pub async fn run_assign(options: &AssignTaskOptions) -> Result<()> {
    let (db, _dir) = open_store().await?;
    let task = db
        .assign_target(
            options.task_id,
            options.category.as_deref(),
            options.name.as_deref(),
            options.role.as_deref(),
        )
        .await?;

    let output = TaskOutput { task };

    if options.format.is_json() {
        let envelope = SchemaEnvelope::new("task-assign", output);
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        let task = &output.task;
        println!("✓ Retargeted task #{}", task.id);
        if let Some(c) = &task.target_category {
            println!("  Category: {c}");
        }
        if let Some(n) = &task.target_name {
            println!("  Name:     {n}");
        }
        if let Some(r) = &task.target_role {
            println!("  Role:     {r}");
        }
    }

    Ok(())
}
