//! CLI dispatch: parse arguments and hand off to command implementations.

use anyhow::Result;
use clap::ArgMatches;
use hive_core::OutputFormat;

use crate::commands::{agents, done, init, join, lock, logs, next, start, status, task};

use super::args::build_cli;

/// Parse the process arguments and run the selected command
pub async fn run_cli() -> Result<()> {
    let matches = build_cli().get_matches();
    dispatch(&matches).await
}

/// Render an error for stderr, preferring the typed coordination error
pub fn format_error(err: &anyhow::Error) -> String {
    err.downcast_ref::<hive_core::Error>()
        .map_or_else(|| format!("{err:#}"), ToString::to_string)
}

fn format_of(matches: &ArgMatches) -> OutputFormat {
    if matches.get_flag("json") {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    }
}

async fn dispatch(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("init", m)) => {
            init::run(&init::InitOptions {
                force: m.get_flag("force"),
                format: format_of(m),
            })
            .await
        }
        Some(("join", m)) => {
            join::run(&join::JoinOptions {
                category: required_string(m, "category"),
                name: required_string(m, "name"),
                role: required_string(m, "role"),
                pid: m.get_one::<i64>("pid").copied(),
                format: format_of(m),
            })
            .await
        }
        Some(("agents", m)) => dispatch_agents(m).await,
        Some(("start", m)) => {
            start::run(&start::StartOptions {
                all: m.get_flag("all"),
                name: m.get_one::<String>("name").cloned(),
                category: m.get_one::<String>("category").cloned(),
                format: format_of(m),
            })
            .await
        }
        Some(("next", m)) => {
            next::run(&next::NextOptions {
                name: m.get_one::<String>("name").cloned(),
                format: format_of(m),
            })
            .await
        }
        Some(("done", m)) => {
            done::run(&done::DoneOptions {
                summary: required_string(m, "summary"),
                name: m.get_one::<String>("name").cloned(),
                format: format_of(m),
            })
            .await
        }
        Some(("task", m)) => dispatch_task(m).await,
        Some(("lock", m)) => dispatch_lock(m).await,
        Some(("logs", m)) => {
            logs::run(&logs::LogsOptions {
                limit: m.get_one::<i64>("limit").copied().unwrap_or(logs::DEFAULT_LIMIT),
                task_id: m.get_one::<i64>("task").copied(),
                agent_id: m.get_one::<i64>("agent").copied(),
                format: format_of(m),
            })
            .await
        }
        Some(("status", m)) => {
            status::run(&status::StatusOptions {
                format: format_of(m),
            })
            .await
        }
        _ => unreachable!("subcommand_required guarantees a match"),
    }
}

async fn dispatch_agents(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("list", m)) => {
            agents::run_list(&agents::ListAgentsOptions {
                format: format_of(m),
            })
            .await
        }
        Some(("reap", m)) => {
            agents::run_reap(&agents::ReapOptions {
                max_age_secs: m
                    .get_one::<i64>("max-age")
                    .copied()
                    .unwrap_or(agents::DEFAULT_MAX_AGE_SECS),
                check_pid: m.get_flag("check-pid"),
                force_all: m.get_flag("force-all"),
                format: format_of(m),
            })
            .await
        }
        _ => unreachable!("subcommand_required guarantees a match"),
    }
}

async fn dispatch_task(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("add", m)) => {
            task::run_add(&task::AddTaskOptions {
                description: required_string(m, "description"),
                priority: m
                    .get_one::<i64>("priority")
                    .copied()
                    .unwrap_or(hive_core::TaskSpec::DEFAULT_PRIORITY),
                target_category: m.get_one::<String>("category").cloned(),
                target_name: m.get_one::<String>("name").cloned(),
                target_role: m.get_one::<String>("role").cloned(),
                depends_on: m.get_one::<i64>("depends-on").copied(),
                format: format_of(m),
            })
            .await
        }
        Some(("list", m)) => {
            task::run_list(&task::ListTasksOptions {
                status: m.get_one::<String>("status").cloned(),
                mine: m.get_flag("mine"),
                name: m.get_one::<String>("name").cloned(),
                format: format_of(m),
            })
            .await
        }
        Some(("close", m)) => {
            task::run_close(&task::CloseTaskOptions {
                task_id: required_i64(m, "id"),
                reason: required_string(m, "reason"),
                format: format_of(m),
            })
            .await
        }
        Some(("assign", m)) => {
            task::run_assign(&task::AssignTaskOptions {
                task_id: required_i64(m, "id"),
                category: m.get_one::<String>("category").cloned(),
                name: m.get_one::<String>("name").cloned(),
                role: m.get_one::<String>("role").cloned(),
                format: format_of(m),
            })
            .await
        }
        _ => unreachable!("subcommand_required guarantees a match"),
    }
}

async fn dispatch_lock(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("acquire", m)) => {
            lock::run_acquire(&lock::AcquireOptions {
                keys: m
                    .get_many::<String>("keys")
                    .map(|keys| keys.cloned().collect())
                    .unwrap_or_default(),
                wait: m.get_flag("wait"),
                timeout_secs: m.get_one::<u64>("timeout").copied(),
                name: m.get_one::<String>("name").cloned(),
                format: format_of(m),
            })
            .await
        }
        Some(("release", m)) => {
            lock::run_release(&lock::ReleaseOptions {
                key: required_string(m, "key"),
                force: m.get_flag("force"),
                name: m.get_one::<String>("name").cloned(),
                format: format_of(m),
            })
            .await
        }
        Some(("list", m)) => {
            lock::run_list(&lock::ListLocksOptions {
                format: format_of(m),
            })
            .await
        }
        _ => unreachable!("subcommand_required guarantees a match"),
    }
}

/// Clap guarantees required args are present after a successful parse
fn required_string(matches: &ArgMatches, id: &str) -> String {
    matches.get_one::<String>(id).cloned().unwrap_or_default()
}

fn required_i64(matches: &ArgMatches, id: &str) -> i64 {
    matches.get_one::<i64>(id).copied().unwrap_or_default()
}
