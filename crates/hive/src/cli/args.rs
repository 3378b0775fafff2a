//! CLI argument definitions and command builders
//!
//! Each function returns a configured `clap::Command` for one
//! subcommand. Every subcommand takes `--json` for machine parsing.

use clap::{Arg, ArgAction, Command};

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON for machine parsing")
}

fn agent_name_arg() -> Arg {
    Arg::new("name")
        .long("name")
        .help("Agent name to read the session file for (when HIVE_SESSION is unset)")
}

pub fn cmd_init() -> Command {
    Command::new("init")
        .about("Create the shared store in the current directory")
        .long_about(
            "Create the Shared Store\n\
             \n\
             Creates hive.db in the current directory. Every other command\n\
             finds the store by walking up from wherever it runs, so run\n\
             init once at the root of the project agents will share.\n\
             \n\
             Re-running init on an existing store is safe and changes\n\
             nothing. Use --force to wipe all coordination state and start\n\
             over.",
        )
        .arg(
            Arg::new("force")
                .long("force")
                .short('f')
                .action(ArgAction::SetTrue)
                .help("Wipe an existing store and start fresh"),
        )
        .arg(json_arg())
}

pub fn cmd_join() -> Command {
    Command::new("join")
        .about("Register this agent and mint its session token")
        .long_about(
            "Register an Agent\n\
             \n\
             Adds the agent to the registry under a unique name and prints\n\
             a fresh session token. The token is also written to a\n\
             .hive_session_<name> file next to the store, so later\n\
             invocations can identify themselves with --name or the\n\
             HIVE_AGENT environment variable instead of carrying the token.\n\
             \n\
             Pass --pid with the agent process id so liveness reaping can\n\
             probe it; by default the id of the joining process is used.",
        )
        .arg(
            Arg::new("category")
                .long("category")
                .required(true)
                .help("Worker kind, e.g. claude or codex"),
        )
        .arg(
            Arg::new("name")
                .long("name")
                .required(true)
                .help("Unique agent name"),
        )
        .arg(
            Arg::new("role")
                .long("role")
                .required(true)
                .help("Role tag, e.g. developer or reviewer"),
        )
        .arg(
            Arg::new("pid")
                .long("pid")
                .value_parser(clap::value_parser!(i64))
                .help("Process id recorded for liveness probing"),
        )
        .arg(json_arg())
}

pub fn cmd_agents() -> Command {
    Command::new("agents")
        .about("Inspect the agent registry")
        .subcommand_required(true)
        .subcommand(
            Command::new("list")
                .about("List all registered agents")
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("reap")
                .about("Remove agents judged dead by heartbeat age or process probe")
                .arg(
                    Arg::new("max-age")
                        .long("max-age")
                        .value_parser(clap::value_parser!(i64))
                        .default_value("300")
                        .help("Heartbeat age in seconds before an agent counts as stale"),
                )
                .arg(
                    Arg::new("check-pid")
                        .long("check-pid")
                        .action(ArgAction::SetTrue)
                        .help("Also remove fresh agents whose recorded process is gone"),
                )
                .arg(
                    Arg::new("force-all")
                        .long("force-all")
                        .action(ArgAction::SetTrue)
                        .help("Remove every agent regardless of heartbeat or process state"),
                )
                .arg(json_arg()),
        )
}

pub fn cmd_start() -> Command {
    Command::new("start")
        .about("Broadcast a start signal to agents (informational)")
        .arg(
            Arg::new("all")
                .long("all")
                .short('a')
                .action(ArgAction::SetTrue)
                .help("Signal every registered agent"),
        )
        .arg(
            Arg::new("name")
                .long("name")
                .conflicts_with("all")
                .help("Signal one agent by name"),
        )
        .arg(
            Arg::new("category")
                .long("category")
                .conflicts_with_all(["all", "name"])
                .help("Signal every agent in a category"),
        )
        .arg(json_arg())
}

pub fn cmd_next() -> Command {
    Command::new("next")
        .about("Claim the best eligible task from the queue")
        .long_about(
            "Claim a Task\n\
             \n\
             Atomically claims the highest-urgency pending task this agent\n\
             is allowed to take: dependencies must be done and any target\n\
             category/name/role on the task must match. Ties break toward\n\
             the oldest task. At most one agent ever wins a given task.\n\
             \n\
             Exits cleanly with no task claimed when the queue holds\n\
             nothing eligible. Fails when this agent already holds a task.",
        )
        .arg(agent_name_arg())
        .arg(json_arg())
}

pub fn cmd_done() -> Command {
    Command::new("done")
        .about("Complete this agent's current task")
        .arg(
            Arg::new("summary")
                .required(true)
                .help("What got accomplished"),
        )
        .arg(agent_name_arg())
        .arg(json_arg())
}

pub fn cmd_task() -> Command {
    Command::new("task")
        .about("Enqueue, list, retarget, and force-close tasks")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .about("Enqueue a new task")
                .arg(Arg::new("description").required(true).help("What needs doing"))
                .arg(
                    Arg::new("priority")
                        .long("priority")
                        .short('p')
                        .value_parser(clap::value_parser!(i64))
                        .default_value("3")
                        .help("Urgency, 1 (highest) through 5 (lowest)"),
                )
                .arg(
                    Arg::new("category")
                        .long("category")
                        .help("Only agents of this category may claim"),
                )
                .arg(
                    Arg::new("name")
                        .long("name")
                        .help("Only the agent with this name may claim"),
                )
                .arg(
                    Arg::new("role")
                        .long("role")
                        .help("Only agents with this role may claim"),
                )
                .arg(
                    Arg::new("depends-on")
                        .long("depends-on")
                        .value_parser(clap::value_parser!(i64))
                        .help("Task that must be done before this one becomes claimable"),
                )
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("list")
                .about("List tasks")
                .arg(
                    Arg::new("status")
                        .long("status")
                        .help("Filter by state: pending, in_progress, done, blocked"),
                )
                .arg(
                    Arg::new("mine")
                        .long("mine")
                        .action(ArgAction::SetTrue)
                        .help("Only tasks claimed by the calling agent"),
                )
                .arg(agent_name_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("close")
                .about("Force-close a task, whoever holds it")
                .arg(
                    Arg::new("id")
                        .required(true)
                        .value_parser(clap::value_parser!(i64))
                        .help("Task id"),
                )
                .arg(
                    Arg::new("reason")
                        .long("reason")
                        .required(true)
                        .help("Why the task is being closed"),
                )
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("assign")
                .about("Retarget a pending task at a category, name, or role")
                .arg(
                    Arg::new("id")
                        .required(true)
                        .value_parser(clap::value_parser!(i64))
                        .help("Task id"),
                )
                .arg(Arg::new("category").long("category").help("Target category"))
                .arg(Arg::new("name").long("name").help("Target agent name"))
                .arg(Arg::new("role").long("role").help("Target role"))
                .arg(json_arg()),
        )
}

pub fn cmd_lock() -> Command {
    Command::new("lock")
        .about("Acquire, release, and list resource locks")
        .subcommand_required(true)
        .subcommand(
            Command::new("acquire")
                .about("Take exclusive locks on resource keys")
                .long_about(
                    "Acquire Resource Locks\n\
                     \n\
                     Takes exclusive advisory locks on the given keys for this\n\
                     agent's current task. Keys are normalized (separators\n\
                     unified, redundant segments dropped) so equivalent\n\
                     spellings contend for the same lock.\n\
                     \n\
                     With --wait, the agent polls each contended key until it\n\
                     frees up or the per-key timeout passes, heartbeating the\n\
                     whole time. Batches are taken in sorted key order so two\n\
                     agents wanting the same set cannot deadlock.",
                )
                .arg(
                    Arg::new("keys")
                        .required(true)
                        .num_args(1..)
                        .help("Resource keys to lock"),
                )
                .arg(
                    Arg::new("wait")
                        .long("wait")
                        .action(ArgAction::SetTrue)
                        .help("Poll until each key frees up instead of failing fast"),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .value_parser(clap::value_parser!(u64))
                        .help("Per-key wait deadline in seconds (default 300)"),
                )
                .arg(agent_name_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("release")
                .about("Release one lock")
                .arg(Arg::new("key").required(true).help("Resource key"))
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Release even if another agent holds the key"),
                )
                .arg(agent_name_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("list")
                .about("List all held locks")
                .arg(json_arg()),
        )
}

pub fn cmd_logs() -> Command {
    Command::new("logs")
        .about("Show the event trail, newest first")
        .arg(
            Arg::new("limit")
                .long("limit")
                .short('n')
                .value_parser(clap::value_parser!(i64))
                .default_value("20")
                .help("Maximum number of events"),
        )
        .arg(
            Arg::new("task")
                .long("task")
                .value_parser(clap::value_parser!(i64))
                .help("Only events touching this task"),
        )
        .arg(
            Arg::new("agent")
                .long("agent")
                .value_parser(clap::value_parser!(i64))
                .help("Only events touching this agent"),
        )
        .arg(json_arg())
}

pub fn cmd_status() -> Command {
    Command::new("status")
        .about("One-screen summary of agents, tasks, and locks")
        .arg(json_arg())
}

/// Build the top-level CLI
pub fn build_cli() -> Command {
    Command::new("hive")
        .about("Multi-agent task coordinator backed by a shared SQLite store")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(cmd_init())
        .subcommand(cmd_join())
        .subcommand(cmd_agents())
        .subcommand(cmd_start())
        .subcommand(cmd_next())
        .subcommand(cmd_done())
        .subcommand(cmd_task())
        .subcommand(cmd_lock())
        .subcommand(cmd_logs())
        .subcommand(cmd_status())
        .after_help(
            "WORKFLOW:\n  \
             hive init → hive join → hive next → [work] → hive done\n\
             \n\
             AGENTS:\n  \
             Exit codes: 0 ok, 1 user error, 2 system error, 3 not found,\n  \
             4 invalid state, 5 conflict, 6 lock timeout.\n  \
             Use --json on any subcommand for structured output.",
        )
}
