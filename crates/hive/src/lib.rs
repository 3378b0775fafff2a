//! Hive - multi-agent task coordinator
//!
//! A shared SQLite store through which autonomous worker agents claim
//! tasks, hold resource locks, heartbeat their liveness, and leave an
//! append-only event trail. All coordination state lives in one database
//! file; every mutation is a single transaction so concurrent agents
//! never observe partial state.

pub mod cli;
pub mod commands;
pub mod db;
pub mod session;
