//! Command-line interface: argument definitions and dispatch.

pub mod args;
pub mod handlers;

pub use handlers::{format_error, run_cli};
