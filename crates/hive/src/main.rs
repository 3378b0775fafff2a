//! Hive CLI - multi-agent task coordinator
//!
//! Binary name: `hive`

use std::process;

use hive::cli::{format_error, run_cli};

#[tokio::main]
async fn main() {
    // Logging goes to stderr so stdout stays parseable for --json consumers
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run_cli().await {
        #[allow(clippy::print_stderr)]
        {
            eprintln!("Error: {}", format_error(&err));
        }

        let code = err
            .downcast_ref::<hive_core::Error>()
            .map(hive_core::Error::exit_code)
            .unwrap_or(1);

        #[allow(clippy::exit)]
        process::exit(code);
    }
}
