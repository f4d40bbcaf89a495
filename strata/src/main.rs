//! Entrypoint of the strata binary
#![warn(
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr,
    clippy::future_not_send
)]

use dotenvy::dotenv;
use trogging::{
    TroggingGuard,
    cli::LoggingConfigBuilderExt,
    tracing_subscriber::{Registry, prelude::*},
};

mod commands {
    pub(crate) mod common;
    pub(crate) mod plan;
    pub(crate) mod query;
    pub(crate) mod validate;
    pub(crate) mod watch;
}

enum ReturnCode {
    Failure = 1,
}

#[derive(Debug, clap::Parser)]
#[clap(
    name = "strata",
    version,
    about = "Routes logical queries to the tables and endpoints that answer them",
    long_about = r#"Routes logical queries to the physical tables and backend endpoints that answer them

Examples:
    # Check a catalog definition
    strata validate --catalog catalog.json

    # Show which tables and endpoints a query would use
    strata plan --catalog catalog.json --availability segments.json \
        --backend-endpoint broker=http://localhost:8082 \
        --table wiki --granularity day --interval 2024-01-01/2024-01-02 \
        --dimension country --metric added

    # Keep availability current and log every refresh
    strata watch -v --catalog catalog.json --availability segments.json
"#
)]
struct Config {
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, clap::Parser)]
#[allow(clippy::large_enum_variant)]
enum Command {
    /// Load a catalog definition and summarise it
    Validate(commands::validate::Config),

    /// Resolve a query and print the backend queries it turns into
    Plan(commands::plan::Config),

    /// Resolve and run a query against recorded backend responses
    Query(commands::query::Config),

    /// Refresh availability on an interval until interrupted
    Watch(commands::watch::Config),
}

fn main() -> Result<(), std::io::Error> {
    // load all environment variables from .env before doing anything
    load_dotenv();

    let config: Config = clap::Parser::parse();

    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    tokio_runtime.block_on(async move {
        fn handle_init_logs(r: Result<TroggingGuard, trogging::Error>) -> TroggingGuard {
            match r {
                Ok(guard) => guard,
                Err(e) => {
                    eprintln!("Initializing logs failed: {e}");
                    std::process::exit(ReturnCode::Failure as _);
                }
            }
        }

        match config.command {
            None => println!("command required, -h/--help for help"),
            Some(Command::Validate(config)) => {
                if let Err(e) = commands::validate::command(config) {
                    eprintln!("Validate command failed: {e}");
                    std::process::exit(ReturnCode::Failure as _)
                }
            }
            Some(Command::Plan(config)) => {
                let _tracing_guard =
                    handle_init_logs(init_logs_and_tracing(&config.router.logging_config));
                if let Err(e) = commands::plan::command(config).await {
                    eprintln!("Plan command failed: {e}");
                    std::process::exit(ReturnCode::Failure as _)
                }
            }
            Some(Command::Query(config)) => {
                let _tracing_guard =
                    handle_init_logs(init_logs_and_tracing(&config.router.logging_config));
                if let Err(e) = commands::query::command(config).await {
                    eprintln!("Query command failed: {e}");
                    std::process::exit(ReturnCode::Failure as _)
                }
            }
            Some(Command::Watch(config)) => {
                let _tracing_guard =
                    handle_init_logs(init_logs_and_tracing(&config.logging_config));
                if let Err(e) = commands::watch::command(config).await {
                    eprintln!("Watch command failed: {e}");
                    std::process::exit(ReturnCode::Failure as _)
                }
            }
        }
    });

    Ok(())
}

/// Source the .env file before initialising the Config struct - this sets
/// any envs in the file, which the Config struct then uses.
///
/// Precedence is given to existing env variables.
fn load_dotenv() {
    match dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            // Ignore this - a missing env file is not an error, defaults will
            // be applied when initialising the Config struct.
        }
        Err(e) => {
            eprintln!("FATAL Error loading config from: {e}");
            eprintln!("Aborting");
            std::process::exit(ReturnCode::Failure as _);
        }
    };
}

fn init_logs_and_tracing(
    config: &trogging::cli::LoggingConfig,
) -> Result<TroggingGuard, trogging::Error> {
    let log_layer = trogging::Builder::new()
        .with_default_log_filter("info")
        .with_logging_config(config)
        .build()?;

    let subscriber = Registry::default().with(log_layer);
    trogging::install_global(subscriber)
}
