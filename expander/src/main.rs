//! Expander Main Entry Point
//!
//! Consumes this node's share of the vnode queues and indexes every object
//! change command into the configured sinks.

use clap::Parser;
use dotenv::dotenv;
use expander::{Cli, Config, Dependencies, IndexingError};
use std::env;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging.
///
/// `RUST_LOG` overrides the configured level.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config.log_level.as_filter();
        EnvFilter::new(format!(
            "expander={level},expander_repository={level},expander_shared={level},warn"
        ))
    });

    let json = env::var("EXPANDER_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .init();
    }
}

async fn run(config: Config) -> Result<(), IndexingError> {
    let deps = match Dependencies::new(&config).await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    match deps.orchestrator.run().await {
        Ok(()) => {
            info!("Expander stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Expander failed");
            Err(e.into())
        }
    }
}

fn main() -> ExitCode {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.help {
        println!("{}", Cli::usage());
        return ExitCode::FAILURE;
    }
    if cli.version {
        println!("expander {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", IndexingError::from(e));
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config);

    info!(
        service_name = "expander",
        service_version = env!("CARGO_PKG_VERSION"),
        ps_tag = %config.ps_tag,
        config_file = ?config.config_file,
        log_level = %config.log_level,
        "Starting expander"
    );

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
