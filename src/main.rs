//! costscope - Cloud cost and orphaned resource reporting service
//!
//! CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use clap::{CommandFactory, Parser};
use std::process::ExitCode;

use costscope::cli::{Cli, Commands};
use costscope::core::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = cli
        .log_level
        .as_deref()
        .and_then(logging::LogLevel::from_arg)
        .or_else(|| logging::parse_log_level_from_env().map(logging::LogLevel::from_tracing_level))
        .unwrap_or_default();
    let log_format = if cli.json_output {
        logging::LogFormat::Json
    } else {
        logging::parse_log_format_from_env().unwrap_or_default()
    };
    let log_file = logging::parse_log_file_from_env();
    logging::init(log_level, log_format, log_file, cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> costscope::Result<()> {
    let pretty = cli.pretty;

    match cli.command {
        None => {
            print_quickstart();
            Ok(())
        }

        Some(Commands::Serve(args)) => costscope::cli::execute_serve(&args).await,

        Some(Commands::Analyze(args)) => costscope::cli::execute_analyze(&args, pretty).await,

        Some(Commands::Cost(args)) => costscope::cli::execute_cost(&args, pretty).await,

        Some(Commands::Completions { shell }) => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "costscope",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

/// Print quickstart help when no command is given.
fn print_quickstart() {
    println!(
        r#"costscope - Cloud cost and orphaned resource reporting service

Find orphaned resources and query spend across your subscriptions.

USAGE:
    costscope [OPTIONS] <COMMAND>

COMMANDS:
    serve       Run the HTTP API server
    analyze     Run an inventory query and print the JSON response
    cost        Run a cost query and print the JSON response

QUICK START:
    costscope serve                                   # Serve the JSON API
    costscope analyze --subscription-id <ID>          # Orphaned resources in one subscription
    costscope analyze                                 # Tenant-wide analysis
    costscope cost --subscription-id <ID> --top-n 10  # Most expensive resources

Set COSTSCOPE_ACCESS_TOKEN to a management API token before running queries.

For more help: costscope --help
"#
    );

    println!("Version: {}", env!("CARGO_PKG_VERSION"));
}
