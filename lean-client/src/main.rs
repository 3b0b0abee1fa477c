//! lean-client: run one query against a Lean 3 server

mod cli;
mod commands;

use clap::Parser;
use cli::Cli;
use lean_utils::{init_logging_with_config, LogConfig, LogOutput};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = match (cli.trace, cli.log_file) {
        (true, false) => LogConfig::wire_trace(),
        (true, true) => LogConfig {
            output: LogOutput::File,
            ..LogConfig::wire_trace()
        },
        (false, true) => LogConfig::service(),
        (false, false) => LogConfig::cli(),
    };
    if let Err(e) = init_logging_with_config(log_config) {
        eprintln!("lean-client: {}", e);
    }

    let exit_code = match commands::execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("lean-client: {}", e);
            1
        }
    };

    std::process::exit(exit_code);
}
