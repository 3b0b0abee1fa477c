//! CLI argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Query a Lean 3 server from the command line
#[derive(Parser, Debug)]
#[command(name = "lean-client")]
#[command(about = "Query a Lean 3 server from the command line")]
#[command(version)]
pub struct Cli {
    /// Server command, overriding the config file
    ///
    /// Split on whitespace; `--server` is appended.
    /// Example: "elan run stable lean"
    #[arg(long)]
    pub lean: Option<String>,

    /// Working directory of the server
    #[arg(short = 'C', long)]
    pub cwd: Option<PathBuf>,

    /// Log every line exchanged with the server to stderr
    #[arg(long)]
    pub trace: bool,

    /// Append logs to lean-client.log in the state directory instead of stderr
    #[arg(long)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Print the proof state at a position
    State {
        file: PathBuf,
        /// 1-based line
        line: u32,
        /// 0-based column
        column: u32,
    },

    /// Print the proof state before and after every line of a file
    States { file: PathBuf },

    /// Check a file and print its diagnostics
    Messages { file: PathBuf },

    /// Search declarations by name
    Search { query: String },

    /// Print what the server knows about a position, as JSON
    Info {
        file: PathBuf,
        line: u32,
        column: u32,
    },
}
