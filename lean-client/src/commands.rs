//! Command implementations

use std::path::Path;

use lean_client::protocol::Message;
use lean_client::{LeanError, Result, ServerConfig, Session};

use crate::cli::{Cli, Command};

/// Start a server, run one command against it, and stop the server
pub async fn execute(cli: Cli) -> Result<i32> {
    let mut config = ServerConfig::load().with_command_override(cli.lean.as_deref());
    if let Some(dir) = cli.cwd {
        config = config.with_working_dir(dir);
    }

    let session = Session::new(config);
    session.start().await?;

    let result = run(&session, cli.command).await;

    if let Err(e) = session.kill() {
        tracing::debug!(error = %e, "Server was already gone");
    }
    result
}

async fn run(session: &Session, command: Command) -> Result<i32> {
    match command {
        Command::State { file, line, column } => {
            let file = file_name(&file);
            session.full_sync(file.as_str(), None).await?;
            println!("{}", session.state(file, line, column).await?);
            Ok(0)
        }

        Command::States { file } => states(session, &file).await,

        Command::Messages { file } => {
            session.full_sync(file_name(&file), None).await?;
            let messages = session.messages();
            for message in &messages {
                println!("{}", format_message(message));
            }
            Ok(if messages.iter().any(Message::is_error) { 1 } else { 0 })
        }

        Command::Search { query } => {
            for item in session.search(query).await?.results {
                println!("{} : {}", item.text, item.ty);
            }
            Ok(0)
        }

        Command::Info { file, line, column } => {
            let file = file_name(&file);
            session.full_sync(file.as_str(), None).await?;
            let info = session.info(file, line, column).await?;
            let json = serde_json::to_string_pretty(&info)
                .map_err(|e| LeanError::internal(format!("Failed to format info: {}", e)))?;
            println!("{}", json);
            Ok(0)
        }
    }
}

/// Print the state at the start and end of every line that has one
async fn states(session: &Session, path: &Path) -> Result<i32> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| LeanError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
    let file = file_name(path);
    session.full_sync(file.as_str(), None).await?;

    for (index, line) in text.lines().enumerate() {
        let line_number = index as u32 + 1;
        let before = session.state(file.as_str(), line_number, 0).await?;
        let after = session
            .state(file.as_str(), line_number, line_width(line))
            .await?;
        if before.is_empty() && after.is_empty() {
            continue;
        }
        println!("Line {}: {}", line_number, line);
        println!("State before:\n{}\n", before);
        println!("State after:\n{}\n", after);
    }
    Ok(0)
}

fn file_name(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Column of the end of a line; the server counts characters, not bytes
fn line_width(line: &str) -> u32 {
    line.chars().count() as u32
}

fn format_message(message: &Message) -> String {
    let location = format!(
        "{}:{}:{}",
        message.file_name, message.pos_line, message.pos_col
    );
    if message.caption.is_empty() {
        format!("{}: {}: {}", location, message.severity, message.text)
    } else {
        format!(
            "{}: {}: {}: {}",
            location, message.severity, message.caption, message.text
        )
    }
}
