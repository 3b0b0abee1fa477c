//! Async client for the Lean 3 `--server` protocol
//!
//! Start a [`Session`], bring a file up to date with
//! [`Session::full_sync`], then query it:
//!
//! ```no_run
//! use lean_client::{ServerConfig, Session};
//!
//! # async fn example() -> lean_client::Result<()> {
//! let session = Session::new(ServerConfig::load());
//! session.start().await?;
//! session.full_sync("test.lean", None).await?;
//! println!("{}", session.state("test.lean", 3, 0).await?);
//! session.kill()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod correlator;
pub mod session;

pub use config::{ServerConfig, StderrMode, COMMAND_ENV};
pub use correlator::{Correlator, PendingReply};
pub use session::{Readiness, Session, SessionEvent, SessionStatus};

pub use lean_protocol as protocol;
pub use lean_utils::{LeanError, Result};
