//! lean-utils: Common utilities shared across lean-client crates
//!
//! This crate provides:
//! - Unified error types ([`LeanError`], [`Result`])
//! - Logging infrastructure ([`init_logging_with_config`], [`LogConfig`])
//! - XDG-compliant path utilities ([`paths`] module)

pub mod error;
pub mod logging;
pub mod paths;

// Re-export main types at crate root for convenience
pub use error::{LeanError, Result};
pub use logging::{init_logging_with_config, LogConfig, LogOutput, LOG_ENV};

// Re-export commonly used path functions
pub use paths::{config_dir, config_file, ensure_dir, log_dir, state_dir};
