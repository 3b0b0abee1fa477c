//! lean-protocol: Wire definitions for the Lean server protocol
//!
//! This crate defines the request and response types exchanged with a
//! `lean --server` process over its stdin/stdout, along with the line framing
//! and JSON codec used on both directions of the pipe.

pub mod codec;
pub mod framer;
pub mod messages;
pub mod types;

// Re-export main types at crate root
pub use codec::{ClientCodec, CodecError, DecodeError, ServerCodec};
pub use framer::{Framer, MAX_LINE_LENGTH};
pub use messages::{
    parse_response, AllHoleCommandsResponse, AllMessagesResponse, Command, CommandKind,
    CommandResponse, CompleteResponse, CurrentTasksResponse, ErrorResponse, HoleResponse,
    InfoResponse, OkResponse, Request, Response, SearchResponse, SyncResponse, FILE_INVALIDATED,
    FILE_UNCHANGED,
};
pub use types::{
    CheckingMode, CompletionCandidate, FileRoi, HoleCommandAction, HoleCommands,
    HoleReplacementAlternative, HoleReplacements, InfoRecord, InfoSource, Message, Position,
    RoiRange, SearchItem, Severity, Task,
};

/// Flag appended to the configured command to start the server
pub const SERVER_FLAG: &str = "--server";
