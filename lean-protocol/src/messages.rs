//! Request and response types for the Lean server protocol
//!
//! Requests are sent as one JSON object per line carrying a `command` tag and
//! a `seq_num`. Responses are decoded in two stages: [`parse_response`] looks
//! only at the `response` tag and keeps `ok` payloads generic, and
//! [`CommandResponse::decode`] turns an `ok` payload into a typed value once
//! the kind of the originating request is known.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::DecodeError;
use crate::types::*;

/// Reply message sent for a `sync` whose content differs from the last one
pub const FILE_INVALIDATED: &str = "file invalidated";

/// Reply message sent for a `sync` whose content is already known
pub const FILE_UNCHANGED: &str = "file unchanged";

// ==================== Requests ====================

/// Command payload of a request, tagged by the wire `command` field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Make the server aware of a file's content. Without `content` the
    /// server reads the file from disk.
    Sync {
        file_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },

    Info {
        file_name: String,
        line: u32,
        column: u32,
    },

    Complete {
        file_name: String,
        line: u32,
        column: u32,
        #[serde(default)]
        skip_completions: bool,
    },

    Search { query: String },

    HoleCommands {
        file_name: String,
        line: u32,
        column: u32,
    },

    AllHoleCommands { file_name: String },

    Hole {
        file_name: String,
        line: u32,
        column: u32,
        action: String,
    },

    /// Set the region of interest the server keeps checked
    Roi {
        mode: CheckingMode,
        files: Vec<FileRoi>,
    },

    /// Never acknowledged by the server
    Sleep,

    /// Never acknowledged by the server
    LongSleep,
}

/// Kind of a [`Command`], without its fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Sync,
    Info,
    Complete,
    Search,
    HoleCommands,
    AllHoleCommands,
    Hole,
    Roi,
    Sleep,
    LongSleep,
}

impl CommandKind {
    /// Wire name of the command
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Sync => "sync",
            CommandKind::Info => "info",
            CommandKind::Complete => "complete",
            CommandKind::Search => "search",
            CommandKind::HoleCommands => "hole_commands",
            CommandKind::AllHoleCommands => "all_hole_commands",
            CommandKind::Hole => "hole",
            CommandKind::Roi => "roi",
            CommandKind::Sleep => "sleep",
            CommandKind::LongSleep => "long_sleep",
        }
    }

    /// Whether the server sends exactly one `ok`/`error` reply for this kind
    pub fn expects_reply(&self) -> bool {
        !matches!(self, CommandKind::Sleep | CommandKind::LongSleep)
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Command {
    pub fn sync(file_name: impl Into<String>, content: Option<String>) -> Self {
        Command::Sync {
            file_name: file_name.into(),
            content,
        }
    }

    pub fn info(file_name: impl Into<String>, line: u32, column: u32) -> Self {
        Command::Info {
            file_name: file_name.into(),
            line,
            column,
        }
    }

    pub fn complete(
        file_name: impl Into<String>,
        line: u32,
        column: u32,
        skip_completions: bool,
    ) -> Self {
        Command::Complete {
            file_name: file_name.into(),
            line,
            column,
            skip_completions,
        }
    }

    pub fn search(query: impl Into<String>) -> Self {
        Command::Search {
            query: query.into(),
        }
    }

    pub fn hole_commands(file_name: impl Into<String>, line: u32, column: u32) -> Self {
        Command::HoleCommands {
            file_name: file_name.into(),
            line,
            column,
        }
    }

    pub fn all_hole_commands(file_name: impl Into<String>) -> Self {
        Command::AllHoleCommands {
            file_name: file_name.into(),
        }
    }

    pub fn hole(
        file_name: impl Into<String>,
        line: u32,
        column: u32,
        action: impl Into<String>,
    ) -> Self {
        Command::Hole {
            file_name: file_name.into(),
            line,
            column,
            action: action.into(),
        }
    }

    pub fn roi(mode: CheckingMode, files: Vec<FileRoi>) -> Self {
        Command::Roi { mode, files }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Sync { .. } => CommandKind::Sync,
            Command::Info { .. } => CommandKind::Info,
            Command::Complete { .. } => CommandKind::Complete,
            Command::Search { .. } => CommandKind::Search,
            Command::HoleCommands { .. } => CommandKind::HoleCommands,
            Command::AllHoleCommands { .. } => CommandKind::AllHoleCommands,
            Command::Hole { .. } => CommandKind::Hole,
            Command::Roi { .. } => CommandKind::Roi,
            Command::Sleep => CommandKind::Sleep,
            Command::LongSleep => CommandKind::LongSleep,
        }
    }

    pub fn expects_reply(&self) -> bool {
        self.kind().expects_reply()
    }
}

/// A command stamped with its sequence number
///
/// `seq_num` stays 0 until the session assigns it right before the request
/// is written.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub seq_num: u64,
    pub command: Command,
}

impl Request {
    pub fn new(command: Command) -> Self {
        Self { seq_num: 0, command }
    }

    pub fn kind(&self) -> CommandKind {
        self.command.kind()
    }

    /// Serialize to a single JSON object (no trailing newline)
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(&self.command)?;
        if let Value::Object(map) = &mut value {
            map.insert("seq_num".into(), Value::from(self.seq_num));
        }
        serde_json::to_string(&value)
    }

    /// Parse a request line as the server would see it
    pub fn from_json(line: &[u8]) -> Result<Self, DecodeError> {
        let mut map = into_object(serde_json::from_slice(line)?)?;
        let seq_num = take_seq_num(&mut map)?.unwrap_or(0);
        let command = serde_json::from_value(Value::Object(map))
            .map_err(|source| DecodeError::Shape {
                shape: "request",
                source,
            })?;
        Ok(Self { seq_num, command })
    }
}

impl From<Command> for Request {
    fn from(command: Command) -> Self {
        Self::new(command)
    }
}

// ==================== Responses ====================

/// Generic `ok` reply; the payload is every field except `response` and
/// `seq_num`.
#[derive(Debug, Clone, PartialEq)]
pub struct OkResponse {
    pub seq_num: Option<u64>,
    pub payload: Map<String, Value>,
}

/// `error` reply
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub seq_num: Option<u64>,
    pub message: String,
}

/// `all_messages` broadcast: the complete current diagnostic list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllMessagesResponse {
    pub msgs: Vec<Message>,
}

/// `current_tasks` broadcast: a full snapshot of pending work
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurrentTasksResponse {
    pub is_running: bool,
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cur_task: Option<Task>,
}

/// One line from the server, classified by its `response` tag
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ok(OkResponse),
    Error(ErrorResponse),
    AllMessages(AllMessagesResponse),
    CurrentTasks(CurrentTasksResponse),
}

impl Response {
    /// Sequence number of a correlated reply; broadcasts have none
    pub fn seq_num(&self) -> Option<u64> {
        match self {
            Response::Ok(ok) => ok.seq_num,
            Response::Error(err) => err.seq_num,
            Response::AllMessages(_) | Response::CurrentTasks(_) => None,
        }
    }

    /// Wire value of the `response` field
    pub fn type_name(&self) -> &'static str {
        match self {
            Response::Ok(_) => "ok",
            Response::Error(_) => "error",
            Response::AllMessages(_) => "all_messages",
            Response::CurrentTasks(_) => "current_tasks",
        }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, Response::AllMessages(_) | Response::CurrentTasks(_))
    }
}

/// Parse one complete line from the server
pub fn parse_response(line: &[u8]) -> Result<Response, DecodeError> {
    let mut map = into_object(serde_json::from_slice(line)?)?;

    let tag = match map.remove("response") {
        Some(Value::String(tag)) => tag,
        Some(other) => {
            return Err(DecodeError::InvalidField {
                field: "response",
                reason: format!("expected a string, got {}", json_type(&other)),
            })
        }
        None => return Err(DecodeError::MissingResponse),
    };

    match tag.as_str() {
        "ok" => {
            let seq_num = take_seq_num(&mut map)?;
            Ok(Response::Ok(OkResponse {
                seq_num,
                payload: map,
            }))
        }
        "error" => {
            let seq_num = take_seq_num(&mut map)?;
            let message = match map.remove("message") {
                Some(Value::String(message)) => message,
                _ => {
                    return Err(DecodeError::MissingField {
                        response: "error",
                        field: "message",
                    })
                }
            };
            Ok(Response::Error(ErrorResponse { seq_num, message }))
        }
        "all_messages" => decode_shape("all_messages", map).map(Response::AllMessages),
        "current_tasks" => decode_shape("current_tasks", map).map(Response::CurrentTasks),
        _ => Err(DecodeError::UnknownResponse(tag)),
    }
}

// ==================== Command Responses ====================

/// Reply to `sync`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncResponse {
    pub message: String,
}

impl SyncResponse {
    /// The server will recompile and later broadcast task snapshots
    pub fn is_invalidated(&self) -> bool {
        self.message == FILE_INVALIDATED
    }

    pub fn is_unchanged(&self) -> bool {
        self.message == FILE_UNCHANGED
    }
}

/// Reply to `info`; a bare `ok` means nothing is known at that position
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InfoResponse {
    #[serde(default)]
    pub record: Option<InfoRecord>,
}

/// Reply to `complete`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompleteResponse {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub completions: Vec<CompletionCandidate>,
}

/// Reply to `search`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchItem>,
}

/// Reply to `all_hole_commands`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllHoleCommandsResponse {
    #[serde(default)]
    pub holes: Vec<HoleCommands>,
}

/// Reply to `hole`; both fields are absent when the action had no output
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HoleResponse {
    #[serde(default)]
    pub replacements: Option<HoleReplacements>,
    #[serde(default)]
    pub message: Option<String>,
}

/// An `ok` reply decoded according to the command that caused it
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResponse {
    Sync(SyncResponse),
    Info(InfoResponse),
    Complete(CompleteResponse),
    Search(SearchResponse),
    HoleCommands(HoleCommands),
    AllHoleCommands(AllHoleCommandsResponse),
    Hole(HoleResponse),
    /// Replies that carry nothing beyond the acknowledgement (`roi`)
    Ack,
}

impl CommandResponse {
    /// Decode an `ok` payload for a request of the given kind
    pub fn decode(kind: CommandKind, payload: Map<String, Value>) -> Result<Self, DecodeError> {
        let name = kind.as_str();
        Ok(match kind {
            CommandKind::Sync => CommandResponse::Sync(decode_shape(name, payload)?),
            CommandKind::Info => CommandResponse::Info(decode_shape(name, payload)?),
            CommandKind::Complete => CommandResponse::Complete(decode_shape(name, payload)?),
            CommandKind::Search => CommandResponse::Search(decode_shape(name, payload)?),
            CommandKind::HoleCommands => {
                CommandResponse::HoleCommands(decode_shape(name, payload)?)
            }
            CommandKind::AllHoleCommands => {
                CommandResponse::AllHoleCommands(decode_shape(name, payload)?)
            }
            CommandKind::Hole => CommandResponse::Hole(decode_shape(name, payload)?),
            CommandKind::Roi | CommandKind::Sleep | CommandKind::LongSleep => {
                CommandResponse::Ack
            }
        })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            CommandResponse::Sync(_) => "sync",
            CommandResponse::Info(_) => "info",
            CommandResponse::Complete(_) => "complete",
            CommandResponse::Search(_) => "search",
            CommandResponse::HoleCommands(_) => "hole_commands",
            CommandResponse::AllHoleCommands(_) => "all_hole_commands",
            CommandResponse::Hole(_) => "hole",
            CommandResponse::Ack => "ack",
        }
    }
}

// ==================== Helpers ====================

fn into_object(value: Value) -> Result<Map<String, Value>, DecodeError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DecodeError::NotAnObject(json_type(&other))),
    }
}

fn take_seq_num(map: &mut Map<String, Value>) -> Result<Option<u64>, DecodeError> {
    match map.remove("seq_num") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| DecodeError::InvalidField {
            field: "seq_num",
            reason: format!("{} is not an unsigned integer", n),
        }),
        Some(other) => Err(DecodeError::InvalidField {
            field: "seq_num",
            reason: format!("expected a number, got {}", json_type(&other)),
        }),
    }
}

fn decode_shape<T: serde::de::DeserializeOwned>(
    shape: &'static str,
    map: Map<String, Value>,
) -> Result<T, DecodeError> {
    serde_json::from_value(Value::Object(map)).map_err(|source| DecodeError::Shape { shape, source })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request_json(command: Command, seq_num: u64) -> Value {
        let line = Request { seq_num, command }.to_json().unwrap();
        serde_json::from_str(&line).unwrap()
    }

    fn ok_payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("Expected an object"),
        }
    }

    // ==================== Request Serialization Tests ====================

    #[test]
    fn test_sync_request_with_content() {
        let json = request_json(Command::sync("test.lean", Some("--".into())), 1);
        assert_eq!(
            json,
            json!({"command": "sync", "file_name": "test.lean", "content": "--", "seq_num": 1})
        );
    }

    #[test]
    fn test_sync_request_without_content_omits_field() {
        let line = Request {
            seq_num: 1,
            command: Command::sync("test.lean", None),
        }
        .to_json()
        .unwrap();

        assert!(!line.contains("content"));
        assert!(!line.contains("null"));
        assert_eq!(
            serde_json::from_str::<Value>(&line).unwrap(),
            json!({"command": "sync", "file_name": "test.lean", "seq_num": 1})
        );
    }

    #[test]
    fn test_sync_request_with_empty_content_keeps_field() {
        let json = request_json(Command::sync("test.lean", Some(String::new())), 3);
        assert_eq!(json["content"], "");
    }

    #[test]
    fn test_info_request() {
        let json = request_json(Command::info("test.lean", 1, 25), 2);
        assert_eq!(
            json,
            json!({"command": "info", "file_name": "test.lean", "line": 1, "column": 25, "seq_num": 2})
        );
    }

    #[test]
    fn test_complete_request() {
        let json = request_json(Command::complete("test.lean", 3, 4, true), 5);
        assert_eq!(
            json,
            json!({
                "command": "complete", "file_name": "test.lean", "line": 3,
                "column": 4, "skip_completions": true, "seq_num": 5
            })
        );
    }

    #[test]
    fn test_hole_requests() {
        assert_eq!(
            request_json(Command::hole_commands("h.lean", 2, 7), 1),
            json!({"command": "hole_commands", "file_name": "h.lean", "line": 2, "column": 7, "seq_num": 1})
        );
        assert_eq!(
            request_json(Command::all_hole_commands("h.lean"), 2),
            json!({"command": "all_hole_commands", "file_name": "h.lean", "seq_num": 2})
        );
        assert_eq!(
            request_json(Command::hole("h.lean", 2, 7, "Use"), 3),
            json!({
                "command": "hole", "file_name": "h.lean", "line": 2,
                "column": 7, "action": "Use", "seq_num": 3
            })
        );
    }

    #[test]
    fn test_roi_request() {
        let json = request_json(
            Command::roi(
                CheckingMode::VisibleLinesAndAbove,
                vec![FileRoi {
                    file_name: "a.lean".into(),
                    ranges: vec![RoiRange {
                        begin_line: 1,
                        end_line: 40,
                    }],
                }],
            ),
            4,
        );
        assert_eq!(
            json,
            json!({
                "command": "roi",
                "mode": "visible-lines-and-above",
                "files": [{"file_name": "a.lean", "ranges": [{"begin_line": 1, "end_line": 40}]}],
                "seq_num": 4
            })
        );
    }

    #[test]
    fn test_sleep_requests() {
        assert_eq!(
            request_json(Command::Sleep, 2),
            json!({"command": "sleep", "seq_num": 2})
        );
        assert_eq!(
            request_json(Command::LongSleep, 4),
            json!({"command": "long_sleep", "seq_num": 4})
        );
    }

    #[test]
    fn test_request_round_trip() {
        let commands = vec![
            Command::sync("a.lean", None),
            Command::sync("a.lean", Some("example : true := trivial".into())),
            Command::info("a.lean", 1, 0),
            Command::complete("a.lean", 1, 2, false),
            Command::search("add_comm"),
            Command::hole_commands("a.lean", 4, 5),
            Command::all_hole_commands("a.lean"),
            Command::hole("a.lean", 4, 5, "Split"),
            Command::roi(CheckingMode::Nothing, vec![]),
            Command::Sleep,
            Command::LongSleep,
        ];

        for (i, command) in commands.into_iter().enumerate() {
            let request = Request {
                seq_num: i as u64 + 1,
                command,
            };
            let line = request.to_json().unwrap();
            let parsed = Request::from_json(line.as_bytes()).unwrap();
            assert_eq!(parsed, request, "round trip failed for {}", line);
        }
    }

    #[test]
    fn test_request_starts_unsequenced() {
        let request = Request::new(Command::search("x"));
        assert_eq!(request.seq_num, 0);
        assert_eq!(request.kind(), CommandKind::Search);
    }

    #[test]
    fn test_command_kind_expects_reply() {
        assert!(!Command::Sleep.expects_reply());
        assert!(!Command::LongSleep.expects_reply());
        assert!(Command::sync("a.lean", None).expects_reply());
        assert!(Command::roi(CheckingMode::OpenFiles, vec![]).expects_reply());
    }

    #[test]
    fn test_command_kind_names_match_wire_tags() {
        let commands = [
            Command::sync("a", None),
            Command::info("a", 1, 1),
            Command::complete("a", 1, 1, false),
            Command::search("q"),
            Command::hole_commands("a", 1, 1),
            Command::all_hole_commands("a"),
            Command::hole("a", 1, 1, "x"),
            Command::roi(CheckingMode::Nothing, vec![]),
            Command::Sleep,
            Command::LongSleep,
        ];
        for command in commands {
            let json = serde_json::to_value(&command).unwrap();
            assert_eq!(json["command"], command.kind().as_str());
        }
    }

    // ==================== parse_response Tests ====================

    #[test]
    fn test_parse_generic_ok() {
        let resp = parse_response(br#"{"response":"ok","seq_num":3}"#).unwrap();
        assert_eq!(
            resp,
            Response::Ok(OkResponse {
                seq_num: Some(3),
                payload: Map::new(),
            })
        );
        assert_eq!(resp.seq_num(), Some(3));
        assert!(!resp.is_broadcast());
    }

    #[test]
    fn test_parse_ok_keeps_payload_generic() {
        let resp = parse_response(
            b"{\"record\":{\"state\":\"\xe2\x8a\xa2 true\"},\"response\":\"ok\",\"seq_num\":2}",
        )
        .unwrap();
        match resp {
            Response::Ok(ok) => {
                assert_eq!(ok.seq_num, Some(2));
                assert_eq!(ok.payload.len(), 1);
                assert_eq!(ok.payload["record"]["state"], "⊢ true");
            }
            other => panic!("Expected Ok, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_response() {
        let resp = parse_response(
            br#"{"message":"file 'x' not found","response":"error","seq_num":2}"#,
        )
        .unwrap();
        assert_eq!(
            resp,
            Response::Error(ErrorResponse {
                seq_num: Some(2),
                message: "file 'x' not found".into(),
            })
        );
    }

    #[test]
    fn test_parse_error_without_seq_num() {
        let resp = parse_response(br#"{"message":"unknown command","response":"error"}"#).unwrap();
        assert_eq!(resp.seq_num(), None);
    }

    #[test]
    fn test_parse_error_missing_message() {
        let err = parse_response(br#"{"response":"error","seq_num":2}"#).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MissingField {
                response: "error",
                field: "message"
            }
        ));
    }

    #[test]
    fn test_parse_current_tasks() {
        let resp = parse_response(
            br#"{"is_running":true,"response":"current_tasks","tasks":[
                {"desc":"elaborating","end_pos_col":3,"end_pos_line":4,
                 "file_name":"a.lean","pos_col":0,"pos_line":1,"extra":[1,2]}],
                "cur_task":{"desc":"elaborating","end_pos_col":3,"end_pos_line":4,
                 "file_name":"a.lean","pos_col":0,"pos_line":1}}"#,
        )
        .unwrap();
        match resp {
            Response::CurrentTasks(tasks) => {
                assert!(tasks.is_running);
                assert_eq!(tasks.tasks.len(), 1);
                assert_eq!(tasks.tasks[0].desc, "elaborating");
                assert!(tasks.cur_task.is_some());
            }
            other => panic!("Expected CurrentTasks, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty_current_tasks() {
        let resp =
            parse_response(br#"{"is_running":false,"response":"current_tasks","tasks":[]}"#)
                .unwrap();
        assert_eq!(
            resp,
            Response::CurrentTasks(CurrentTasksResponse {
                is_running: false,
                tasks: vec![],
                cur_task: None,
            })
        );
        assert!(resp.is_broadcast());
        assert_eq!(resp.seq_num(), None);
    }

    #[test]
    fn test_parse_all_messages_ignores_unknown_fields() {
        let resp = parse_response(
            br#"{"msgs":[{"caption":"","file_name":"a.lean","pos_col":0,"pos_line":1,
                "severity":"warning","text":"declaration uses sorry","new_field":{"x":1}}],
                "response":"all_messages","server_version":"3.51"}"#,
        )
        .unwrap();
        match resp {
            Response::AllMessages(all) => {
                assert_eq!(all.msgs.len(), 1);
                assert_eq!(all.msgs[0].severity, Severity::Warning);
            }
            other => panic!("Expected AllMessages, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_missing_response_field() {
        let err = parse_response(br#"{"seq_num":1}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingResponse));
    }

    #[test]
    fn test_parse_unknown_response_kind() {
        let err = parse_response(br#"{"response":"widget_update"}"#).unwrap_err();
        match err {
            DecodeError::UnknownResponse(kind) => assert_eq!(kind, "widget_update"),
            other => panic!("Expected UnknownResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_broadcast_missing_required_field() {
        let err = parse_response(br#"{"response":"current_tasks","tasks":[]}"#).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Shape {
                shape: "current_tasks",
                ..
            }
        ));
    }

    #[test]
    fn test_parse_non_object() {
        assert!(matches!(
            parse_response(b"[1,2]").unwrap_err(),
            DecodeError::NotAnObject(_)
        ));
    }

    #[test]
    fn test_parse_malformed_json() {
        assert!(matches!(
            parse_response(br#"{"response":"ok""#).unwrap_err(),
            DecodeError::Json(_)
        ));
    }

    #[test]
    fn test_parse_invalid_seq_num() {
        let err = parse_response(br#"{"response":"ok","seq_num":"two"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidField { field: "seq_num", .. }));
    }

    // ==================== CommandResponse Tests ====================

    #[test]
    fn test_decode_sync_invalidated() {
        let resp = CommandResponse::decode(
            CommandKind::Sync,
            ok_payload(json!({"message": "file invalidated"})),
        )
        .unwrap();
        match resp {
            CommandResponse::Sync(sync) => {
                assert!(sync.is_invalidated());
                assert!(!sync.is_unchanged());
            }
            other => panic!("Expected Sync, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_sync_requires_message() {
        let err = CommandResponse::decode(CommandKind::Sync, Map::new()).unwrap_err();
        assert!(matches!(err, DecodeError::Shape { shape: "sync", .. }));
    }

    #[test]
    fn test_decode_bare_ok_depends_on_kind() {
        assert_eq!(
            CommandResponse::decode(CommandKind::Info, Map::new()).unwrap(),
            CommandResponse::Info(InfoResponse { record: None })
        );
        assert_eq!(
            CommandResponse::decode(CommandKind::Hole, Map::new()).unwrap(),
            CommandResponse::Hole(HoleResponse::default())
        );
        assert_eq!(
            CommandResponse::decode(CommandKind::Roi, Map::new()).unwrap(),
            CommandResponse::Ack
        );
    }

    #[test]
    fn test_decode_info_with_record() {
        let resp = CommandResponse::decode(
            CommandKind::Info,
            ok_payload(json!({
                "record": {
                    "full-id": "max",
                    "source": {"column": 11, "file": "functions.lean", "line": 12},
                    "type": "Π {α : Type u} [_inst_1 : decidable_linear_order α], α → α → α"
                }
            })),
        )
        .unwrap();
        match resp {
            CommandResponse::Info(info) => {
                let record = info.record.unwrap();
                assert_eq!(record.full_id.as_deref(), Some("max"));
                assert_eq!(record.source.unwrap().column, Some(11));
            }
            other => panic!("Expected Info, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_complete() {
        let resp = CommandResponse::decode(
            CommandKind::Complete,
            ok_payload(json!({
                "prefix": "nat.ad",
                "completions": [{"text": "nat.add", "type": "ℕ → ℕ → ℕ"}]
            })),
        )
        .unwrap();
        match resp {
            CommandResponse::Complete(complete) => {
                assert_eq!(complete.prefix, "nat.ad");
                assert_eq!(complete.completions[0].ty.as_deref(), Some("ℕ → ℕ → ℕ"));
            }
            other => panic!("Expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_results_shape_depends_on_kind() {
        let search = CommandResponse::decode(
            CommandKind::Search,
            ok_payload(json!({"results": [{"text": "nat.add_comm", "type": "∀ n m, n + m = m + n"}]})),
        )
        .unwrap();
        assert!(matches!(search, CommandResponse::Search(ref s) if s.results.len() == 1));

        let holes = CommandResponse::decode(
            CommandKind::HoleCommands,
            ok_payload(json!({
                "file_name": "h.lean",
                "start": {"line": 2, "column": 3},
                "end": {"line": 2, "column": 10},
                "results": [{"name": "Use", "description": "Try this"}]
            })),
        )
        .unwrap();
        match holes {
            CommandResponse::HoleCommands(hc) => {
                assert_eq!(hc.start, Position { line: 2, column: 3 });
                assert_eq!(hc.results[0].name, "Use");
            }
            other => panic!("Expected HoleCommands, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_all_hole_commands() {
        let resp = CommandResponse::decode(
            CommandKind::AllHoleCommands,
            ok_payload(json!({
                "holes": [{
                    "file_name": "h.lean",
                    "start": {"line": 1, "column": 0},
                    "end": {"line": 1, "column": 5},
                    "results": []
                }]
            })),
        )
        .unwrap();
        assert!(matches!(resp, CommandResponse::AllHoleCommands(ref a) if a.holes.len() == 1));
    }

    #[test]
    fn test_decode_hole_replacements() {
        let resp = CommandResponse::decode(
            CommandKind::Hole,
            ok_payload(json!({
                "replacements": {
                    "file_name": "h.lean",
                    "start": {"line": 1, "column": 0},
                    "end": {"line": 1, "column": 5},
                    "alternatives": [{"code": "trivial", "description": ""}]
                },
                "message": "Use"
            })),
        )
        .unwrap();
        match resp {
            CommandResponse::Hole(hole) => {
                assert_eq!(hole.replacements.unwrap().alternatives[0].code, "trivial");
                assert_eq!(hole.message.as_deref(), Some("Use"));
            }
            other => panic!("Expected Hole, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_hole_commands_missing_field() {
        let err = CommandResponse::decode(
            CommandKind::HoleCommands,
            ok_payload(json!({"file_name": "h.lean", "results": []})),
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::Shape { shape: "hole_commands", .. }));
    }
}
