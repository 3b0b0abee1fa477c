use serde::{Deserialize, Serialize};

// ==================== Severity ====================

/// Severity of a diagnostic reported by the server
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Information,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Information => "information",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==================== Message ====================

/// A diagnostic from an `all_messages` broadcast
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub file_name: String,
    pub severity: Severity,
    #[serde(default)]
    pub caption: String,
    pub text: String,
    pub pos_line: u32,
    pub pos_col: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_pos_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_pos_col: Option<u32>,
}

impl Message {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// End position, when the server reported one
    pub fn end_pos(&self) -> Option<(u32, u32)> {
        match (self.end_pos_line, self.end_pos_col) {
            (Some(line), Some(col)) => Some((line, col)),
            _ => None,
        }
    }
}

// ==================== Task ====================

/// A unit of in-progress elaboration work from a `current_tasks` broadcast
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub file_name: String,
    pub pos_line: u32,
    pub pos_col: u32,
    pub end_pos_line: u32,
    pub end_pos_col: u32,
    pub desc: String,
}
