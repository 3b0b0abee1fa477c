use serde::{Deserialize, Serialize};

/// A (line, column) pair as used by hole replies
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HoleCommandAction {
    pub name: String,
    pub description: String,
}

/// Actions available for one hole `{! ... !}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HoleCommands {
    pub file_name: String,
    pub start: Position,
    pub end: Position,
    pub results: Vec<HoleCommandAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HoleReplacementAlternative {
    pub code: String,
    pub description: String,
}

/// Candidate replacements produced by running a hole action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HoleReplacements {
    pub file_name: String,
    pub start: Position,
    pub end: Position,
    pub alternatives: Vec<HoleReplacementAlternative>,
}
