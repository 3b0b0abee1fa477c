use serde::{Deserialize, Serialize};

/// How much of the project the server should keep checked
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CheckingMode {
    Nothing,
    VisibleLines,
    VisibleLinesAndAbove,
    #[default]
    VisibleFiles,
    OpenFiles,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoiRange {
    pub begin_line: u32,
    pub end_line: u32,
}

/// Region of interest within one file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRoi {
    pub file_name: String,
    pub ranges: Vec<RoiRange>,
}

impl FileRoi {
    /// Region covering a whole file of `line_count` lines
    pub fn whole_file(file_name: impl Into<String>, line_count: u32) -> Self {
        Self {
            file_name: file_name.into(),
            ranges: vec![RoiRange {
                begin_line: 1,
                end_line: line_count.max(1),
            }],
        }
    }
}
