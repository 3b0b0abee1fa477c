use serde::{Deserialize, Serialize};

/// Where a declaration was defined
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InfoSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Everything the server knows about a position: identifier info and/or the
/// tactic state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InfoRecord {
    #[serde(rename = "full-id", default, skip_serializing_if = "Option::is_none")]
    pub full_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<InfoSource>,
    /// Goal state, when the position is inside a tactic block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tactic_param_idx: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tactic_params: Option<Vec<String>>,
}

/// One auto-completion candidate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionCandidate {
    pub text: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tactic_params: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

/// One declaration matching a search query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchItem {
    pub text: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<InfoSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_record_renamed_fields() {
        let record: InfoRecord = serde_json::from_str(
            r#"{"full-id":"max","type":"Π {α : Type u}, α → α → α",
                "source":{"column":11,"file":"init/algebra/functions.lean","line":12}}"#,
        )
        .unwrap();

        assert_eq!(record.full_id.as_deref(), Some("max"));
        assert_eq!(record.ty.as_deref(), Some("Π {α : Type u}, α → α → α"));
        let source = record.source.unwrap();
        assert_eq!(source.column, Some(11));
        assert_eq!(source.line, Some(12));
        assert_eq!(record.state, None);
    }

    #[test]
    fn test_info_record_state_only() {
        let record: InfoRecord = serde_json::from_str(r#"{"state":"⊢ true"}"#).unwrap();
        assert_eq!(record.state.as_deref(), Some("⊢ true"));
        assert_eq!(record.full_id, None);
    }

    #[test]
    fn test_info_record_serializes_wire_names() {
        let record = InfoRecord {
            full_id: Some("nat.succ".into()),
            ty: Some("ℕ → ℕ".into()),
            ..InfoRecord::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["full-id"], "nat.succ");
        assert_eq!(json["type"], "ℕ → ℕ");
        assert!(json.get("doc").is_none());
    }

    #[test]
    fn test_completion_candidate_type_optional() {
        let cdt: CompletionCandidate =
            serde_json::from_str(r#"{"text":"nat.add","tactic_params":["e"]}"#).unwrap();
        assert_eq!(cdt.ty, None);
        assert_eq!(cdt.tactic_params, Some(vec!["e".to_string()]));
    }

    #[test]
    fn test_search_item_requires_type() {
        let ok: SearchItem =
            serde_json::from_str(r#"{"text":"nat.add_comm","type":"∀ n m, n + m = m + n"}"#)
                .unwrap();
        assert_eq!(ok.text, "nat.add_comm");

        assert!(serde_json::from_str::<SearchItem>(r#"{"text":"nat.add_comm"}"#).is_err());
    }
}
