//! Semantic review contract.

use serde_json::Value;
use tracing::warn;
use verity_core::IssueType;
use verity_ingest::PageImage;

/// One issue raised by a holistic reviewer, with the statement text it quotes.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticFinding {
    pub issue_type: IssueType,
    pub description: String,
    pub evidence_snippet: Option<String>,
}

impl SemanticFinding {
    pub fn new(
        issue_type: IssueType,
        description: impl Into<String>,
        evidence_snippet: Option<String>,
    ) -> Self {
        Self {
            issue_type,
            description: description.into(),
            evidence_snippet,
        }
    }
}

/// Reviews page images for duplicate, missing, or doctored entries.
pub trait SemanticReviewer: Send + Sync {
    fn review(&self, pages: &[PageImage]) -> anyhow::Result<Vec<SemanticFinding>>;
}

const EVIDENCE_KEYS: [&str; 3] = [
    "evidence_snippet",
    "related_transaction_text_snippet",
    "related_transaction_image_snippet",
];

/// Decode reviewer output: either a bare array of issues or `{"issues": [...]}`.
/// Items without a description are dropped.
pub fn findings_from_json(value: &Value) -> Vec<SemanticFinding> {
    let items = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(obj) => match obj.get("issues") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => {
                warn!("reviewer reply has no issues array");
                return Vec::new();
            }
        },
        _ => {
            warn!("reviewer reply is not a list");
            return Vec::new();
        }
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let Some(description) = item.get("description").and_then(Value::as_str) else {
                warn!(item = i, "dropping reviewer issue without description");
                return None;
            };
            let issue_type = item
                .get("issue_type")
                .and_then(Value::as_str)
                .map(IssueType::from_label)
                .unwrap_or(IssueType::Other);
            let evidence = EVIDENCE_KEYS
                .iter()
                .filter_map(|k| item.get(*k).and_then(Value::as_str))
                .map(str::trim)
                .find(|s| !s.is_empty() && *s != "null")
                .map(str::to_string);
            Some(SemanticFinding::new(issue_type, description, evidence))
        })
        .collect()
}
