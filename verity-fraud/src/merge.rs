use verity_core::FraudIssue;

use crate::review::SemanticFinding;

/// Joins pixel and semantic signals into one issue list.
///
/// Pixel issues come first, each source keeps its own order, and nothing is
/// deduplicated across sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct FraudSignalMerger;

impl FraudSignalMerger {
    pub fn new() -> Self {
        Self
    }

    pub fn merge(&self, pixel: Vec<FraudIssue>, semantic: Vec<SemanticFinding>) -> Vec<FraudIssue> {
        let mut issues = pixel;
        issues.reserve(semantic.len());
        issues.extend(semantic.into_iter().map(|f| {
            FraudIssue::semantic(f.issue_type, f.description, f.evidence_snippet)
        }));
        issues
    }
}
