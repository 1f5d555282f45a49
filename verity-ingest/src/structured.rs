//! Vision-based structured extraction seam.
//!
//! A structured extractor looks at page images (optionally with whatever
//! text was already recovered) and returns a JSON payload shaped like
//! `{account_info, transactions}`. The payload is validated later by the
//! normalizer; nothing here trusts its shape.

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use crate::document::PageImage;
use crate::error::IngestError;
use crate::router::{ExtractionSource, RawExtraction};

pub trait StructuredExtractor: Send + Sync {
    fn extract(&self, pages: &[PageImage], hint_text: Option<&str>) -> Result<Value>;
}

/// Run a structured extractor and wrap its payload as a raw extraction.
pub fn extract_structured(
    extractor: &dyn StructuredExtractor,
    pages: &[PageImage],
    hint_text: Option<&str>,
) -> Result<RawExtraction, IngestError> {
    let value = extractor
        .extract(pages, hint_text)
        .map_err(|source| IngestError::ExtractionFailed {
            path: ExtractionSource::VisionStructured,
            source,
        })?;
    info!(pages = pages.len(), hinted = hint_text.is_some(), "structured extraction finished");
    Ok(RawExtraction::structured(value))
}

/// Strip a surrounding markdown code fence (```json ... ```) from a model reply.
pub fn strip_json_fences(reply: &str) -> &str {
    let t = reply.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let rest = rest.strip_prefix("json").or_else(|| rest.strip_prefix("JSON")).unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Decode a model reply as JSON after fence stripping.
pub fn parse_json_reply(reply: &str) -> Result<Value> {
    let body = strip_json_fences(reply);
    serde_json::from_str(body).with_context(|| {
        let preview: String = body.chars().take(120).collect();
        format!("reply is not valid JSON: {preview}")
    })
}
