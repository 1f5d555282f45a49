use thiserror::Error;

use crate::router::ExtractionSource;

/// Failures surfaced to the caller. Everything else in ingestion degrades to
/// skipped rows or flags.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The source bytes could not be opened or parsed as a document.
    #[error("document unreadable: {reason}")]
    DocumentUnreadable { reason: String },

    /// The chosen extraction path raised. No fallback to the other path.
    #[error("{path} extraction failed")]
    ExtractionFailed {
        path: ExtractionSource,
        #[source]
        source: anyhow::Error,
    },

    /// A page has no raster content we can decode.
    #[error("page {page} cannot be rendered: {reason}")]
    Render { page: usize, reason: String },
}

impl IngestError {
    pub fn unreadable(reason: impl Into<String>) -> Self {
        IngestError::DocumentUnreadable {
            reason: reason.into(),
        }
    }

    pub fn render(page: usize, reason: impl Into<String>) -> Self {
        IngestError::Render {
            page,
            reason: reason.into(),
        }
    }
}
