//! Image-based vs text-based document classification.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::DocumentSource;
use crate::error::IngestError;

/// Below this many selectable characters a document with images is a scan.
pub const DEFAULT_TEXT_THRESHOLD: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    ImageBased,
    TextBased,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DocumentKind::ImageBased => "image-based",
            DocumentKind::TextBased => "text-based",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub page: usize,
    pub text_chars: usize,
    pub images: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub kind: DocumentKind,
    /// Total selectable characters across pages (whitespace-trimmed per page).
    pub text_chars: usize,
    /// Total embedded raster images across pages.
    pub images: usize,
    pub pages: Vec<PageSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentClassifier {
    pub text_threshold: usize,
}

impl Default for DocumentClassifier {
    fn default() -> Self {
        Self {
            text_threshold: DEFAULT_TEXT_THRESHOLD,
        }
    }
}

impl DocumentClassifier {
    pub fn new(text_threshold: usize) -> Self {
        Self { text_threshold }
    }

    /// Image-based when total text is under the threshold and at least one
    /// image is embedded. A document with no pages is text-based.
    pub fn classify(&self, doc: &dyn DocumentSource) -> Result<Classification, IngestError> {
        let mut pages = Vec::with_capacity(doc.page_count());
        for page in 0..doc.page_count() {
            let text_chars = doc.page_text(page)?.trim().chars().count();
            let images = doc.page_image_count(page)?;
            pages.push(PageSummary {
                page,
                text_chars,
                images,
            });
        }

        let text_chars = pages.iter().map(|p| p.text_chars).sum();
        let images = pages.iter().map(|p| p.images).sum();
        let kind = if text_chars < self.text_threshold && images > 0 {
            DocumentKind::ImageBased
        } else {
            DocumentKind::TextBased
        };

        Ok(Classification {
            kind,
            text_chars,
            images,
            pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PageImage;

    struct Pages(Vec<(String, usize)>);

    impl DocumentSource for Pages {
        fn page_count(&self) -> usize {
            self.0.len()
        }
        fn page_text(&self, page: usize) -> Result<String, IngestError> {
            Ok(self.0[page].0.clone())
        }
        fn page_image_count(&self, page: usize) -> Result<usize, IngestError> {
            Ok(self.0[page].1)
        }
        fn render_page(&self, page: usize) -> Result<PageImage, IngestError> {
            Err(IngestError::render(page, "not needed"))
        }
    }

    #[test]
    fn test_scan_is_image_based() {
        let doc = Pages(vec![(String::new(), 1), (String::new(), 1), ("  \n".into(), 1)]);
        let c = DocumentClassifier::default().classify(&doc).unwrap();
        assert_eq!(c.kind, DocumentKind::ImageBased);
        assert_eq!(c.images, 3);
        assert_eq!(c.text_chars, 0);
    }

    #[test]
    fn test_digital_statement_is_text_based() {
        let doc = Pages(vec![("x".repeat(200), 0)]);
        let c = DocumentClassifier::default().classify(&doc).unwrap();
        assert_eq!(c.kind, DocumentKind::TextBased);
    }

    #[test]
    fn test_threshold_is_strict() {
        let at = Pages(vec![("y".repeat(50), 1)]);
        assert_eq!(
            DocumentClassifier::default().classify(&at).unwrap().kind,
            DocumentKind::TextBased
        );
        let under = Pages(vec![("y".repeat(49), 1)]);
        assert_eq!(
            DocumentClassifier::default().classify(&under).unwrap().kind,
            DocumentKind::ImageBased
        );
    }

    #[test]
    fn test_little_text_without_images_is_text_based() {
        let doc = Pages(vec![("short".into(), 0)]);
        assert_eq!(
            DocumentClassifier::default().classify(&doc).unwrap().kind,
            DocumentKind::TextBased
        );
    }

    #[test]
    fn test_zero_pages_is_text_based() {
        let c = DocumentClassifier::default().classify(&Pages(Vec::new())).unwrap();
        assert_eq!(c.kind, DocumentKind::TextBased);
        assert!(c.pages.is_empty());
    }
}
