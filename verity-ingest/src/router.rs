//! Extraction routing.
//!
//! Image-based documents go through OCR (pages deskewed first), text-based
//! documents go through the text layer. A document takes exactly one path:
//! when the chosen strategy fails the error is surfaced, the other path is
//! not tried.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classify::{Classification, DocumentClassifier, DocumentKind};
use crate::deskew::SkewCorrector;
use crate::document::DocumentSource;
use crate::error::IngestError;
use crate::ocr::OcrEngine;

/// Which path produced a raw extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionSource {
    TextLayer,
    Ocr,
    VisionStructured,
}

impl ExtractionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionSource::TextLayer => "text-layer",
            ExtractionSource::Ocr => "ocr",
            ExtractionSource::VisionStructured => "vision-structured",
        }
    }
}

impl fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw extractor output, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "data", rename_all = "snake_case")]
pub enum RawPayload {
    Text(String),
    Structured(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawExtraction {
    pub source: ExtractionSource,
    pub payload: RawPayload,
}

impl RawExtraction {
    pub fn text(source: ExtractionSource, text: impl Into<String>) -> Self {
        Self {
            source,
            payload: RawPayload::Text(text.into()),
        }
    }

    pub fn structured(value: serde_json::Value) -> Self {
        Self {
            source: ExtractionSource::VisionStructured,
            payload: RawPayload::Structured(value),
        }
    }
}

/// One way of turning a document into text.
pub trait ExtractionStrategy: Send + Sync {
    fn source(&self) -> ExtractionSource;
    fn extract(&self, doc: &dyn DocumentSource) -> anyhow::Result<String>;
}

/// Selectable text, pages joined by newline.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextLayerStrategy;

impl ExtractionStrategy for TextLayerStrategy {
    fn source(&self) -> ExtractionSource {
        ExtractionSource::TextLayer
    }

    fn extract(&self, doc: &dyn DocumentSource) -> anyhow::Result<String> {
        let pages = (0..doc.page_count())
            .map(|i| doc.page_text(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pages.join("\n"))
    }
}

/// Render, deskew, then recognise.
pub struct OcrStrategy {
    engine: Box<dyn OcrEngine>,
    deskew: SkewCorrector,
}

impl OcrStrategy {
    pub fn new(engine: Box<dyn OcrEngine>, deskew: SkewCorrector) -> Self {
        Self { engine, deskew }
    }
}

impl ExtractionStrategy for OcrStrategy {
    fn source(&self) -> ExtractionSource {
        ExtractionSource::Ocr
    }

    fn extract(&self, doc: &dyn DocumentSource) -> anyhow::Result<String> {
        let pages = self.deskew.deskew(doc.render_pages()?);
        let rotated = pages.iter().filter(|p| p.deskewed).count();
        debug!(engine = self.engine.name(), pages = pages.len(), rotated, "running ocr");
        self.engine.extract_text(&pages)
    }
}

/// Classifies a document and dispatches it to exactly one strategy.
pub struct ExtractionRouter {
    classifier: DocumentClassifier,
    text_layer: Box<dyn ExtractionStrategy>,
    ocr: Box<dyn ExtractionStrategy>,
}

impl ExtractionRouter {
    pub fn new(
        classifier: DocumentClassifier,
        text_layer: Box<dyn ExtractionStrategy>,
        ocr: Box<dyn ExtractionStrategy>,
    ) -> Self {
        Self {
            classifier,
            text_layer,
            ocr,
        }
    }

    /// Router with the text-layer strategy and the given OCR engine.
    pub fn with_ocr(
        classifier: DocumentClassifier,
        engine: Box<dyn OcrEngine>,
        deskew: SkewCorrector,
    ) -> Self {
        Self::new(
            classifier,
            Box::new(TextLayerStrategy),
            Box::new(OcrStrategy::new(engine, deskew)),
        )
    }

    pub fn classifier(&self) -> &DocumentClassifier {
        &self.classifier
    }

    pub fn strategy_for(&self, kind: DocumentKind) -> &dyn ExtractionStrategy {
        match kind {
            DocumentKind::ImageBased => self.ocr.as_ref(),
            DocumentKind::TextBased => self.text_layer.as_ref(),
        }
    }

    /// Classify and extract, returning the classification alongside the text.
    pub fn route(
        &self,
        doc: &dyn DocumentSource,
    ) -> Result<(Classification, RawExtraction), IngestError> {
        let classification = self.classifier.classify(doc)?;
        let strategy = self.strategy_for(classification.kind);
        let path = strategy.source();
        info!(
            kind = %classification.kind,
            text_chars = classification.text_chars,
            images = classification.images,
            path = %path,
            "routing document"
        );

        let text = strategy
            .extract(doc)
            .map_err(|source| IngestError::ExtractionFailed { path, source })?;
        debug!(path = %path, chars = text.len(), "extraction finished");
        Ok((classification, RawExtraction::text(path, text)))
    }

    pub fn extract(&self, doc: &dyn DocumentSource) -> Result<RawExtraction, IngestError> {
        self.route(doc).map(|(_, raw)| raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PageImage;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeDoc {
        text: &'static str,
        images: usize,
    }

    impl DocumentSource for FakeDoc {
        fn page_count(&self) -> usize {
            2
        }
        fn page_text(&self, _page: usize) -> Result<String, IngestError> {
            Ok(self.text.to_string())
        }
        fn page_image_count(&self, _page: usize) -> Result<usize, IngestError> {
            Ok(self.images)
        }
        fn render_page(&self, page: usize) -> Result<PageImage, IngestError> {
            Ok(PageImage::new(page, RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]))))
        }
    }

    struct CountingOcr {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl OcrEngine for CountingOcr {
        fn name(&self) -> &str {
            "counting"
        }
        fn extract_text(&self, pages: &[PageImage]) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("engine crashed");
            }
            Ok(format!("ocr text from {} pages", pages.len()))
        }
    }

    fn router(fail: bool) -> (ExtractionRouter, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = CountingOcr {
            calls: calls.clone(),
            fail,
        };
        let r = ExtractionRouter::with_ocr(
            DocumentClassifier::default(),
            Box::new(engine),
            SkewCorrector::default(),
        );
        (r, calls)
    }

    #[test]
    fn test_scanned_document_goes_to_ocr() {
        let (router, calls) = router(false);
        let (class, raw) = router.route(&FakeDoc { text: "", images: 1 }).unwrap();
        assert_eq!(class.kind, DocumentKind::ImageBased);
        assert_eq!(raw.source, ExtractionSource::Ocr);
        assert_eq!(raw.payload, RawPayload::Text("ocr text from 2 pages".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_text_document_uses_text_layer() {
        let (router, calls) = router(false);
        let doc = FakeDoc {
            text: "01-01-2025 Opening Balance 0.00 2649.13 and plenty of other words",
            images: 0,
        };
        let raw = router.extract(&doc).unwrap();
        assert_eq!(raw.source, ExtractionSource::TextLayer);
        match raw.payload {
            RawPayload::Text(t) => assert_eq!(t.lines().count(), 2),
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_ocr_failure_does_not_fall_back() {
        let (router, calls) = router(true);
        let err = router.extract(&FakeDoc { text: "", images: 3 }).unwrap_err();
        assert!(matches!(
            err,
            IngestError::ExtractionFailed {
                path: ExtractionSource::Ocr,
                ..
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_source_labels() {
        assert_eq!(ExtractionSource::VisionStructured.to_string(), "vision-structured");
        assert_eq!(
            serde_json::to_value(ExtractionSource::TextLayer).unwrap(),
            serde_json::json!("text-layer")
        );
    }
}
