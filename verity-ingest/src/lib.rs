//! verity-ingest: document sources, classification, deskew, extraction routing and
//! normalization of extracted statements into canonical transactions.

pub mod classify;
pub mod deskew;
pub mod document;
pub mod error;
pub mod normalize;
pub mod ocr;
pub mod parsers;
pub mod router;
pub mod structured;

pub use classify::{Classification, DocumentClassifier, DocumentKind, PageSummary};
pub use deskew::{estimate_angle, SkewCorrector};
pub use document::{open_document, DocumentSource, PageImage, PdfDocument, RasterDocument};
pub use error::IngestError;
pub use normalize::{NormalizedStatement, TransactionNormalizer};
pub use ocr::{OcrEngine, TesseractCli};
pub use router::{
    ExtractionRouter, ExtractionSource, ExtractionStrategy, OcrStrategy, RawExtraction,
    RawPayload, TextLayerStrategy,
};
pub use parsers::ParsedRows;
pub use structured::{extract_structured, parse_json_reply, strip_json_fences, StructuredExtractor};
