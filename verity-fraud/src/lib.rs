//! verity-fraud: pixel-level and semantic fraud signals for statement pages

pub mod merge;
pub mod pixel;
pub mod review;
pub mod scan;

pub use merge::FraudSignalMerger;
pub use pixel::{PixelAnomalyDetector, PixelBands, Region};
pub use review::{findings_from_json, SemanticFinding, SemanticReviewer};
pub use scan::FraudScanner;
