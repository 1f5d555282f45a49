//! Runs both detectors over the same pages and merges their output.

use std::thread;

use tracing::{info, warn};
use verity_core::FraudIssue;
use verity_ingest::PageImage;

use crate::merge::FraudSignalMerger;
use crate::pixel::PixelAnomalyDetector;
use crate::review::SemanticReviewer;

pub struct FraudScanner {
    pixel: PixelAnomalyDetector,
    reviewer: Option<Box<dyn SemanticReviewer>>,
    merger: FraudSignalMerger,
}

impl FraudScanner {
    pub fn new(pixel: PixelAnomalyDetector, reviewer: Option<Box<dyn SemanticReviewer>>) -> Self {
        Self {
            pixel,
            reviewer,
            merger: FraudSignalMerger::new(),
        }
    }

    /// Pixel-only scanning.
    pub fn pixel_only(pixel: PixelAnomalyDetector) -> Self {
        Self::new(pixel, None)
    }

    /// The semantic review runs on its own thread while the pixel scan runs
    /// on the caller's. A reviewer failure is logged and contributes nothing.
    pub fn scan(&self, pages: &[PageImage]) -> Vec<FraudIssue> {
        let (pixel, semantic) = thread::scope(|s| {
            let review = self
                .reviewer
                .as_deref()
                .map(|reviewer| s.spawn(move || reviewer.review(pages)));
            let pixel = self.pixel.detect(pages);
            let semantic = match review.map(|handle| handle.join()) {
                None => Vec::new(),
                Some(Ok(Ok(findings))) => findings,
                Some(Ok(Err(e))) => {
                    warn!(error = %e, "semantic review failed; keeping pixel issues only");
                    Vec::new()
                }
                Some(Err(_)) => {
                    warn!("semantic review panicked; keeping pixel issues only");
                    Vec::new()
                }
            };
            (pixel, semantic)
        });

        info!(
            pages = pages.len(),
            pixel = pixel.len(),
            semantic = semantic.len(),
            "fraud scan complete"
        );
        self.merger.merge(pixel, semantic)
    }
}

