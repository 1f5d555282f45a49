//! Pixel-level anomaly detection.
//!
//! Edges are found with a Sobel gradient and double-threshold hysteresis,
//! grouped into 8-connected regions, and each outermost region whose
//! bounding box falls strictly inside the size band is reported with a PNG
//! crop of the page. Pasted-over amounts and masked text tend to show up as
//! small, isolated blocks in exactly that band.

use std::io::Cursor;

use base64::Engine as _;
use image::{GrayImage, ImageFormat};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use verity_core::{FraudIssue, IssueType};
use verity_ingest::PageImage;

/// Size band and edge thresholds. Bounds are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PixelBands {
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
    pub low_threshold: u32,
    pub high_threshold: u32,
}

impl Default for PixelBands {
    fn default() -> Self {
        Self {
            min_width: 25,
            max_width: 250,
            min_height: 10,
            max_height: 50,
            low_threshold: 50,
            high_threshold: 150,
        }
    }
}

impl PixelBands {
    pub fn admits(&self, region: &Region) -> bool {
        self.min_width < region.width
            && region.width < self.max_width
            && self.min_height < region.height
            && region.height < self.max_height
    }
}

/// Axis-aligned bounding box in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    fn contains(&self, other: &Region) -> bool {
        self != other
            && self.x <= other.x
            && self.y <= other.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PixelAnomalyDetector {
    pub bands: PixelBands,
}

impl PixelAnomalyDetector {
    pub fn new(bands: PixelBands) -> Self {
        Self { bands }
    }

    /// Issues for every page, page order then scan order.
    pub fn detect(&self, pages: &[PageImage]) -> Vec<FraudIssue> {
        let issues: Vec<FraudIssue> = pages.iter().flat_map(|p| self.detect_page(p)).collect();
        debug!(pages = pages.len(), issues = issues.len(), "pixel scan finished");
        issues
    }

    pub fn detect_page(&self, page: &PageImage) -> Vec<FraudIssue> {
        let gray = image::imageops::grayscale(&page.pixels);
        let mut issues = Vec::new();
        for region in self.find_regions(&gray) {
            match snippet_data_uri(page, &region) {
                Ok(uri) => issues.push(FraudIssue::pixel(
                    IssueType::FormattingAnomaly,
                    format!(
                        "Suspicious visual block at ({},{},{},{}); possible tampering or masked text.",
                        region.x, region.y, region.width, region.height
                    ),
                    uri,
                )),
                Err(e) => warn!(page = page.index, ?region, error = %e, "could not encode snippet"),
            }
        }
        issues
    }

    /// Outermost edge regions inside the size band.
    pub fn find_regions(&self, gray: &GrayImage) -> Vec<Region> {
        let magnitude = sobel_l1(gray);
        let all = edge_regions(
            &magnitude,
            gray.width(),
            gray.height(),
            self.bands.low_threshold,
            self.bands.high_threshold,
        );
        let outer: Vec<Region> = all
            .iter()
            .filter(|r| !all.iter().any(|o| o.contains(r)))
            .copied()
            .collect();
        outer.into_iter().filter(|r| self.bands.admits(r)).collect()
    }
}

/// |Gx| + |Gy| of the 3x3 Sobel operator; border pixels are zero.
fn sobel_l1(gray: &GrayImage) -> Vec<u32> {
    let (w, h) = gray.dimensions();
    let mut out = vec![0u32; (w as usize) * (h as usize)];
    if w < 3 || h < 3 {
        return out;
    }
    let px = |x: u32, y: u32| gray.get_pixel(x, y).0[0] as i32;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let gx = (px(x + 1, y - 1) + 2 * px(x + 1, y) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2 * px(x - 1, y) + px(x - 1, y + 1));
            let gy = (px(x - 1, y + 1) + 2 * px(x, y + 1) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2 * px(x, y - 1) + px(x + 1, y - 1));
            out[(y * w + x) as usize] = gx.unsigned_abs() + gy.unsigned_abs();
        }
    }
    out
}

/// Bounding boxes of 8-connected weak-edge components that contain at least
/// one strong edge pixel, in scan order of their first pixel.
fn edge_regions(magnitude: &[u32], w: u32, h: u32, low: u32, high: u32) -> Vec<Region> {
    let idx = |x: u32, y: u32| (y * w + x) as usize;
    let mut seen = vec![false; magnitude.len()];
    let mut regions = Vec::new();
    let mut stack = Vec::new();

    for y in 0..h {
        for x in 0..w {
            if seen[idx(x, y)] || magnitude[idx(x, y)] < low {
                continue;
            }
            seen[idx(x, y)] = true;
            stack.push((x, y));
            let (mut min_x, mut min_y, mut max_x, mut max_y) = (x, y, x, y);
            let mut strong = false;

            while let Some((cx, cy)) = stack.pop() {
                strong |= magnitude[idx(cx, cy)] >= high;
                min_x = min_x.min(cx);
                min_y = min_y.min(cy);
                max_x = max_x.max(cx);
                max_y = max_y.max(cy);
                for ny in cy.saturating_sub(1)..=(cy + 1).min(h - 1) {
                    for nx in cx.saturating_sub(1)..=(cx + 1).min(w - 1) {
                        let i = idx(nx, ny);
                        if !seen[i] && magnitude[i] >= low {
                            seen[i] = true;
                            stack.push((nx, ny));
                        }
                    }
                }
            }

            if strong {
                regions.push(Region {
                    x: min_x,
                    y: min_y,
                    width: max_x - min_x + 1,
                    height: max_y - min_y + 1,
                });
            }
        }
    }
    regions
}

fn snippet_data_uri(page: &PageImage, region: &Region) -> Result<String, image::ImageError> {
    let crop = image::imageops::crop_imm(&page.pixels, region.x, region.y, region.width, region.height)
        .to_image();
    let mut png = Cursor::new(Vec::new());
    crop.write_to(&mut png, ImageFormat::Png)?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(png.into_inner());
    Ok(format!("data:image/png;base64,{encoded}"))
}
