//! Page skew correction.
//!
//! The ink of a page (adaptive local-mean threshold) is wrapped in its convex
//! hull, the minimum-area bounding rectangle of that hull gives the dominant
//! angle, and the page is rotated back around its centre. Rotation samples
//! bilinearly and replicates edge pixels, so no black borders appear.

use image::{GrayImage, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::PageImage;

/// Angles at or below this (degrees) are treated as straight.
pub const DEFAULT_MIN_ANGLE: f64 = 0.5;

/// Half-size of the square neighbourhood the local mean is taken over.
const WINDOW_RADIUS: u32 = 15;

/// Ink must be this much darker than its neighbourhood mean.
const MEAN_OFFSET: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkewCorrector {
    pub min_angle_degrees: f64,
}

impl Default for SkewCorrector {
    fn default() -> Self {
        Self {
            min_angle_degrees: DEFAULT_MIN_ANGLE,
        }
    }
}

impl SkewCorrector {
    pub fn new(min_angle_degrees: f64) -> Self {
        Self { min_angle_degrees }
    }

    /// Deskew every page. Output has the same length and order as the input.
    pub fn deskew(&self, pages: Vec<PageImage>) -> Vec<PageImage> {
        pages.into_iter().map(|p| self.deskew_page(p)).collect()
    }

    /// Rotate one page upright, or hand it back untouched when it is blank
    /// or already within the minimum angle.
    pub fn deskew_page(&self, mut page: PageImage) -> PageImage {
        let gray = image::imageops::grayscale(&page.pixels);
        let Some(angle) = estimate_angle(&gray) else {
            debug!(page = page.index, "no ink to measure; leaving page as is");
            return page;
        };
        if angle.abs() <= self.min_angle_degrees {
            return page;
        }
        debug!(page = page.index, angle, "deskewing page");
        page.pixels = rotate_replicate(&page.pixels, angle);
        page.deskewed = true;
        page
    }
}

/// Dominant skew of the page ink in degrees, folded into (-45, 45].
/// `None` for blank pages.
pub fn estimate_angle(gray: &GrayImage) -> Option<f64> {
    let (min, max) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
    if gray.width() == 0 || gray.height() == 0 || min == max {
        return None;
    }

    let ink = adaptive_ink(gray);
    let w = gray.width() as usize;
    let mut points = Vec::new();
    for y in 0..gray.height() {
        let mut row = (0..gray.width()).filter(|&x| ink[y as usize * w + x as usize]);
        if let Some(first) = row.next() {
            let last = row.last().unwrap_or(first);
            points.push((first as f64, y as f64));
            if last != first {
                points.push((last as f64, y as f64));
            }
        }
    }
    if points.is_empty() {
        return None;
    }

    let hull = convex_hull(points);
    if hull.len() < 3 {
        return Some(0.0);
    }
    Some(fold_angle(min_area_rect_angle(&hull)))
}

/// Ink mask: a pixel is ink when it is darker than the mean of its
/// neighbourhood by more than [`MEAN_OFFSET`]. Uneven lighting and shaded
/// backgrounds stay out of the mask; flat regions never qualify.
fn adaptive_ink(gray: &GrayImage) -> Vec<bool> {
    let (w, h) = gray.dimensions();
    let stride = w as usize + 1;

    // Summed-area table with a zero first row and column.
    let mut integral = vec![0u64; stride * (h as usize + 1)];
    for y in 0..h as usize {
        let mut row_sum = 0u64;
        for x in 0..w as usize {
            row_sum += gray.get_pixel(x as u32, y as u32).0[0] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }

    let mut ink = vec![false; w as usize * h as usize];
    for y in 0..h {
        let y0 = y.saturating_sub(WINDOW_RADIUS) as usize;
        let y1 = (y + WINDOW_RADIUS + 1).min(h) as usize;
        for x in 0..w {
            let x0 = x.saturating_sub(WINDOW_RADIUS) as usize;
            let x1 = (x + WINDOW_RADIUS + 1).min(w) as usize;
            let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                - integral[y0 * stride + x1]
                - integral[y1 * stride + x0];
            let mean = sum as f64 / ((x1 - x0) * (y1 - y0)) as f64;
            let value = gray.get_pixel(x, y).0[0] as f64;
            ink[y as usize * w as usize + x as usize] = value < mean - MEAN_OFFSET;
        }
    }
    ink
}

/// Andrew's monotone chain; counter-clockwise, no collinear points.
fn convex_hull(mut pts: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    pts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
        (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
    }

    let mut lower: Vec<(f64, f64)> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<(f64, f64)> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Orientation (degrees) of the hull edge that yields the smallest
/// enclosing rectangle.
fn min_area_rect_angle(hull: &[(f64, f64)]) -> f64 {
    let mut best = (0.0, f64::MAX);
    for i in 0..hull.len() {
        let a = hull[i];
        let b = hull[(i + 1) % hull.len()];
        let theta = (b.1 - a.1).atan2(b.0 - a.0);
        let (sin, cos) = theta.sin_cos();

        let (mut min_u, mut max_u, mut min_v, mut max_v) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
        for &(x, y) in hull {
            let u = x * cos + y * sin;
            let v = -x * sin + y * cos;
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }
        let area = (max_u - min_u) * (max_v - min_v);
        if area < best.1 {
            best = (theta.to_degrees(), area);
        }
    }
    best.0
}

fn fold_angle(mut deg: f64) -> f64 {
    while deg > 45.0 {
        deg -= 90.0;
    }
    while deg <= -45.0 {
        deg += 90.0;
    }
    deg
}

/// Rotate content by `-degrees` around the centre, keeping dimensions.
fn rotate_replicate(src: &RgbImage, degrees: f64) -> RgbImage {
    let (w, h) = src.dimensions();
    let (sin, cos) = degrees.to_radians().sin_cos();
    let cx = (w as f64 - 1.0) / 2.0;
    let cy = (h as f64 - 1.0) / 2.0;
    RgbImage::from_fn(w, h, |x, y| {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        let sx = cos * dx - sin * dy + cx;
        let sy = sin * dx + cos * dy + cy;
        sample_bilinear(src, sx, sy)
    })
}

fn sample_bilinear(src: &RgbImage, x: f64, y: f64) -> Rgb<u8> {
    let max_x = (src.width() - 1) as f64;
    let max_y = (src.height() - 1) as f64;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let x0 = x.floor();
    let y0 = y.floor();
    let x1 = (x0 + 1.0).min(max_x);
    let y1 = (y0 + 1.0).min(max_y);
    let fx = x - x0;
    let fy = y - y0;

    let p00 = src.get_pixel(x0 as u32, y0 as u32);
    let p10 = src.get_pixel(x1 as u32, y0 as u32);
    let p01 = src.get_pixel(x0 as u32, y1 as u32);
    let p11 = src.get_pixel(x1 as u32, y1 as u32);

    let mut out = [0u8; 3];
    for (c, slot) in out.iter_mut().enumerate() {
        let top = p00.0[c] as f64 * (1.0 - fx) + p10.0[c] as f64 * fx;
        let bottom = p01.0[c] as f64 * (1.0 - fx) + p11.0[c] as f64 * fx;
        *slot = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}
