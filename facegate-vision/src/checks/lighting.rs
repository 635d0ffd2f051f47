//! Brightness and evenness of the light falling on the face.
//!
//! The region is the face box grown by `margin` and clipped to the image.
//! Its mean luma must lie in `[dark_threshold, bright_threshold]`, and the
//! mean luma of its left and right halves may differ by at most
//! `diff_threshold` (one side lit, the other in shadow).

use image::RgbImage;
use log::{debug, info};

use super::blur::luma;
use super::Verdict;
use crate::landmarks::BoundingBox;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightingLimits {
    pub dark_threshold: f64,
    pub bright_threshold: f64,
    pub diff_threshold: f64,
    pub margin: u32,
}

/// Mean luma of the whole region and of its left and right halves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightingStats {
    pub mean: f64,
    pub left: f64,
    pub right: f64,
}

pub fn lighting_stats(image: &RgbImage, bbox: &BoundingBox, margin: u32) -> Option<LightingStats> {
    let (w, h) = image.dimensions();
    let m = margin as i64;
    let x0 = (bbox.x as i64 - m).max(0);
    let y0 = (bbox.y as i64 - m).max(0);
    let x1 = (bbox.x as i64 + bbox.width as i64 + m).min(w as i64);
    let y1 = (bbox.y as i64 + bbox.height as i64 + m).min(h as i64);
    if x1 - x0 < 2 || y1 <= y0 {
        return None;
    }
    let mid = x0 + (x1 - x0) / 2;

    let (mut left, mut right) = ((0.0, 0u64), (0.0, 0u64));
    for y in y0..y1 {
        for x in x0..x1 {
            let px = image.get_pixel(x as u32, y as u32);
            let l = luma(px[0], px[1], px[2]);
            let half = if x < mid { &mut left } else { &mut right };
            half.0 += l;
            half.1 += 1;
        }
    }
    Some(LightingStats {
        mean: (left.0 + right.0) / (left.1 + right.1) as f64,
        left: left.0 / left.1 as f64,
        right: right.0 / right.1 as f64,
    })
}

pub fn check_lighting(
    image: &RgbImage,
    bbox: Option<&BoundingBox>,
    limits: &LightingLimits,
) -> Verdict {
    let Some(bbox) = bbox else {
        info!("LIGHT | no face detected");
        return Verdict::fail("No face detected");
    };
    let Some(stats) = lighting_stats(image, bbox, limits.margin) else {
        info!("LIGHT | face region is empty");
        return Verdict::fail("Invalid face region");
    };
    debug!(
        "LIGHT | mean={:.1} left={:.1} right={:.1}",
        stats.mean, stats.left, stats.right
    );

    if stats.mean < limits.dark_threshold {
        info!("LIGHT | too dark ({:.1} < {})", stats.mean, limits.dark_threshold);
        return Verdict::fail("Image is too dark");
    }
    if stats.mean > limits.bright_threshold {
        info!("LIGHT | too bright ({:.1} > {})", stats.mean, limits.bright_threshold);
        return Verdict::fail("Image is too bright");
    }
    let diff = (stats.left - stats.right).abs();
    if diff > limits.diff_threshold {
        info!("LIGHT | uneven ({diff:.1} > {})", limits.diff_threshold);
        return Verdict::fail("Uneven lighting on the face");
    }
    Verdict::pass("Lighting is acceptable")
}
