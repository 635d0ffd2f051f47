use anyhow::{bail, Result};
use log::{debug, info};

use super::Verdict;
use crate::landmarks::{LandmarkSet, Point, LEFT_EYE_EAR, RIGHT_EYE_EAR};

/// `(|p2-p6| + |p3-p5|) / (2 |p1-p4|)` over the six eye points.
pub fn eye_aspect_ratio(p: &[Point; 6]) -> Result<f64> {
    let horizontal = (p[0] - p[3]).norm();
    if horizontal <= f64::EPSILON {
        bail!("eye corners coincide");
    }
    let vertical = (p[1] - p[5]).norm() + (p[2] - p[4]).norm();
    Ok(vertical / (2.0 * horizontal))
}

fn eye_points(landmarks: &LandmarkSet, indices: &[usize; 6], width: u32, height: u32) -> [Point; 6] {
    indices.map(|i| landmarks.pixel(i, width, height))
}

/// Both eyes must be open: EAR strictly above `ear_threshold`.
///
/// A failed upstream detection is reported with its own message.
pub fn check_eye_openness(
    landmarks: Option<&LandmarkSet>,
    width: u32,
    height: u32,
    detected: bool,
    detection_message: &str,
    ear_threshold: f64,
) -> Result<Verdict> {
    let landmarks = match landmarks {
        Some(lm) if detected => lm,
        _ => {
            info!("EYES | detection failed: {detection_message}");
            return Ok(Verdict::fail(detection_message));
        }
    };

    let left = eye_aspect_ratio(&eye_points(landmarks, &LEFT_EYE_EAR, width, height))?;
    let right = eye_aspect_ratio(&eye_points(landmarks, &RIGHT_EYE_EAR, width, height))?;
    debug!("EYES | EAR left={left:.3} right={right:.3} (threshold {ear_threshold})");

    let message = match (left > ear_threshold, right > ear_threshold) {
        (true, true) => return Ok(Verdict::pass("Eyes are open")),
        (false, false) => "Both eyes are closed",
        (false, true) => "Left eye is closed",
        (true, false) => "Right eye is closed",
    };
    info!("EYES | {message}");
    Ok(Verdict::fail(message))
}
