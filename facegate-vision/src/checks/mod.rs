//! The face quality checks and the standard battery that runs them.

pub mod blur;
pub mod eyes;
pub mod framing;
pub mod lighting;
pub mod pose;
pub mod size;

use image::RgbImage;

use crate::battery::{Battery, Check};
use crate::landmarks::{BoundingBox, LandmarkSet};
use crate::settings::Thresholds;

pub use blur::check_blur;
pub use eyes::check_eye_openness;
pub use framing::check_head_fully_visible;
pub use lighting::{check_lighting, LightingLimits};
pub use pose::{check_head_pose, estimate_pose, HeadPose, PoseLimits};
pub use size::check_face_size;

/// Pass/fail plus the human readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub passed: bool,
    pub message: String,
}

impl Verdict {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }
}

/// Everything a check may look at for one image.
#[derive(Debug, Clone, Copy)]
pub struct CheckInput<'a> {
    pub image: &'a RgbImage,
    pub landmarks: Option<&'a LandmarkSet>,
    pub bbox: Option<&'a BoundingBox>,
    pub detected: bool,
    pub detection_message: &'a str,
    pub thresholds: &'a Thresholds,
}

impl CheckInput<'_> {
    fn require_landmarks(&self) -> anyhow::Result<&LandmarkSet> {
        self.landmarks
            .ok_or_else(|| anyhow::anyhow!("no landmarks available"))
    }
}

pub const FACE_SIZE: &str = "check_face_min_size";
pub const LIGHTING: &str = "check_lightpol";
pub const BLUR: &str = "check_face_blur";
pub const HEAD_FULLY: &str = "check_head_fully";
pub const HEAD_POSE: &str = "check_head_pose";
pub const EYES: &str = "check_eye";

fn face_size(i: &CheckInput) -> anyhow::Result<Verdict> {
    Ok(check_face_size(i.bbox, i.thresholds.face_size))
}

fn lighting(i: &CheckInput) -> anyhow::Result<Verdict> {
    let t = i.thresholds;
    let limits = LightingLimits {
        dark_threshold: t.dark_threshold,
        bright_threshold: t.bright_threshold,
        diff_threshold: t.diff_threshold,
        margin: t.margin,
    };
    Ok(check_lighting(i.image, i.bbox, &limits))
}

fn blur(i: &CheckInput) -> anyhow::Result<Verdict> {
    Ok(check_blur(i.image, i.bbox, i.thresholds.blur))
}

fn head_fully(i: &CheckInput) -> anyhow::Result<Verdict> {
    let lm = i.require_landmarks()?;
    Ok(check_head_fully_visible(
        lm,
        i.image.height(),
        i.thresholds.head_fully_th,
    ))
}

fn head_pose(i: &CheckInput) -> anyhow::Result<Verdict> {
    let lm = i.require_landmarks()?;
    let t = i.thresholds;
    let limits = PoseLimits {
        left_th: t.left_th,
        right_th: t.right_th,
        down_th: t.down_th,
        up_th: t.up_th,
        til_left_th: t.til_left_th,
        til_right_th: t.til_right_th,
    };
    let pose = estimate_pose(lm, i.image.width(), i.image.height())?;
    Ok(check_head_pose(&pose, &limits))
}

fn eyes(i: &CheckInput) -> anyhow::Result<Verdict> {
    check_eye_openness(
        i.landmarks,
        i.image.width(),
        i.image.height(),
        i.detected,
        i.detection_message,
        i.thresholds.ear_threshold,
    )
}

/// Size, lighting, blur, framing, pose, eye openness, in that order.
pub fn face_battery<'a>() -> Battery<CheckInput<'a>> {
    Battery::new()
        .with(Check::new(FACE_SIZE, face_size))
        .with(Check::new(LIGHTING, lighting))
        .with(Check::new(BLUR, blur))
        .with(Check::new(HEAD_FULLY, head_fully))
        .with(Check::new(HEAD_POSE, head_pose))
        .with(Check::new(EYES, eyes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::MESH_POINTS;

    #[test]
    fn test_battery_order() {
        let names: Vec<_> = face_battery().names().collect();
        assert_eq!(
            names,
            vec![FACE_SIZE, LIGHTING, BLUR, HEAD_FULLY, HEAD_POSE, EYES]
        );
    }

    #[test]
    fn test_faulting_checks_do_not_stop_the_battery() {
        // A collapsed mesh makes pose and eye checks fault.
        let image = RgbImage::new(100, 100);
        let lm = LandmarkSet::new(vec![[0.5, 0.5]; MESH_POINTS]).unwrap();
        let thresholds = Thresholds::default();
        let input = CheckInput {
            image: &image,
            landmarks: Some(&lm),
            bbox: None,
            detected: true,
            detection_message: "Face detected",
            thresholds: &thresholds,
        };
        let report = face_battery().run(&input);
        assert_eq!(report.outcomes.len(), 6);
        assert!(!report.all_passed());
        assert_eq!(report.first_failure().unwrap().message, "No bounding box provided");
        let pose = &report.outcomes[4];
        assert!(!pose.passed);
        assert!(pose.message.starts_with("check_head_pose failed:"));
    }
}
