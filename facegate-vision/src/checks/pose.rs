//! Head orientation from 2D mesh geometry.
//!
//! Angles are in degrees and measured in image space:
//! - yaw: nose tip offset along the eye line, relative to half the eye
//!   distance; positive when the nose points to the image right.
//! - pitch: nose tip position between the eye line and the mouth line,
//!   relative to a frontal face; positive when the face tips down.
//! - roll: angle of the eye line; positive when the right side of the image
//!   drops.

use anyhow::{bail, Result};
use log::{debug, info};

use super::Verdict;
use crate::geometry::FaceAxes;
use crate::landmarks::{LandmarkSet, NOSE_TIP};

/// Nose tip depth along eye→mouth for a frontal face.
const NEUTRAL_NOSE_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadPose {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseLimits {
    pub left_th: f64,
    pub right_th: f64,
    pub down_th: f64,
    pub up_th: f64,
    pub til_left_th: f64,
    pub til_right_th: f64,
}

pub fn estimate_pose(landmarks: &LandmarkSet, width: u32, height: u32) -> Result<HeadPose> {
    let axes = FaceAxes::from_landmarks(landmarks, width, height);
    let nose = landmarks.pixel(NOSE_TIP, width, height);

    let eye_dist = axes.eye_to_eye.norm();
    if eye_dist <= f64::EPSILON {
        bail!("eye centers coincide");
    }
    let across = axes.eye_to_eye / eye_dist;
    let down = crate::geometry::rot90(&across);
    let face_height = axes.eye_to_mouth.dot(&down);
    if face_height <= f64::EPSILON {
        bail!("mouth is not below the eyes");
    }

    let offset = nose - axes.eye_avg;
    let yaw_ratio = offset.dot(&across) / (eye_dist * 0.5);
    let pitch_ratio = offset.dot(&down) / face_height - NEUTRAL_NOSE_RATIO;

    Ok(HeadPose {
        yaw: yaw_ratio.clamp(-1.0, 1.0).asin().to_degrees(),
        pitch: (pitch_ratio * 2.0).clamp(-1.0, 1.0).asin().to_degrees(),
        roll: axes.eye_to_eye.y.atan2(axes.eye_to_eye.x).to_degrees(),
    })
}

pub fn check_head_pose(pose: &HeadPose, limits: &PoseLimits) -> Verdict {
    debug!(
        "POSE | yaw={:.1} pitch={:.1} roll={:.1}",
        pose.yaw, pose.pitch, pose.roll
    );
    let violation = if pose.yaw < -limits.left_th {
        Some("Head is turned left")
    } else if pose.yaw > limits.right_th {
        Some("Head is turned right")
    } else if pose.pitch > limits.down_th {
        Some("Head is tilted down")
    } else if pose.pitch < -limits.up_th {
        Some("Head is tilted up")
    } else if pose.roll < -limits.til_left_th {
        Some("Head is tilted to the left")
    } else if pose.roll > limits.til_right_th {
        Some("Head is tilted to the right")
    } else {
        None
    };

    match violation {
        Some(message) => {
            info!("POSE | {message}");
            Verdict::fail(message)
        }
        None => Verdict::pass("Head pose is frontal"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{
        LEFT_EYE_CONTOUR, MESH_POINTS, MOUTH_LEFT, MOUTH_RIGHT, RIGHT_EYE_CONTOUR,
    };

    const LIMITS: PoseLimits = PoseLimits {
        left_th: 25.0,
        right_th: 25.0,
        down_th: 25.0,
        up_th: 25.0,
        til_left_th: 15.0,
        til_right_th: 15.0,
    };

    /// Eyes at y=0.4, mouth at y=0.6, nose at the given position.
    fn face(eye_dy: f32, nose: [f32; 2]) -> LandmarkSet {
        let mut points = vec![[0.5, 0.5]; MESH_POINTS];
        for &i in LEFT_EYE_CONTOUR.iter() {
            points[i] = [0.4, 0.4 - eye_dy];
        }
        for &i in RIGHT_EYE_CONTOUR.iter() {
            points[i] = [0.6, 0.4 + eye_dy];
        }
        points[MOUTH_LEFT] = [0.45, 0.6];
        points[MOUTH_RIGHT] = [0.55, 0.6];
        points[NOSE_TIP] = nose;
        LandmarkSet::new(points).unwrap()
    }

    #[test]
    fn test_frontal() {
        let pose = estimate_pose(&face(0.0, [0.5, 0.5]), 100, 100).unwrap();
        assert!(pose.yaw.abs() < 1e-3);
        assert!(pose.pitch.abs() < 1e-3);
        assert!(pose.roll.abs() < 1e-3);
        assert!(check_head_pose(&pose, &LIMITS).passed);
    }

    #[test]
    fn test_turned_right() {
        let pose = estimate_pose(&face(0.0, [0.58, 0.5]), 100, 100).unwrap();
        assert!(pose.yaw > 25.0);
        assert_eq!(check_head_pose(&pose, &LIMITS).message, "Head is turned right");
    }

    #[test]
    fn test_tilted_down() {
        let pose = estimate_pose(&face(0.0, [0.5, 0.58]), 100, 100).unwrap();
        assert!(pose.pitch > 25.0);
        assert_eq!(check_head_pose(&pose, &LIMITS).message, "Head is tilted down");
    }

    #[test]
    fn test_roll() {
        let pose = estimate_pose(&face(0.05, [0.5, 0.5]), 100, 100).unwrap();
        // atan(10 / 20)
        assert!((pose.roll - 26.565).abs() < 0.01);
        assert_eq!(
            check_head_pose(&pose, &LIMITS).message,
            "Head is tilted to the right"
        );
    }

    #[test]
    fn test_degenerate_eyes_fault() {
        let mut points = vec![[0.5, 0.5]; MESH_POINTS];
        points[NOSE_TIP] = [0.5, 0.6];
        let lm = LandmarkSet::new(points).unwrap();
        assert!(estimate_pose(&lm, 100, 100).is_err());
    }
}
