use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Numeric limits consumed read-only by the validator battery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum face width and height in pixels (exclusive).
    pub face_size: u32,
    /// Minimum Laplacian variance of the face region.
    pub blur: f64,
    pub dark_threshold: f64,
    pub bright_threshold: f64,
    pub diff_threshold: f64,
    /// Pixels added around the face box before measuring lighting.
    pub margin: u32,
    /// Pixels the top of head and chin must keep from the image edges.
    pub head_fully_th: f64,
    #[serde(rename = "EAR_THRESHOLD")]
    pub ear_threshold: f64,
    // Pose limits, all in degrees.
    pub left_th: f64,
    pub right_th: f64,
    pub down_th: f64,
    pub up_th: f64,
    pub til_left_th: f64,
    pub til_right_th: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            face_size: 100,
            blur: 50.0,
            dark_threshold: 60.0,
            bright_threshold: 200.0,
            diff_threshold: 40.0,
            margin: 10,
            head_fully_th: 20.0,
            ear_threshold: 0.2,
            left_th: 25.0,
            right_th: 25.0,
            down_th: 25.0,
            up_th: 25.0,
            til_left_th: 15.0,
            til_right_th: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignOptions {
    pub output_size: u32,
    pub transform_size: u32,
}

impl Default for AlignOptions {
    fn default() -> Self {
        Self {
            output_size: 1024,
            transform_size: 4096,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorOptions {
    /// Face-mesh ONNX model.
    pub model: PathBuf,
    /// Square side length the mesh model expects.
    pub input_size: u32,
    /// Minimum face-presence probability reported by the mesh model.
    pub score_threshold: f32,
    /// YuNet face detector run before the mesh.
    pub face_model: PathBuf,
    /// Square side length of the detector input, a multiple of 32.
    pub face_input_size: u32,
    pub face_score_threshold: f32,
    pub nms_threshold: f32,
    /// Side of the square mesh crop relative to the larger side of the face box.
    pub crop_scale: f32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            model: PathBuf::from("/usr/local/share/facegate/face_landmark.onnx"),
            input_size: 192,
            score_threshold: 0.5,
            face_model: PathBuf::from("/usr/local/share/facegate/face_detection_yunet_2023mar.onnx"),
            face_input_size: 640,
            face_score_threshold: 0.6,
            nms_threshold: 0.3,
            crop_scale: 1.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputOptions {
    /// Largest accepted encoded image, in bytes.
    pub max_bytes: u64,
    /// Accepted file extensions for path sources, lowercase.
    pub extensions: Vec<String>,
}

impl Default for InputOptions {
    fn default() -> Self {
        Self {
            max_bytes: 2 * 1024 * 1024,
            extensions: vec!["png".into(), "jpg".into(), "jpeg".into()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ear_key_spelling() {
        let json = serde_json::to_value(Thresholds::default()).unwrap();
        assert!(json.get("EAR_THRESHOLD").is_some());
        assert!(json.get("ear_threshold").is_none());
    }

    #[test]
    fn test_partial_thresholds_fill_defaults() {
        let t: Thresholds = serde_json::from_str(r#"{"face_size": 80}"#).unwrap();
        assert_eq!(t.face_size, 80);
        assert_eq!(t.blur, Thresholds::default().blur);
    }

    #[test]
    fn test_detector_keeps_both_models() {
        let d: DetectorOptions =
            serde_json::from_str(r#"{"face_model": "/models/yunet.onnx", "crop_scale": 1.5}"#).unwrap();
        assert_eq!(d.face_model, PathBuf::from("/models/yunet.onnx"));
        assert_eq!(d.crop_scale, 1.5);
        assert_eq!(d.model, DetectorOptions::default().model);
        assert_eq!(d.face_input_size % 32, 0);
    }
}
