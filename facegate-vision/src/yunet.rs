//! YuNet face detector post-processing.
//!
//! YuNet is anchor-free: every grid cell of the stride 8, 16 and 32 feature
//! maps predicts one box. The model emits twelve tensors in this order:
//! `cls_8, cls_16, cls_32, obj_8, obj_16, obj_32, bbox_8, bbox_16, bbox_32,
//! kps_8, kps_16, kps_32`, each shaped `[1, cells, channels]`.
//!
//! Decoding per cell `(row, col)` with deltas `(dx, dy, dw, dh)`:
//! `cx = (col + dx) * stride`, `cy = (row + dy) * stride`,
//! `w = exp(dw) * stride`, `h = exp(dh) * stride`, and
//! `score = sqrt(cls * obj)`.

use anyhow::{bail, Result};

pub const STRIDES: [usize; 3] = [8, 16, 32];

/// Face box in detector-input pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub score: f32,
}

impl FaceBox {
    fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn iou(&self, other: &FaceBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);
        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }
        let inter = (x2 - x1) * (y2 - y1);
        inter / (self.area() + other.area() - inter)
    }
}

/// Borrow output `idx` after checking it is `[1, cells, channels]`.
fn tensor<'a>(
    outputs: &'a [(&'a [i64], &'a [f32])],
    idx: usize,
    cells: usize,
    channels: usize,
) -> Result<&'a [f32]> {
    let Some(&(shape, data)) = outputs.get(idx) else {
        bail!("YuNet output {idx} is missing");
    };
    let expected = [1, cells as i64, channels as i64];
    if shape != expected.as_slice() || data.len() != cells * channels {
        bail!("YuNet output {idx} has shape {shape:?}, expected {expected:?}");
    }
    Ok(data)
}

/// Decode all boxes scoring at least `score_threshold`.
pub fn decode(
    outputs: &[(&[i64], &[f32])],
    input_size: usize,
    score_threshold: f32,
) -> Result<Vec<FaceBox>> {
    let mut faces = Vec::new();
    for (level, &stride) in STRIDES.iter().enumerate() {
        let cols = input_size / stride;
        let cells = cols * cols;
        let cls = tensor(outputs, level, cells, 1)?;
        let obj = tensor(outputs, level + 3, cells, 1)?;
        let bbox = tensor(outputs, level + 6, cells, 4)?;

        for idx in 0..cells {
            let score = (cls[idx].clamp(0.0, 1.0) * obj[idx].clamp(0.0, 1.0)).sqrt();
            if score < score_threshold {
                continue;
            }
            let (row, col) = ((idx / cols) as f32, (idx % cols) as f32);
            let d = &bbox[idx * 4..idx * 4 + 4];
            let s = stride as f32;
            let cx = (col + d[0]) * s;
            let cy = (row + d[1]) * s;
            let w = d[2].exp() * s;
            let h = d[3].exp() * s;
            faces.push(FaceBox {
                x: cx - w / 2.0,
                y: cy - h / 2.0,
                width: w,
                height: h,
                score,
            });
        }
    }
    Ok(faces)
}

/// Greedy non-maximum suppression, highest score first.
pub fn nms(mut faces: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    faces.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut keep: Vec<FaceBox> = Vec::with_capacity(faces.len());
    for face in faces {
        if keep.iter().all(|k| k.iou(&face) <= iou_threshold) {
            keep.push(face);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: usize = 64;

    /// Zeroed YuNet outputs for a 64x64 input.
    fn empty_outputs() -> Vec<(Vec<i64>, Vec<f32>)> {
        let mut outputs = Vec::new();
        for channels in [1usize, 1, 4, 10] {
            for stride in STRIDES {
                let cells = (INPUT / stride).pow(2);
                outputs.push((vec![1, cells as i64, channels as i64], vec![0.0; cells * channels]));
            }
        }
        outputs
    }

    fn refs(outputs: &[(Vec<i64>, Vec<f32>)]) -> Vec<(&[i64], &[f32])> {
        outputs
            .iter()
            .map(|(s, d)| (s.as_slice(), d.as_slice()))
            .collect()
    }

    #[test]
    fn test_decode_single_cell() {
        let mut outputs = empty_outputs();
        // stride 32 grid is 2x2; light up cell (row 1, col 0)
        let idx = 2;
        outputs[2].1[idx] = 0.81;
        outputs[5].1[idx] = 1.0;
        outputs[8].1[idx * 4..idx * 4 + 4].copy_from_slice(&[0.5, 0.25, 0.0, 2f32.ln()]);

        let faces = decode(&refs(&outputs), INPUT, 0.5).unwrap();
        assert_eq!(faces.len(), 1);
        let f = faces[0];
        assert!((f.score - 0.9).abs() < 1e-6);
        // center (16, 40), size 32x64
        assert!((f.width - 32.0).abs() < 1e-4);
        assert!((f.height - 64.0).abs() < 1e-4);
        assert!((f.x - 0.0).abs() < 1e-4);
        assert!((f.y - 8.0).abs() < 1e-4);
    }

    #[test]
    fn test_low_scores_are_dropped() {
        let mut outputs = empty_outputs();
        outputs[0].1[0] = 0.2;
        outputs[3].1[0] = 0.2;
        assert!(decode(&refs(&outputs), INPUT, 0.5).unwrap().is_empty());
    }

    #[test]
    fn test_bad_shape_is_rejected() {
        let mut outputs = empty_outputs();
        outputs[6].0 = vec![1, 64, 3];
        assert!(decode(&refs(&outputs), INPUT, 0.5).is_err());
    }

    #[test]
    fn test_iou() {
        let a = FaceBox { x: 0.0, y: 0.0, width: 10.0, height: 10.0, score: 1.0 };
        let b = FaceBox { x: 5.0, ..a };
        let c = FaceBox { x: 20.0, ..a };
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
        assert_eq!(a.iou(&c), 0.0);
    }

    #[test]
    fn test_nms_keeps_best_of_overlapping() {
        let a = FaceBox { x: 0.0, y: 0.0, width: 10.0, height: 10.0, score: 0.7 };
        let b = FaceBox { x: 1.0, score: 0.9, ..a };
        let c = FaceBox { x: 50.0, score: 0.8, ..a };
        let kept = nms(vec![a, b, c], 0.3);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.9);
        assert_eq!(kept[1].score, 0.8);
    }
}
