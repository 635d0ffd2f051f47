//! Face-mesh landmark topology and the per-request detection types.
//!
//! The mesh is the 468-point MediaPipe topology. Only a few index subsets are
//! interpreted here: the eye and mouth contours used by alignment, the EAR
//! points used by the eye-openness check, and the head/chin extremes used by
//! the framing check.

use anyhow::{bail, Result};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

pub type Point = Vector2<f64>;

/// Number of points in one face mesh.
pub const MESH_POINTS: usize = 468;

pub const LEFT_EYE_CONTOUR: [usize; 16] = [
    33, 246, 161, 160, 159, 158, 157, 173, 133, 155, 154, 153, 145, 144, 163, 7,
];
pub const RIGHT_EYE_CONTOUR: [usize; 17] = [
    463, 398, 384, 385, 386, 387, 388, 466, 263, 249, 390, 373, 374, 380, 381, 382, 362,
];
/// Outer lip contour, starting at the left corner and running clockwise.
pub const MOUTH_OUTER: [usize; 20] = [
    61, 146, 91, 181, 84, 17, 314, 405, 321, 375, 291, 409, 270, 269, 267, 0, 37, 39, 40, 185,
];
pub const MOUTH_LEFT: usize = MOUTH_OUTER[0];
pub const MOUTH_RIGHT: usize = MOUTH_OUTER[10];

pub const TOP_OF_HEAD: usize = 10;
pub const CHIN: usize = 152;
pub const NOSE_TIP: usize = 1;

/// EAR sample points per eye: outer corner, two upper lid points, inner
/// corner, two lower lid points (p1..p6).
pub const LEFT_EYE_EAR: [usize; 6] = [33, 160, 158, 133, 153, 144];
pub const RIGHT_EYE_EAR: [usize; 6] = [362, 385, 387, 263, 373, 380];

/// Normalized landmark mesh for one face.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<[f32; 2]>,
}

impl LandmarkSet {
    /// Wrap detector output, rejecting meshes with the wrong topology.
    pub fn new(points: Vec<[f32; 2]>) -> Result<Self> {
        if points.len() != MESH_POINTS {
            bail!(
                "Landmark count mismatch: expected {}, got {}",
                MESH_POINTS,
                points.len()
            );
        }
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn normalized(&self, index: usize) -> [f32; 2] {
        self.points[index]
    }

    /// Landmark `index` in pixel space of a `width`×`height` image.
    pub fn pixel(&self, index: usize, width: u32, height: u32) -> Point {
        let [x, y] = self.points[index];
        Point::new(x as f64 * width as f64, y as f64 * height as f64)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f32; 2]> {
        self.points.iter()
    }
}

/// Pixel-space face rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Tight box around every landmark of the mesh.
    pub fn from_landmarks(landmarks: &LandmarkSet, width: u32, height: u32) -> Self {
        let mut min = [f64::MAX; 2];
        let mut max = [f64::MIN; 2];
        for i in 0..landmarks.len() {
            let p = landmarks.pixel(i, width, height);
            min[0] = min[0].min(p.x);
            min[1] = min[1].min(p.y);
            max[0] = max[0].max(p.x);
            max[1] = max[1].max(p.y);
        }
        let x = min[0].floor() as i32;
        let y = min[1].floor() as i32;
        Self {
            x,
            y,
            width: (max[0].ceil() as i32 - x).max(0) as u32,
            height: (max[1].ceil() as i32 - y).max(0) as u32,
        }
    }

    /// Box relative to the image dimensions.
    pub fn normalize(&self, width: u32, height: u32) -> NormalizedBox {
        let (w, h) = (width.max(1) as f64, height.max(1) as f64);
        NormalizedBox {
            x: self.x as f64 / w,
            y: self.y as f64 / h,
            width: self.width as f64 / w,
            height: self.height as f64 / h,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// What a landmark provider found in one image.
#[derive(Debug, Clone)]
pub struct FaceDetection {
    pub landmarks: LandmarkSet,
    pub bbox: Option<BoundingBox>,
}
