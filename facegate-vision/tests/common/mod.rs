#![allow(dead_code)]

use anyhow::Result;
use facegate_vision::landmarks::{
    CHIN, LEFT_EYE_CONTOUR, LEFT_EYE_EAR, MESH_POINTS, MOUTH_LEFT, MOUTH_RIGHT, NOSE_TIP,
    RIGHT_EYE_CONTOUR, RIGHT_EYE_EAR, TOP_OF_HEAD,
};
use facegate_vision::{
    AlignOptions, BoundingBox, FaceDetection, LandmarkProvider, LandmarkSet, PipelineOptions,
    Thresholds,
};
use image::{Rgb, RgbImage};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Provider that replays a fixed answer and counts calls.
pub struct Scripted {
    pub answer: Option<FaceDetection>,
    pub fail: bool,
    pub calls: usize,
}

impl Scripted {
    pub fn found(detection: FaceDetection) -> Self {
        Self {
            answer: Some(detection),
            fail: false,
            calls: 0,
        }
    }

    pub fn nothing() -> Self {
        Self {
            answer: None,
            fail: false,
            calls: 0,
        }
    }

    pub fn broken() -> Self {
        Self {
            answer: None,
            fail: true,
            calls: 0,
        }
    }
}

impl LandmarkProvider for Scripted {
    fn detect(&mut self, _image: &RgbImage) -> Result<Option<FaceDetection>> {
        self.calls += 1;
        if self.fail {
            anyhow::bail!("model crashed");
        }
        Ok(self.answer.clone())
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub const SIZE: u32 = 400;

/// Even, well exposed, sharp texture.
pub fn textured_image(seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    RgbImage::from_fn(SIZE, SIZE, |_, _| {
        let v = rng.gen_range(70u8..=190);
        Rgb([v, v, v])
    })
}

fn set_eye(points: &mut [[f32; 2]], contour: &[usize], ear: &[usize; 6], cx: f32, opening: f32) {
    let y = 0.4;
    for &i in contour {
        points[i] = [cx, y];
    }
    let half = opening / 2.0;
    points[ear[0]] = [cx - 0.1, y];
    points[ear[1]] = [cx - 0.03, y - half];
    points[ear[2]] = [cx + 0.03, y - half];
    points[ear[3]] = [cx + 0.1, y];
    points[ear[4]] = [cx + 0.03, y + half];
    points[ear[5]] = [cx - 0.03, y + half];
}

/// Frontal face: eyes on y=0.4, mouth on y=0.6, head from 0.15 to 0.8.
pub fn frontal_mesh(eye_opening: f32) -> LandmarkSet {
    let mut points = vec![[0.5, 0.5]; MESH_POINTS];
    set_eye(&mut points, &LEFT_EYE_CONTOUR, &LEFT_EYE_EAR, 0.4, eye_opening);
    set_eye(&mut points, &RIGHT_EYE_CONTOUR, &RIGHT_EYE_EAR, 0.6, eye_opening);
    points[MOUTH_LEFT] = [0.45, 0.6];
    points[MOUTH_RIGHT] = [0.55, 0.6];
    points[NOSE_TIP] = [0.5, 0.5];
    points[TOP_OF_HEAD] = [0.5, 0.15];
    points[CHIN] = [0.5, 0.8];
    LandmarkSet::new(points).expect("valid mesh")
}

pub fn good_detection() -> FaceDetection {
    FaceDetection {
        landmarks: frontal_mesh(0.06),
        bbox: Some(BoundingBox::new(100, 50, 200, 280)),
    }
}

pub fn small_options() -> PipelineOptions {
    PipelineOptions {
        thresholds: Thresholds::default(),
        align: AlignOptions {
            output_size: 64,
            transform_size: 128,
        },
        ..PipelineOptions::default()
    }
}

pub fn write_png(dir: &std::path::Path, name: &str, image: &RgbImage) -> std::path::PathBuf {
    let path = dir.join(name);
    image.save(&path).expect("save input image");
    path
}
