use anyhow::{Context, Result};
use image::{imageops::FilterType, RgbImage};
use ndarray::Array4;
use ort::{session::Session, value::Value};

use crate::landmarks::{BoundingBox, FaceDetection, LandmarkSet, MESH_POINTS};
use crate::settings::DetectorOptions;
use crate::yunet::{self, FaceBox};

/// Source of face meshes.
///
/// Implementations may hold expensive, non thread-safe state (an inference
/// session); `detect` takes `&mut self` so one handle serves one worker.
pub trait LandmarkProvider {
    /// `Ok(None)` when no face is found.
    fn detect(&mut self, image: &RgbImage) -> Result<Option<FaceDetection>>;
}

/// Two-stage landmark provider: YuNet finds the most confident face, the
/// face-mesh model then runs on a square crop around it.
pub struct FaceMesh {
    detector: Session,
    mesh: Session,
    opts: DetectorOptions,
}

/// Where the frame sits inside the square model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub offset_x: u32,
    pub offset_y: u32,
}

impl Letterbox {
    pub fn new(width: u32, height: u32, target: u32) -> Self {
        let scale = target as f32 / width.max(height).max(1) as f32;
        let new_w = (width as f32 * scale) as u32;
        let new_h = (height as f32 * scale) as u32;
        Self {
            scale,
            offset_x: (target - new_w.min(target)) / 2,
            offset_y: (target - new_h.min(target)) / 2,
        }
    }

    /// Model-input pixel to frame pixel.
    pub fn to_frame(&self, x: f32, y: f32) -> [f32; 2] {
        [
            (x - self.offset_x as f32) / self.scale,
            (y - self.offset_y as f32) / self.scale,
        ]
    }

    /// Model-input pixel to normalized frame coordinate.
    pub fn to_normalized(&self, x: f32, y: f32, width: u32, height: u32) -> [f32; 2] {
        let [fx, fy] = self.to_frame(x, y);
        [fx / width as f32, fy / height as f32]
    }

    /// Resize `image` into the `target`×`target` black canvas.
    fn apply(&self, image: &RgbImage, target: u32) -> RgbImage {
        let (w, h) = image.dimensions();
        let new_w = ((w as f32 * self.scale) as u32).clamp(1, target);
        let new_h = ((h as f32 * self.scale) as u32).clamp(1, target);
        let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);
        let mut canvas = RgbImage::new(target, target);
        image::imageops::overlay(&mut canvas, &resized, self.offset_x as i64, self.offset_y as i64);
        canvas
    }
}

/// Square region of the frame the mesh model looks at. It may reach past
/// the frame edges; those pixels are black.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceCrop {
    pub x: i64,
    pub y: i64,
    pub side: u32,
}

impl FaceCrop {
    /// Square centred on `face` (frame pixels), `scale` times its larger side.
    pub fn around(face: &FaceBox, scale: f32) -> Self {
        let cx = face.x + face.width / 2.0;
        let cy = face.y + face.height / 2.0;
        let side = (face.width.max(face.height) * scale).round().max(1.0);
        Self {
            x: (cx - side / 2.0).round() as i64,
            y: (cy - side / 2.0).round() as i64,
            side: side as u32,
        }
    }

    pub fn extract(&self, image: &RgbImage) -> RgbImage {
        let mut crop = RgbImage::new(self.side, self.side);
        image::imageops::overlay(&mut crop, image, -self.x, -self.y);
        crop
    }

    /// Crop-normalized point to normalized frame coordinate.
    pub fn to_frame_normalized(&self, p: [f32; 2], width: u32, height: u32) -> [f32; 2] {
        let side = self.side as f32;
        [
            (self.x as f32 + p[0] * side) / width as f32,
            (self.y as f32 + p[1] * side) / height as f32,
        ]
    }
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// `[1, S, S, 3]` RGB in [0, 1], as the mesh model expects.
fn nhwc_unit(canvas: &RgbImage) -> Result<Array4<f32>> {
    let size = canvas.width() as usize;
    let data: Vec<f32> = canvas.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
    Ok(Array4::from_shape_vec((1, size, size, 3), data)?)
}

/// `[1, 3, S, S]` BGR in [0, 255], as YuNet expects.
fn nchw_bgr(canvas: &RgbImage) -> Result<Array4<f32>> {
    let size = canvas.width() as usize;
    let plane = size * size;
    let mut data = vec![0.0f32; 3 * plane];
    for (i, px) in canvas.pixels().enumerate() {
        data[i] = px[2] as f32;
        data[plane + i] = px[1] as f32;
        data[2 * plane + i] = px[0] as f32;
    }
    Ok(Array4::from_shape_vec((1, 3, size, size), data)?)
}

impl FaceMesh {
    pub fn new(opts: &DetectorOptions) -> Result<Self> {
        if opts.face_input_size == 0 || opts.face_input_size % 32 != 0 {
            anyhow::bail!(
                "face_input_size must be a positive multiple of 32, got {}",
                opts.face_input_size
            );
        }
        Ok(Self {
            detector: crate::model::detector_session(&opts.face_model)?,
            mesh: crate::model::mesh_session(&opts.model)?,
            opts: opts.clone(),
        })
    }

    /// Faces in frame pixels, best first.
    fn find_faces(&mut self, image: &RgbImage) -> Result<Vec<FaceBox>> {
        let target = self.opts.face_input_size;
        let (w, h) = image.dimensions();
        let lb = Letterbox::new(w, h, target);
        let input = Value::from_array(nchw_bgr(&lb.apply(image, target))?)?;
        let outputs = self.detector.run(ort::inputs![input])?;

        let mut output_data: Vec<(Vec<i64>, Vec<f32>)> = Vec::new();
        for (_name, output) in outputs.iter() {
            let (shape, data) = output.try_extract_tensor::<f32>()?;
            output_data.push((shape.iter().copied().collect(), data.to_vec()));
        }
        let output_refs: Vec<(&[i64], &[f32])> = output_data
            .iter()
            .map(|(s, d)| (s.as_slice(), d.as_slice()))
            .collect();

        let faces = yunet::decode(&output_refs, target as usize, self.opts.face_score_threshold)?;
        let faces = yunet::nms(faces, self.opts.nms_threshold)
            .into_iter()
            .map(|f| {
                let [x, y] = lb.to_frame(f.x, f.y);
                FaceBox {
                    x,
                    y,
                    width: f.width / lb.scale,
                    height: f.height / lb.scale,
                    score: f.score,
                }
            })
            .collect();
        Ok(faces)
    }

    /// Run the mesh on `crop`; points come back crop-normalized.
    fn mesh_points(&mut self, crop: &RgbImage) -> Result<Option<Vec<[f32; 2]>>> {
        let target = self.opts.input_size;
        let side = crop.width();
        let lb = Letterbox::new(side, side, target);
        let input = Value::from_array(nhwc_unit(&lb.apply(crop, target))?)?;
        let outputs = self.mesh.run(ort::inputs![input])?;

        let mut mesh: Option<Vec<f32>> = None;
        let mut score: Option<f32> = None;
        for (_name, output) in outputs.iter() {
            let (_shape, data) = output.try_extract_tensor::<f32>()?;
            if data.len() >= MESH_POINTS * 3 && mesh.is_none() {
                mesh = Some(data[..MESH_POINTS * 3].to_vec());
            } else if data.len() == 1 && score.is_none() {
                score = Some(sigmoid(data[0]));
            }
        }
        let mesh = mesh.context("face mesh model produced no landmark tensor")?;

        if let Some(score) = score {
            log::debug!("face presence score {score:.3}");
            if score < self.opts.score_threshold {
                return Ok(None);
            }
        }
        Ok(Some(
            mesh.chunks_exact(3)
                .map(|p| lb.to_normalized(p[0], p[1], side, side))
                .collect(),
        ))
    }
}

impl LandmarkProvider for FaceMesh {
    fn detect(&mut self, image: &RgbImage) -> Result<Option<FaceDetection>> {
        let (w, h) = image.dimensions();
        let faces = self.find_faces(image)?;
        let Some(face) = faces.first() else {
            return Ok(None);
        };
        log::debug!(
            "{} face(s), best {:.3} at ({:.0}, {:.0}) {:.0}x{:.0}",
            faces.len(),
            face.score,
            face.x,
            face.y,
            face.width,
            face.height
        );

        let crop = FaceCrop::around(face, self.opts.crop_scale);
        let Some(points) = self.mesh_points(&crop.extract(image))? else {
            return Ok(None);
        };
        let points = points
            .into_iter()
            .map(|p| crop.to_frame_normalized(p, w, h))
            .collect();
        let landmarks = LandmarkSet::new(points)?;
        let bbox = BoundingBox::from_landmarks(&landmarks, w, h);
        Ok(Some(FaceDetection {
            landmarks,
            bbox: Some(bbox),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn face(x: f32, y: f32, width: f32, height: f32) -> FaceBox {
        FaceBox {
            x,
            y,
            width,
            height,
            score: 0.9,
        }
    }

    #[test]
    fn test_letterbox_landscape() {
        let lb = Letterbox::new(400, 200, 192);
        assert!((lb.scale - 0.48).abs() < 1e-6);
        assert_eq!(lb.offset_x, 0);
        assert_eq!(lb.offset_y, 48);
        let p = lb.to_normalized(96.0, 96.0, 400, 200);
        assert!((p[0] - 0.5).abs() < 1e-4);
        assert!((p[1] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_letterbox_canvas() {
        let image = RgbImage::from_pixel(40, 20, Rgb([200, 200, 200]));
        let lb = Letterbox::new(40, 20, 16);
        let canvas = lb.apply(&image, 16);
        assert_eq!(canvas.dimensions(), (16, 16));
        assert_eq!(canvas.get_pixel(8, 0), &Rgb([0, 0, 0]));
        assert_eq!(canvas.get_pixel(8, 8), &Rgb([200, 200, 200]));
    }

    #[test]
    fn test_crop_is_square_around_face() {
        let crop = FaceCrop::around(&face(1000.0, 400.0, 300.0, 400.0), 1.25);
        assert_eq!(crop.side, 500);
        assert_eq!(crop.x, 900);
        assert_eq!(crop.y, 350);
    }

    #[test]
    fn test_crop_points_map_back_to_frame() {
        // 300 px face in a 1920x1080 photo
        let (w, h) = (1920, 1080);
        let crop = FaceCrop::around(&face(800.0, 300.0, 300.0, 300.0), 1.25);
        assert_eq!((crop.x, crop.y, crop.side), (763, 263, 375));

        let center = crop.to_frame_normalized([0.5, 0.5], w, h);
        assert!((center[0] * w as f32 - 950.5).abs() < 1e-3);
        assert!((center[1] * h as f32 - 450.5).abs() < 1e-3);

        let corner = crop.to_frame_normalized([1.0, 1.0], w, h);
        assert!((corner[0] * w as f32 - 1138.0).abs() < 1e-3);
        assert!((corner[1] * h as f32 - 638.0).abs() < 1e-3);
    }

    #[test]
    fn test_mesh_coordinates_round_trip_through_crop() {
        // A landmark the model reports at input pixel (48, 144) of a 192 input.
        let (w, h) = (640, 480);
        let crop = FaceCrop::around(&face(200.0, 100.0, 160.0, 160.0), 1.2);
        let lb = Letterbox::new(crop.side, crop.side, 192);
        let p = lb.to_normalized(48.0, 144.0, crop.side, crop.side);
        let frame = crop.to_frame_normalized(p, w, h);
        let px = [frame[0] * w as f32, frame[1] * h as f32];
        assert!((px[0] - (crop.x as f32 + crop.side as f32 * 0.25)).abs() < 1e-3);
        assert!((px[1] - (crop.y as f32 + crop.side as f32 * 0.75)).abs() < 1e-3);
    }

    #[test]
    fn test_crop_past_the_edge_is_black() {
        let image = RgbImage::from_pixel(100, 100, Rgb([255, 255, 255]));
        let crop = FaceCrop::around(&face(-10.0, -10.0, 40.0, 40.0), 1.0);
        assert_eq!((crop.x, crop.y), (-10, -10));
        let pixels = crop.extract(&image);
        assert_eq!(pixels.dimensions(), (40, 40));
        assert_eq!(pixels.get_pixel(5, 5), &Rgb([0, 0, 0]));
        assert_eq!(pixels.get_pixel(15, 15), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_bgr_planes() {
        let image = RgbImage::from_pixel(2, 2, Rgb([10, 20, 30]));
        let t = nchw_bgr(&image).unwrap();
        assert_eq!(t[[0, 0, 1, 1]], 30.0);
        assert_eq!(t[[0, 1, 1, 1]], 20.0);
        assert_eq!(t[[0, 2, 1, 1]], 10.0);
    }

    #[test]
    fn test_detector_input_must_be_stride_aligned() {
        let opts = DetectorOptions {
            face_input_size: 100,
            ..DetectorOptions::default()
        };
        let err = FaceMesh::new(&opts).err().unwrap();
        assert!(err.to_string().contains("multiple of 32"));
    }

    #[test]
    fn test_sigmoid() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(10.0) > 0.99);
    }
}
