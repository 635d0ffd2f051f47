//! Canonical face alignment.
//!
//! An oriented square ("quad") is derived from the eye and mouth anchors,
//! the source is shrunk, cropped and padded around it, and the quad is then
//! warped onto a `transform_size` square which is finally resampled to
//! `output_size`.

use std::borrow::Cow;

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

use crate::error::{FaceGateError, Result};
use crate::geometry::{rot90, FaceAxes};
use crate::landmarks::{LandmarkSet, Point};
use crate::settings::AlignOptions;

/// Oriented square region, corners in order: upper-left, lower-left,
/// lower-right, upper-right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub corners: [Point; 4],
    /// Side length.
    pub qsize: f64,
}

impl Quad {
    pub fn from_axes(axes: &FaceAxes) -> Result<Self> {
        let eye_dist = axes.eye_to_eye.norm();
        let mouth_dist = axes.eye_to_mouth.norm();
        if !(eye_dist > 0.0) {
            return Err(FaceGateError::Alignment(
                "eye centers coincide, orientation is undefined".into(),
            ));
        }

        let mut x = axes.eye_to_eye - rot90(&axes.eye_to_mouth);
        let len = x.norm();
        if !(len > 0.0) || !len.is_finite() {
            return Err(FaceGateError::Alignment(
                "orientation axis has zero length".into(),
            ));
        }
        x /= len;
        x *= (eye_dist * 2.0).max(mouth_dist * 1.8);
        let y = rot90(&x);
        let c = axes.eye_avg + axes.eye_to_mouth * 0.1;

        Ok(Self {
            corners: [c - x - y, c - x + y, c + x + y, c + x - y],
            qsize: x.norm() * 2.0,
        })
    }

    pub fn center(&self) -> Point {
        self.corners.iter().fold(Point::zeros(), |acc, p| acc + p) / 4.0
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            corners: self.corners.map(|p| p * factor),
            qsize: self.qsize * factor,
        }
    }

    pub fn translated(&self, offset: Point) -> Self {
        Self {
            corners: self.corners.map(|p| p + offset),
            qsize: self.qsize,
        }
    }

    /// Integer bounding rectangle `(left, top, right, bottom)`.
    fn bounds(&self) -> (i64, i64, i64, i64) {
        let min_x = self.corners.iter().map(|p| p.x).fold(f64::MAX, f64::min);
        let min_y = self.corners.iter().map(|p| p.y).fold(f64::MAX, f64::min);
        let max_x = self.corners.iter().map(|p| p.x).fold(f64::MIN, f64::max);
        let max_y = self.corners.iter().map(|p| p.y).fold(f64::MIN, f64::max);
        (
            min_x.floor() as i64,
            min_y.floor() as i64,
            max_x.ceil() as i64,
            max_y.ceil() as i64,
        )
    }

    fn border(&self) -> i64 {
        ((self.qsize * 0.1).round_ties_even() as i64).max(3)
    }
}

/// Integer downsampling factor applied before cropping.
pub fn shrink_factor(qsize: f64, output_size: u32) -> u32 {
    (qsize / output_size as f64 * 0.5).floor().max(0.0) as u32
}

/// Downsample the source when the quad is much larger than the output.
pub fn shrink<'a>(
    image: Cow<'a, RgbImage>,
    quad: Quad,
    output_size: u32,
) -> (Cow<'a, RgbImage>, Quad, u32) {
    let k = shrink_factor(quad.qsize, output_size);
    if k <= 1 {
        return (image, quad, 1);
    }
    let (w, h) = image.dimensions();
    let rw = ((w as f64 / k as f64).round_ties_even() as u32).max(1);
    let rh = ((h as f64 / k as f64).round_ties_even() as u32).max(1);
    let resized = imageops::resize(&*image, rw, rh, FilterType::Lanczos3);
    (Cow::Owned(resized), quad.scaled(1.0 / k as f64), k)
}

/// Crop to the quad plus a border when that is smaller than the image.
fn crop<'a>(image: Cow<'a, RgbImage>, quad: Quad) -> Result<(Cow<'a, RgbImage>, Quad)> {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let border = quad.border();
    let (l, t, r, b) = quad.bounds();
    let (l, t, r, b) = (
        (l - border).max(0),
        (t - border).max(0),
        (r + border).min(w),
        (b + border).min(h),
    );
    if r <= l || b <= t {
        return Err(FaceGateError::Alignment(
            "face region lies outside the image".into(),
        ));
    }
    if r - l < w || b - t < h {
        let cropped =
            imageops::crop_imm(&*image, l as u32, t as u32, (r - l) as u32, (b - t) as u32)
                .to_image();
        return Ok((
            Cow::Owned(cropped),
            quad.translated(Point::new(-(l as f64), -(t as f64))),
        ));
    }
    Ok((image, quad))
}

/// Pad with black wherever the quad still reaches past the image edges.
fn pad<'a>(image: Cow<'a, RgbImage>, quad: Quad) -> (Cow<'a, RgbImage>, Quad) {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let border = quad.border();
    let (l, t, r, b) = quad.bounds();
    let protrusion = [
        (-l + border).max(0),
        (-t + border).max(0),
        (r - w + border).max(0),
        (b - h + border).max(0),
    ];
    let largest = protrusion.iter().copied().max().unwrap_or(0);
    if largest <= border - 4 {
        return (image, quad);
    }

    let min_pad = (quad.qsize * 0.3).round_ties_even() as i64;
    let [pl, pt, pr, pb] = protrusion.map(|p| p.max(min_pad));
    let mut padded = RgbImage::new((w + pl + pr) as u32, (h + pt + pb) as u32);
    imageops::replace(&mut padded, &*image, pl, pt);
    (
        Cow::Owned(padded),
        quad.translated(Point::new(pl as f64, pt as f64)),
    )
}

/// Projective map taking the `size`×`size` output square onto `quad`.
fn square_to_quad(quad: &Quad, size: u32) -> Result<Matrix3<f64>> {
    let s = size as f64;
    let dst = [(0.0, 0.0), (0.0, s), (s, s), (s, 0.0)];
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut rhs = SVector::<f64, 8>::zeros();
    for (i, (&(u, v), p)) in dst.iter().zip(quad.corners.iter()).enumerate() {
        let (r0, r1) = (2 * i, 2 * i + 1);
        a[(r0, 0)] = u;
        a[(r0, 1)] = v;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * p.x;
        a[(r0, 7)] = -v * p.x;
        rhs[r0] = p.x;
        a[(r1, 3)] = u;
        a[(r1, 4)] = v;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -u * p.y;
        a[(r1, 7)] = -v * p.y;
        rhs[r1] = p.y;
    }
    let h = a
        .lu()
        .solve(&rhs)
        .ok_or_else(|| FaceGateError::Alignment("quad is singular".into()))?;
    Ok(Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0))
}

/// Bilinear sample at pixel-center coordinates; black outside the image.
fn sample_bilinear(image: &RgbImage, x: f64, y: f64) -> Rgb<u8> {
    let (w, h) = image.dimensions();
    if !(x >= 0.0 && y >= 0.0 && x < w as f64 && y < h as f64) {
        return Rgb([0, 0, 0]);
    }
    let (sx, sy) = (x - 0.5, y - 0.5);
    let (fx, fy) = (sx.floor(), sy.floor());
    let (dx, dy) = (sx - fx, sy - fy);
    let clamp_x = |v: f64| v.clamp(0.0, (w - 1) as f64) as u32;
    let clamp_y = |v: f64| v.clamp(0.0, (h - 1) as f64) as u32;
    let (x0, x1) = (clamp_x(fx), clamp_x(fx + 1.0));
    let (y0, y1) = (clamp_y(fy), clamp_y(fy + 1.0));

    let p00 = image.get_pixel(x0, y0);
    let p10 = image.get_pixel(x1, y0);
    let p01 = image.get_pixel(x0, y1);
    let p11 = image.get_pixel(x1, y1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] as f64 + (p10[c] as f64 - p00[c] as f64) * dx;
        let bottom = p01[c] as f64 + (p11[c] as f64 - p01[c] as f64) * dx;
        let v = top + (bottom - top) * dy;
        out[c] = (v + 0.5).clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// Warp `quad` (offset to pixel centers) onto a `size`×`size` square.
pub fn warp_quad(image: &RgbImage, quad: &Quad, size: u32) -> Result<RgbImage> {
    let centered = quad.translated(Point::new(0.5, 0.5));
    let hm = square_to_quad(&centered, size)?;
    let mut output = RgbImage::new(size, size);
    for (ox, oy, px) in output.enumerate_pixels_mut() {
        let src = hm * Vector3::new(ox as f64 + 0.5, oy as f64 + 0.5, 1.0);
        if src.z.abs() < f64::EPSILON {
            continue;
        }
        *px = sample_bilinear(image, src.x / src.z, src.y / src.z);
    }
    Ok(output)
}

/// Align the face described by `landmarks`.
///
/// Returns `Ok(None)` when there is nothing to align.
pub fn align_face(
    image: &RgbImage,
    landmarks: Option<&LandmarkSet>,
    opts: &AlignOptions,
) -> Result<Option<RgbImage>> {
    let Some(landmarks) = landmarks.filter(|lm| !lm.is_empty()) else {
        return Ok(None);
    };
    if opts.output_size == 0 || opts.transform_size == 0 {
        return Err(FaceGateError::Alignment(
            "output and transform sizes must be positive".into(),
        ));
    }
    let (w, h) = image.dimensions();
    let axes = FaceAxes::from_landmarks(landmarks, w, h);
    let quad = Quad::from_axes(&axes)?;
    log::debug!(
        "quad center ({:.1}, {:.1}), qsize {:.1}",
        quad.center().x,
        quad.center().y,
        quad.qsize
    );
    align_quad(image, quad, opts).map(Some)
}

/// Run shrink, crop, pad, warp and the final resize for a precomputed quad.
pub fn align_quad(image: &RgbImage, quad: Quad, opts: &AlignOptions) -> Result<RgbImage> {
    let (img, quad, k) = shrink(Cow::Borrowed(image), quad, opts.output_size);
    if k > 1 {
        log::debug!("shrunk source by {k}");
    }
    let (img, quad) = crop(img, quad)?;
    let (img, quad) = pad(img, quad);

    let warped = warp_quad(&img, &quad, opts.transform_size)?;
    if opts.output_size < opts.transform_size {
        Ok(imageops::resize(
            &warped,
            opts.output_size,
            opts.output_size,
            FilterType::Lanczos3,
        ))
    } else {
        Ok(warped)
    }
}
