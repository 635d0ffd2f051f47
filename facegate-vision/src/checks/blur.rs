use image::RgbImage;
use log::{debug, info};
use ndarray::Array2;

use super::Verdict;
use crate::landmarks::{BoundingBox, Point};

/// Luma as produced by the usual BT.601 RGB→gray conversion.
pub(crate) fn luma(r: u8, g: u8, b: u8) -> f64 {
    (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64).round()
}

/// Whether `p` lies inside or on the convex polygon `contour`.
fn inside_convex(contour: &[Point], p: Point) -> bool {
    let mut sign = 0.0f64;
    for (i, a) in contour.iter().enumerate() {
        let b = contour[(i + 1) % contour.len()];
        let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
        if cross != 0.0 {
            if sign != 0.0 && cross.signum() != sign {
                return false;
            }
            sign = cross.signum();
        }
    }
    true
}

/// Grayscale crop of the contour's bounding rectangle with everything outside
/// the contour painted white. `None` when the region is empty.
pub fn patch_from_contour(image: &RgbImage, contour: &[Point]) -> Option<Array2<f64>> {
    if contour.is_empty() {
        return None;
    }
    let (w, h) = image.dimensions();
    let min_x = contour.iter().map(|p| p.x).fold(f64::MAX, f64::min);
    let max_x = contour.iter().map(|p| p.x).fold(f64::MIN, f64::max);
    let min_y = contour.iter().map(|p| p.y).fold(f64::MAX, f64::min);
    let max_y = contour.iter().map(|p| p.y).fold(f64::MIN, f64::max);

    let xmin = (min_x as i64).max(0);
    let xmax = (max_x as i64).min(w as i64);
    let ymin = (min_y as i64).max(0);
    let ymax = (max_y as i64).min(h as i64);
    if xmax <= xmin || ymax <= ymin {
        return None;
    }

    let rows = (ymax - ymin) as usize;
    let cols = (xmax - xmin) as usize;
    let patch = Array2::from_shape_fn((rows, cols), |(r, c)| {
        let (x, y) = (xmin as u32 + c as u32, ymin as u32 + r as u32);
        if inside_convex(contour, Point::new(x as f64, y as f64)) {
            let px = image.get_pixel(x, y);
            luma(px[0], px[1], px[2])
        } else {
            255.0
        }
    });
    Some(patch)
}

/// Population variance of the 4-neighbour Laplacian, mirrored borders
/// (edge pixel not repeated).
pub fn laplacian_variance(gray: &Array2<f64>) -> f64 {
    let (rows, cols) = gray.dim();
    if rows == 0 || cols == 0 {
        return 0.0;
    }
    let reflect = |i: isize, n: usize| -> usize {
        if n == 1 {
            return 0;
        }
        let n = n as isize;
        let i = if i < 0 { -i } else { i };
        (if i >= n { 2 * (n - 1) - i } else { i }) as usize
    };

    let lap = Array2::from_shape_fn((rows, cols), |(r, c)| {
        let (ri, ci) = (r as isize, c as isize);
        gray[[reflect(ri - 1, rows), c]]
            + gray[[reflect(ri + 1, rows), c]]
            + gray[[r, reflect(ci - 1, cols)]]
            + gray[[r, reflect(ci + 1, cols)]]
            - 4.0 * gray[[r, c]]
    });
    lap.var(0.0)
}

/// Face region must be sharp: Laplacian variance at least `threshold`.
pub fn check_blur(image: &RgbImage, bbox: Option<&BoundingBox>, threshold: f64) -> Verdict {
    if threshold <= 0.0 {
        info!("BLUR | threshold must be positive");
        return Verdict::fail("Threshold must be positive");
    }
    let Some(bbox) = bbox else {
        info!("BLUR | no face detected");
        return Verdict::fail("No face detected");
    };

    let (x0, y0) = (bbox.x as f64, bbox.y as f64);
    let (x1, y1) = (x0 + bbox.width as f64, y0 + bbox.height as f64);
    let contour = [
        Point::new(x0, y0),
        Point::new(x1, y0),
        Point::new(x1, y1),
        Point::new(x0, y1),
    ];
    let Some(face) = patch_from_contour(image, &contour) else {
        info!("BLUR | invalid face region {bbox:?}");
        return Verdict::fail("Invalid face region");
    };

    let variance = laplacian_variance(&face);
    debug!("BLUR | laplacian variance {variance:.2} (threshold {threshold})");
    if variance < threshold {
        info!("BLUR | image is blurry ({variance:.2} < {threshold})");
        Verdict::fail("Image is blurry")
    } else {
        Verdict::pass("Image isn't blurry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn checkerboard(size: u32, cell: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    #[test]
    fn test_nonpositive_threshold() {
        let img = checkerboard(10, 2);
        for th in [0.0, -5.0] {
            let v = check_blur(&img, Some(&BoundingBox::new(0, 0, 10, 10)), th);
            assert!(!v.passed);
            assert_eq!(v.message, "Threshold must be positive");
        }
    }

    #[test]
    fn test_threshold_checked_before_face() {
        let img = checkerboard(10, 2);
        assert_eq!(check_blur(&img, None, 0.0).message, "Threshold must be positive");
        assert_eq!(check_blur(&img, None, 10.0).message, "No face detected");
    }

    #[test]
    fn test_flat_region_is_blurry() {
        let img = RgbImage::from_pixel(40, 40, Rgb([120, 120, 120]));
        let v = check_blur(&img, Some(&BoundingBox::new(5, 5, 30, 30)), 1.0);
        assert!(!v.passed);
        assert_eq!(v.message, "Image is blurry");
    }

    #[test]
    fn test_textured_region_is_sharp() {
        let img = checkerboard(40, 1);
        let v = check_blur(&img, Some(&BoundingBox::new(5, 5, 30, 30)), 100.0);
        assert!(v.passed, "{}", v.message);
    }

    #[test]
    fn test_box_outside_image() {
        let img = checkerboard(20, 2);
        let v = check_blur(&img, Some(&BoundingBox::new(50, 50, 10, 10)), 10.0);
        assert_eq!(v.message, "Invalid face region");
    }

    #[test]
    fn test_laplacian_of_constant_is_zero() {
        let flat = Array2::from_elem((5, 7), 42.0);
        assert_eq!(laplacian_variance(&flat), 0.0);
    }

    #[test]
    fn test_laplacian_single_spike() {
        let mut g = Array2::zeros((3, 3));
        g[[1, 1]] = 1.0;
        // centre -4, edge midpoints +2 (mirrored), corners 0
        // mean = (-4 + 4 * 2) / 9, E[x^2] = (16 + 4 * 4) / 9
        let mean = 4.0 / 9.0;
        let expected = 32.0 / 9.0 - mean * mean;
        assert!((laplacian_variance(&g) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_patch_masks_outside_white() {
        let img = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
        let triangle = [
            Point::new(0.0, 0.0),
            Point::new(9.0, 0.0),
            Point::new(0.0, 9.0),
        ];
        let patch = patch_from_contour(&img, &triangle).unwrap();
        assert_eq!(patch[[0, 0]], 0.0);
        assert_eq!(patch[[8, 8]], 255.0);
    }
}
