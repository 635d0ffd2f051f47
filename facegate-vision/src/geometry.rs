use crate::landmarks::{
    LandmarkSet, Point, LEFT_EYE_CONTOUR, MOUTH_LEFT, MOUTH_RIGHT, RIGHT_EYE_CONTOUR,
};

/// Mean position of a landmark subset, in pixels.
pub fn eye_center(landmarks: &LandmarkSet, indices: &[usize], width: u32, height: u32) -> Point {
    let sum = indices
        .iter()
        .fold(Point::zeros(), |acc, &i| acc + landmarks.pixel(i, width, height));
    sum / indices.len().max(1) as f64
}

/// Left and right mouth corners, in pixels.
pub fn mouth_corners(landmarks: &LandmarkSet, width: u32, height: u32) -> (Point, Point) {
    (
        landmarks.pixel(MOUTH_LEFT, width, height),
        landmarks.pixel(MOUTH_RIGHT, width, height),
    )
}

/// Rotate by 90 degrees: `flip(v) * [-1, 1]`.
pub fn rot90(v: &Point) -> Point {
    Point::new(-v.y, v.x)
}

/// Eye and mouth anchors shared by alignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceAxes {
    pub eye_left: Point,
    pub eye_right: Point,
    pub eye_avg: Point,
    pub eye_to_eye: Point,
    pub mouth_avg: Point,
    pub eye_to_mouth: Point,
}

impl FaceAxes {
    pub fn from_points(eye_left: Point, eye_right: Point, mouth_left: Point, mouth_right: Point) -> Self {
        let eye_avg = (eye_left + eye_right) * 0.5;
        let mouth_avg = (mouth_left + mouth_right) * 0.5;
        Self {
            eye_left,
            eye_right,
            eye_avg,
            eye_to_eye: eye_right - eye_left,
            mouth_avg,
            eye_to_mouth: mouth_avg - eye_avg,
        }
    }

    pub fn from_landmarks(landmarks: &LandmarkSet, width: u32, height: u32) -> Self {
        let eye_left = eye_center(landmarks, &LEFT_EYE_CONTOUR, width, height);
        let eye_right = eye_center(landmarks, &RIGHT_EYE_CONTOUR, width, height);
        let (mouth_left, mouth_right) = mouth_corners(landmarks, width, height);
        Self::from_points(eye_left, eye_right, mouth_left, mouth_right)
    }
}
