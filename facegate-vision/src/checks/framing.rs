use log::{debug, info};

use super::Verdict;
use crate::landmarks::{LandmarkSet, CHIN, TOP_OF_HEAD};

/// Top of head and chin must both stay `head_fully_th` pixels inside the frame.
pub fn check_head_fully_visible(
    landmarks: &LandmarkSet,
    image_height: u32,
    head_fully_th: f64,
) -> Verdict {
    let height = image_height as f64;
    let top_y = landmarks.normalized(TOP_OF_HEAD)[1] as f64 * height;
    let chin_y = landmarks.normalized(CHIN)[1] as f64 * height;
    debug!("FRAMING | top_y={top_y:.1} chin_y={chin_y:.1} th={head_fully_th}");

    let top_cut = top_y < head_fully_th;
    let chin_cut = chin_y > height - head_fully_th;

    let message = match (top_cut, chin_cut) {
        (true, true) => "Top of head and chin might be cut",
        (true, false) => "Top of head might be cut",
        (false, true) => "Chin might be cut",
        (false, false) => return Verdict::pass("Head is fully visible"),
    };
    info!("FRAMING | {message}");
    Verdict::fail(message)
}
