use log::info;

use super::Verdict;
use crate::landmarks::BoundingBox;

/// Face box must be strictly larger than `min_size` in both dimensions.
pub fn check_face_size(bbox: Option<&BoundingBox>, min_size: u32) -> Verdict {
    let Some(bbox) = bbox else {
        info!("SIZE | no bounding box");
        return Verdict::fail("No bounding box provided");
    };

    if bbox.width > min_size && bbox.height > min_size {
        Verdict::pass("The face size passes the specified criteria.")
    } else {
        info!(
            "SIZE | too small ({}x{} <= {})",
            bbox.width, bbox.height, min_size
        );
        Verdict::fail("The face size does not meet the specified criteria.")
    }
}
