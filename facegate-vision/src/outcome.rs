use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::battery::CheckOutcome;
use crate::error::FaceGateError;
use crate::landmarks::{BoundingBox, NormalizedBox};

/// Final record for one request. `ok == false` always carries `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub ok: bool,
    pub align_face: Option<PathBuf>,
    #[serde(with = "bbox_tuple")]
    pub bbox: Option<BoundingBox>,
    #[serde(with = "norm_tuple")]
    pub norm_box: Option<NormalizedBox>,
    pub error: Option<String>,
    /// Taxonomy tag of `error`, e.g. `validation_failure`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// Every battery outcome, in battery order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<CheckOutcome>,
}

impl ProcessingResult {
    pub fn accepted(
        path: PathBuf,
        bbox: Option<BoundingBox>,
        norm_box: Option<NormalizedBox>,
        checks: Vec<CheckOutcome>,
    ) -> Self {
        Self {
            ok: true,
            align_face: Some(path),
            bbox,
            norm_box,
            error: None,
            error_kind: None,
            checks,
        }
    }

    pub fn rejected(err: &FaceGateError, checks: Vec<CheckOutcome>) -> Self {
        Self {
            ok: false,
            align_face: None,
            bbox: None,
            norm_box: None,
            error: Some(err.to_string()),
            error_kind: Some(err.kind().to_string()),
            checks,
        }
    }

    /// Bare error with no request behind it (bad transport message).
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            align_face: None,
            bbox: None,
            norm_box: None,
            error: Some(message.into()),
            error_kind: None,
            checks: Vec::new(),
        }
    }
}

mod bbox_tuple {
    use super::BoundingBox;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<BoundingBox>, s: S) -> Result<S::Ok, S::Error> {
        v.map(|b| (b.x, b.y, b.width, b.height)).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<BoundingBox>, D::Error> {
        let t = Option::<(i32, i32, u32, u32)>::deserialize(d)?;
        Ok(t.map(|(x, y, w, h)| BoundingBox::new(x, y, w, h)))
    }
}

mod norm_tuple {
    use super::NormalizedBox;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<NormalizedBox>, s: S) -> Result<S::Ok, S::Error> {
        v.map(|b| (b.x, b.y, b.width, b.height)).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<NormalizedBox>, D::Error> {
        let t = Option::<(f64, f64, f64, f64)>::deserialize(d)?;
        Ok(t.map(|(x, y, width, height)| NormalizedBox {
            x,
            y,
            width,
            height,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_always_has_error() {
        let r = ProcessingResult::rejected(&FaceGateError::Detection("No face detected".into()), vec![]);
        assert!(!r.ok);
        assert_eq!(r.error.as_deref(), Some("No face detected"));
        assert_eq!(r.error_kind.as_deref(), Some("detection_error"));
        assert!(r.align_face.is_none());
    }

    #[test]
    fn test_json_shape() {
        let r = ProcessingResult::accepted(
            PathBuf::from("out/a_aligned.png"),
            Some(BoundingBox::new(1, 2, 3, 4)),
            Some(NormalizedBox {
                x: 0.5,
                y: 0.25,
                width: 0.125,
                height: 1.0,
            }),
            vec![],
        );
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["align_face"], "out/a_aligned.png");
        assert_eq!(json["bbox"], serde_json::json!([1, 2, 3, 4]));
        assert_eq!(json["norm_box"], serde_json::json!([0.5, 0.25, 0.125, 1.0]));
        assert!(json["error"].is_null());
        assert!(json.get("checks").is_none());

        let back: ProcessingResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }
}
