pub mod align;
pub mod battery;
pub mod checks;
pub mod detect;
pub mod error;
pub mod geometry;
pub mod landmarks;
pub mod model;
pub mod outcome;
pub mod pipeline;
pub mod settings;
pub mod source;
pub mod yunet;

// Re-export commonly used types
pub use detect::{FaceCrop, FaceMesh, LandmarkProvider};
pub use error::FaceGateError;
pub use landmarks::{BoundingBox, FaceDetection, LandmarkSet};
pub use outcome::ProcessingResult;
pub use pipeline::{Pipeline, PipelineOptions};
pub use settings::{AlignOptions, DetectorOptions, InputOptions, Thresholds};
pub use source::ImageSource;
