pub mod config;
pub mod worker;

// Re-export vision types for convenience
pub use facegate_vision::{
    FaceGateError, ImageSource, LandmarkProvider, Pipeline, PipelineOptions, ProcessingResult,
};
