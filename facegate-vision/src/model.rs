use std::path::Path;

use anyhow::{Context, Result};
#[cfg(any(feature = "openvino", feature = "cuda"))]
use ort::ep::{self, ExecutionProvider};
use ort::session::{
    builder::{GraphOptimizationLevel, SessionBuilder},
    Session,
};

pub fn session_builder() -> Result<SessionBuilder> {
    #[allow(unused_mut)]
    let mut builder =
        Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;

    #[cfg(feature = "openvino")]
    {
        let ep = ep::OpenVINO::default();
        if ep.is_available()? {
            ep.register(&mut builder)?;
        } else {
            log::warn!("openvino feature is enabled, onnx runtime not compiled with openvino")
        }
    }

    #[cfg(feature = "cuda")]
    {
        let ep = ep::CUDA::default();
        if ep.is_available()? {
            ep.register(&mut builder)?;
        } else {
            log::warn!("cuda feature is enabled, onnx runtime not compiled with cuda")
        }
    }

    Ok(builder)
}

fn session_from_file(path: &Path, what: &str) -> Result<Session> {
    if !path.exists() {
        anyhow::bail!("{what} model not found at {}", path.display());
    }
    session_builder()?
        .commit_from_file(path)
        .with_context(|| format!("load {what} model {}", path.display()))
}

/// Load the face-mesh landmark model.
pub fn mesh_session(path: &Path) -> Result<Session> {
    session_from_file(path, "face mesh")
}

/// Load the YuNet face detector.
pub fn detector_session(path: &Path) -> Result<Session> {
    session_from_file(path, "face detector")
}
