use std::io::{BufWriter, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use log::{debug, info, warn};
use tempfile::NamedTempFile;

use crate::align::align_face;
use crate::battery::{panic_reason, CheckOutcome};
use crate::checks::{face_battery, CheckInput};
use crate::detect::{FaceMesh, LandmarkProvider};
use crate::error::{FaceGateError, Result};
use crate::outcome::ProcessingResult;
use crate::settings::{AlignOptions, DetectorOptions, InputOptions, Thresholds};
use crate::source::ImageSource;

/// Read-only knobs for every request a pipeline serves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineOptions {
    pub thresholds: Thresholds,
    pub align: AlignOptions,
    pub input: InputOptions,
}

/// Full pipeline: load → detect → check → align → write.
///
/// Owns the landmark provider; one pipeline per worker.
pub struct Pipeline<P = FaceMesh> {
    pub provider: P,
    pub options: PipelineOptions,
}

impl Pipeline<FaceMesh> {
    pub fn new(detector: &DetectorOptions, options: PipelineOptions) -> anyhow::Result<Self> {
        Ok(Self {
            provider: FaceMesh::new(detector)?,
            options,
        })
    }
}

impl<P: LandmarkProvider> Pipeline<P> {
    pub fn with_provider(provider: P, options: PipelineOptions) -> Self {
        Self { provider, options }
    }

    /// Process one image, writing the aligned face into `output_dir` on
    /// success. Never fails: every error ends up in the returned record.
    pub fn process(&mut self, source: &ImageSource, output_dir: &Path) -> ProcessingResult {
        let mut checks = Vec::new();
        match self.run(source, output_dir, &mut checks) {
            Ok(result) => result,
            Err(err) => {
                info!("{}: {} ({})", source.display_name(), err, err.kind());
                ProcessingResult::rejected(&err, checks)
            }
        }
    }

    fn run(
        &mut self,
        source: &ImageSource,
        output_dir: &Path,
        checks: &mut Vec<CheckOutcome>,
    ) -> Result<ProcessingResult> {
        let loaded = source.load(&self.options.input)?;
        let image = &loaded.pixels;
        let (w, h) = image.dimensions();
        debug!("{}: decoded {w}x{h}", source.display_name());

        let detection = self
            .provider
            .detect(image)
            .map_err(|e| FaceGateError::Detection(format!("Landmark detection failed: {e:#}")))?
            .ok_or_else(|| FaceGateError::Detection("No face detected".into()))?;
        let bbox = detection.bbox;

        let input = CheckInput {
            image,
            landmarks: Some(&detection.landmarks),
            bbox: bbox.as_ref(),
            detected: true,
            detection_message: "Face detected",
            thresholds: &self.options.thresholds,
        };
        let report = face_battery().run(&input);
        *checks = report.outcomes.clone();
        if let Some(failed) = report.first_failure() {
            return Err(FaceGateError::Validation(failed.message.clone()));
        }

        let aligned = guard_alignment(|| {
            align_face(image, Some(&detection.landmarks), &self.options.align)
        })?
        .ok_or_else(|| FaceGateError::Alignment("no landmarks to align".into()))?;
        let path = output_dir.join(format!("{}_aligned.png", loaded.stem));
        write_png(&aligned, &path)?;
        info!("{}: aligned face saved to {}", source.display_name(), path.display());

        Ok(ProcessingResult::accepted(
            path,
            bbox,
            bbox.map(|b| b.normalize(w, h)),
            report.outcomes,
        ))
    }
}

/// Run an alignment step, turning a panic into an alignment failure.
fn guard_alignment<T>(step: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(step)).unwrap_or_else(|payload| {
        let reason = panic_reason(payload.as_ref());
        warn!("alignment panicked: {reason}");
        Err(FaceGateError::Alignment(reason))
    })
}

/// Write through a temporary file in the target directory so a failed write
/// never leaves a partial image behind.
pub fn write_png(image: &RgbImage, path: &Path) -> Result<()> {
    let io_err = |source| FaceGateError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir).map_err(io_err)?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        image
            .write_to(&mut writer, ImageFormat::Png)
            .map_err(|e| io_err(std::io::Error::other(e)))?;
        writer.flush().map_err(io_err)?;
    }
    tmp.persist(path).map_err(|e| {
        warn!("could not move aligned face into place: {}", e.error);
        io_err(e.error)
    })?;
    Ok(())
}
