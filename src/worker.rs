use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use facegate_vision::{ImageSource, LandmarkProvider, Pipeline, ProcessingResult};
use log::{debug, warn};
use serde::Deserialize;

/// One JSON-lines request.
#[derive(Debug, Default, Deserialize)]
pub struct Request {
    pub file: Option<PathBuf>,
    pub files: Option<Vec<PathBuf>>,
    /// Overrides the worker's output directory for this request.
    pub output_dir: Option<PathBuf>,
}

pub fn handle_line<P: LandmarkProvider>(
    pipeline: &mut Pipeline<P>,
    line: &str,
    output_dir: &Path,
) -> ProcessingResult {
    let request: Request = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => return ProcessingResult::error(format!("Invalid request: {e}")),
    };
    if request.files.is_some() {
        return ProcessingResult::error("Batch processing not supported");
    }
    let Some(file) = request.file else {
        return ProcessingResult::error(r#"Missing required "file" or "files" field in request"#);
    };
    let out = request.output_dir.as_deref().unwrap_or(output_dir);
    pipeline.process(&ImageSource::path(file), out)
}

/// Serve requests until `input` is exhausted. Returns the number handled.
pub fn serve<P, R, W>(
    pipeline: &mut Pipeline<P>,
    input: R,
    mut output: W,
    output_dir: &Path,
) -> Result<usize>
where
    P: LandmarkProvider,
    R: BufRead,
    W: Write,
{
    let mut handled = 0;
    for line in input.lines() {
        let line = line.context("reading request")?;
        if line.trim().is_empty() {
            continue;
        }
        let result = handle_line(pipeline, &line, output_dir);
        if !result.ok {
            warn!("request rejected: {}", result.error.as_deref().unwrap_or_default());
        }
        serde_json::to_writer(&mut output, &result).context("encoding result")?;
        output.write_all(b"\n")?;
        output.flush()?;
        handled += 1;
    }
    debug!("input closed after {handled} request(s)");
    Ok(handled)
}
