use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::error::{FaceGateError, Result};
use crate::settings::InputOptions;

/// Where a request's image comes from. Resolved once, at the boundary.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Path(PathBuf),
    /// Encoded bytes plus the name the output file is derived from.
    Buffer { name: String, bytes: Vec<u8> },
}

/// Decoded request image.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub pixels: RgbImage,
    /// File stem used to name the aligned output.
    pub stem: String,
}

impl ImageSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        ImageSource::Path(path.into())
    }

    pub fn display_name(&self) -> String {
        match self {
            ImageSource::Path(p) => p.display().to_string(),
            ImageSource::Buffer { name, .. } => name.clone(),
        }
    }

    /// Read, check and decode the source into RGB pixels.
    pub fn load(&self, opts: &InputOptions) -> Result<LoadedImage> {
        match self {
            ImageSource::Path(path) => {
                check_extension(path, opts)?;
                let meta = std::fs::metadata(path).map_err(|_| {
                    FaceGateError::Input(format!(
                        "Invalid or non-existent image path: {}",
                        path.display()
                    ))
                })?;
                check_size(meta.len(), opts)?;
                let bytes = std::fs::read(path).map_err(|e| {
                    FaceGateError::Input(format!("Could not read image from {}: {e}", path.display()))
                })?;
                decode(&bytes, &path.display().to_string(), stem_of(path))
            }
            ImageSource::Buffer { name, bytes } => {
                check_size(bytes.len() as u64, opts)?;
                decode(bytes, name, stem_of(Path::new(name)))
            }
        }
    }
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string())
}

fn check_extension(path: &Path, opts: &InputOptions) -> Result<()> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if opts.extensions.iter().any(|allowed| *allowed == ext) {
        Ok(())
    } else {
        Err(FaceGateError::Input(format!(
            "Invalid file type. Use {}",
            opts.extensions
                .iter()
                .map(|e| format!("'{e}'"))
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }
}

fn check_size(len: u64, opts: &InputOptions) -> Result<()> {
    if len > opts.max_bytes {
        return Err(FaceGateError::Input(format!(
            "File size too large. Maximum file size is {} bytes",
            opts.max_bytes
        )));
    }
    Ok(())
}

fn decode(bytes: &[u8], name: &str, stem: String) -> Result<LoadedImage> {
    let img = image::load_from_memory(bytes).map_err(|source| FaceGateError::Decode {
        source_name: name.to_string(),
        source,
    })?;
    Ok(LoadedImage {
        pixels: img.to_rgb8(),
        stem,
    })
}
