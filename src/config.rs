use anyhow::{Context, Result};
use facegate_vision::{AlignOptions, DetectorOptions, InputOptions, PipelineOptions, Thresholds};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub static CONFIG_PATH: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("FACEGATE_CONFIG_PATH").unwrap_or("/usr/local/etc/facegate/config.toml"))
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub threshold: Thresholds,
    pub align: AlignOptions,
    pub detector: DetectorOptions,
    pub input: InputOptions,
}

impl Config {
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            thresholds: self.threshold.clone(),
            align: self.align.clone(),
            input: self.input.clone(),
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data).with_context(|| format!("writing config {}", path.display()))?;
    Ok(())
}
