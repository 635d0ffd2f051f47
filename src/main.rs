use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facegate::config::{self, Config};
use facegate::{worker, ImageSource, Pipeline};
use log::info;

#[derive(Parser)]
#[command(name = "facegate")]
#[command(version, about = "Face photo quality gate with FFHQ-style alignment")]
struct Cli {
    /// Config file (defaults to the installed location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Face-mesh ONNX model, overriding the config
    #[arg(short, long, global = true)]
    model: Option<PathBuf>,

    /// YuNet face-detector ONNX model, overriding the config
    #[arg(long, global = true)]
    face_model: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and align a single image, printing the result as JSON
    Check {
        image: PathBuf,
        /// Directory the aligned face is written to
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Serve JSON-lines requests from stdin
    Worker {
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Print the effective config
    Config {
        /// Write it to the config path instead
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load_config(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        cfg.detector.model = model;
    }
    if let Some(face_model) = cli.face_model {
        cfg.detector.face_model = face_model;
    }

    match cli.command {
        Commands::Check { image, output_dir } => check(&cfg, image, &output_dir),
        Commands::Worker { output_dir } => serve(&cfg, &output_dir),
        Commands::Config { init } => show_config(&cfg, cli.config, init),
    }
}

fn build_pipeline(cfg: &Config) -> Result<Pipeline> {
    Pipeline::new(&cfg.detector, cfg.pipeline_options())
        .context("Failed to initialize face mesh pipeline")
}

fn check(cfg: &Config, image: PathBuf, output_dir: &std::path::Path) -> Result<()> {
    let mut pipeline = build_pipeline(cfg)?;
    let result = pipeline.process(&ImageSource::path(image), output_dir);
    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.ok {
        std::process::exit(1);
    }
    Ok(())
}

fn serve(cfg: &Config, output_dir: &std::path::Path) -> Result<()> {
    let mut pipeline = build_pipeline(cfg)?;
    info!("Worker ready, reading requests from stdin");
    let handled = worker::serve(&mut pipeline, io::stdin().lock(), io::stdout().lock(), output_dir)?;
    info!("Worker done after {} request(s)", handled);
    Ok(())
}

fn show_config(cfg: &Config, path: Option<PathBuf>, init: bool) -> Result<()> {
    if init {
        let target = path.unwrap_or_else(|| config::CONFIG_PATH.to_path_buf());
        config::save_config(cfg, Some(&target))?;
        info!("Config written to {}", target.display());
    } else {
        print!("{}", toml::to_string_pretty(cfg)?);
    }
    Ok(())
}
