//! CLI entry point
//!
//! Expands file and directory arguments into a deterministic input list, makes
//! sure model weights are cached, runs the batch with a progress bar, and
//! writes `_nukki.png` cutouts. Cloud enhancement is opt-in and requires a
//! stored or passed API key.

use crate::batch::remove_background_batch;
use crate::config::{ExecutionProvider, QualityPreset, RemovalOptions};
use crate::detector::PersonDetector;
use crate::download;
use crate::enhance::{EdgeEnhancer, GeminiVisionModel};
use crate::error::{NukkiError, Result};
use crate::processor::{BackgroundRemover, ImageInput};
use crate::services::io;
use crate::session_cache::SessionCache;
use crate::settings::Settings;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// Remove image backgrounds, with optional person-aware model routing
#[derive(Parser, Debug)]
#[command(name = "nukki", version, about)]
pub struct Cli {
    /// Image files or directories to process
    #[arg(required_unless_present = "set_api_key")]
    pub inputs: Vec<PathBuf>,

    /// Directory for output files (default: next to each input)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Quality preset
    #[arg(short, long, default_value = "normal")]
    pub quality: String,

    /// Segmentation model for non-portrait images
    #[arg(short, long, default_value = "birefnet-general")]
    pub model: String,

    /// Disable person detection and portrait routing
    #[arg(long)]
    pub no_person_detection: bool,

    /// Run cloud edge enhancement on each cutout
    #[arg(long)]
    pub enhance: bool,

    /// API key for cloud enhancement (overrides the stored key)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Validate and store an API key, then exit
    #[arg(long, value_name = "KEY")]
    pub set_api_key: Option<String>,

    /// Execution provider: auto, cpu, cuda or coreml
    #[arg(long, default_value = "auto")]
    pub execution_provider: String,

    /// Directory holding model weights (default: per-user cache)
    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn parse_execution_provider(name: &str) -> Result<ExecutionProvider> {
    match name {
        "auto" => Ok(ExecutionProvider::Auto),
        "cpu" => Ok(ExecutionProvider::Cpu),
        "cuda" => Ok(ExecutionProvider::Cuda),
        "coreml" => Ok(ExecutionProvider::CoreMl),
        _ => Err(NukkiError::invalid_config(format!(
            "unknown execution provider '{name}'"
        ))),
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

/// Expand files and directories into a sorted, deduplicated image list
fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input).sort_by_file_name() {
                let entry = entry.map_err(|e| {
                    NukkiError::invalid_config(format!(
                        "failed to walk '{}': {e}",
                        input.display()
                    ))
                })?;
                if entry.file_type().is_file() && is_image_file(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            return Err(NukkiError::invalid_config(format!(
                "input '{}' does not exist",
                input.display()
            )));
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn resolve_api_key(cli_key: Option<&str>) -> Option<String> {
    cli_key
        .map(ToString::to_string)
        .or_else(|| std::env::var("GEMINI_API_KEY").ok())
        .or_else(|| Settings::load().api_key)
}

async fn store_api_key(key: String) -> Result<()> {
    let model = GeminiVisionModel::new(key.clone());
    if !model.validate_api_key().await {
        return Err(NukkiError::invalid_config(
            "API key was rejected by the vision service",
        ));
    }
    let path = Settings::default_path()?;
    let mut settings = Settings::load_from(&path);
    settings.api_key = Some(key);
    settings.save_to(&path)?;
    println!("API key validated and stored at {}", path.display());
    Ok(())
}

/// Run the CLI to completion
///
/// # Errors
/// Invalid arguments, model download failures, or an all-failed batch
pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Some(key) = cli.set_api_key {
        return store_api_key(key).await;
    }

    let quality = QualityPreset::from_name(&cli.quality)?;
    let general_model = crate::models::ModelName::from_name(&cli.model)?;
    let provider = parse_execution_provider(&cli.execution_provider)?;
    let options = RemovalOptions::builder()
        .quality(quality)
        .auto_detect_person(!cli.no_person_detection)
        .general_model(general_model)
        .build()?;

    let files = collect_inputs(&cli.inputs)?;
    if files.is_empty() {
        return Err(NukkiError::invalid_config("no image files found"));
    }
    info!("Processing {} images ({} preset)", files.len(), quality);

    let model_dir = match &cli.model_dir {
        Some(dir) => dir.clone(),
        None => download::default_model_dir()?,
    };
    download::ensure_model(options.general_model, &model_dir).await?;
    if options.auto_detect_person {
        download::ensure_model(options.portrait_model, &model_dir).await?;
        download::ensure_face_detector(&model_dir).await?;
    }

    let factory = crate::backends::OnnxSessionFactory::new(&model_dir, provider);
    let cache = Arc::new(SessionCache::new(Box::new(factory)));
    let mut engine = BackgroundRemover::new(cache, options);
    if !cli.no_person_detection {
        match crate::backends::OnnxFaceDetector::load(&model_dir, provider) {
            Ok(detector) => {
                engine = engine.with_person_detector(PersonDetector::new(Box::new(detector)));
            },
            Err(e) => warn!("Person detection unavailable: {e}"),
        }
    }

    let enhancer = if cli.enhance {
        match resolve_api_key(cli.api_key.as_deref()) {
            Some(key) => Some(EdgeEnhancer::gemini(key)),
            None => {
                warn!("--enhance requested but no API key available, skipping enhancement");
                None
            },
        }
    } else {
        None
    };

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let inputs: Vec<ImageInput> = files.iter().cloned().map(ImageInput::from).collect();
    let mut callback = |completed: usize, _total: usize| bar.set_position(completed as u64);
    let results = remove_background_batch(&engine, inputs, Some(&mut callback));
    bar.finish_and_clear();

    let mut failures = 0usize;
    for (path, result) in files.iter().zip(results) {
        match result {
            Ok(cutout) => {
                let image = match &enhancer {
                    Some(enhancer) => enhancer.enhance_edges(&cutout.image, true).await,
                    None => cutout.image,
                };
                let target = io::output_path(path, cli.output_dir.as_deref());
                match io::save_cutout(&image, &target) {
                    Ok(()) => println!("{} -> {}", path.display(), target.display()),
                    Err(e) => {
                        failures += 1;
                        eprintln!("{}: {e}", path.display());
                    },
                }
            },
            Err(e) => {
                failures += 1;
                eprintln!("{}: {e}", path.display());
            },
        }
    }

    if failures == files.len() {
        return Err(NukkiError::processing("all inputs failed"));
    }
    if failures > 0 {
        warn!("{failures} of {} inputs failed", files.len());
    }
    Ok(())
}
