//! Model weight downloads
//!
//! Weights are fetched once into a per-user cache directory and reused across
//! runs. Downloads stream to a temporary file and move into place only when
//! complete, so an interrupted transfer never leaves half a model behind. A
//! sha256 sidecar is written alongside each file and checked at load time.

use crate::error::{NukkiError, Result};
use crate::models::{ModelName, FACE_DETECTOR_FILE};
use futures_util::StreamExt;
use log::{debug, info};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Download source for the face detector weights
const FACE_DETECTOR_URL: &str =
    "https://huggingface.co/nukki-models/ultraface/resolve/main/ultraface-rfb-320.onnx";

/// Per-user cache directory for model weights
///
/// # Errors
/// Platforms without a resolvable cache directory
pub fn default_model_dir() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join("nukki").join("models"))
        .ok_or_else(|| NukkiError::invalid_config("no cache directory available on this platform"))
}

/// Ensure the weights for `model` exist locally, downloading if missing
///
/// # Errors
/// Network failures or filesystem errors in the cache directory
pub async fn ensure_model(model: ModelName, model_dir: &Path) -> Result<PathBuf> {
    let target = model_dir.join(model.weight_file());
    if target.exists() {
        debug!("Weights for '{model}' already cached at {}", target.display());
        return Ok(target);
    }
    info!("Downloading weights for '{model}'");
    download_file(&model.download_url(), &target).await?;
    Ok(target)
}

/// Ensure the face detector weights exist locally, downloading if missing
///
/// # Errors
/// Network failures or filesystem errors in the cache directory
pub async fn ensure_face_detector(model_dir: &Path) -> Result<PathBuf> {
    let target = model_dir.join(FACE_DETECTOR_FILE);
    if target.exists() {
        return Ok(target);
    }
    info!("Downloading face detector weights");
    download_file(FACE_DETECTOR_URL, &target).await?;
    Ok(target)
}

/// Stream a URL to `target`, via a temporary file in the same directory
async fn download_file(url: &str, target: &Path) -> Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| NukkiError::invalid_config("download target has no parent directory"))?;
    fs::create_dir_all(parent)
        .await
        .map_err(|e| NukkiError::file_io("create model directory", parent, &e))?;

    let response = reqwest::get(url)
        .await
        .map_err(|e| NukkiError::network(format!("failed to request '{url}'"), e))?;
    if !response.status().is_success() {
        return Err(NukkiError::Network(format!(
            "download of '{url}' returned {}",
            response.status()
        )));
    }
    let total_bytes = response.content_length().unwrap_or(0);

    // Same-directory part file so the final rename is atomic.
    let part_path = target.with_extension("onnx.part");
    let mut part = fs::File::create(&part_path)
        .await
        .map_err(|e| NukkiError::file_io("create partial download file", &part_path, &e))?;
    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| NukkiError::network("download stream failed", e))?;
        hasher.update(&chunk);
        part.write_all(&chunk)
            .await
            .map_err(|e| NukkiError::file_io("write download chunk", &part_path, &e))?;
        downloaded += chunk.len() as u64;
    }
    part.flush()
        .await
        .map_err(|e| NukkiError::file_io("flush partial download", &part_path, &e))?;
    drop(part);

    if total_bytes > 0 && downloaded != total_bytes {
        let _ = fs::remove_file(&part_path).await;
        return Err(NukkiError::Network(format!(
            "download of '{url}' truncated ({downloaded} of {total_bytes} bytes)"
        )));
    }

    let digest = format!("{:x}", hasher.finalize());
    let sidecar = target.with_extension("onnx.sha256");
    fs::write(&sidecar, &digest)
        .await
        .map_err(|e| NukkiError::file_io("write checksum sidecar", &sidecar, &e))?;
    fs::rename(&part_path, target)
        .await
        .map_err(|e| NukkiError::file_io("finalize downloaded model", target, &e))?;

    info!(
        "Downloaded {:.1} MB to {}",
        downloaded as f64 / (1024.0 * 1024.0),
        target.display()
    );
    Ok(())
}
