//! Image file loading and cutout saving
//!
//! Cutouts are always written as PNG, the only widely supported format that
//! keeps the alpha channel intact. Output files sit next to their source with
//! a `_nukki` suffix unless the caller picks a path.

use crate::error::{NukkiError, Result};
use image::{DynamicImage, RgbaImage};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix appended to output file stems
const OUTPUT_SUFFIX: &str = "_nukki";

/// Load an image from disk
///
/// # Errors
/// Missing files, permission problems, or undecodable image data
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let data = fs::read(path).map_err(|e| NukkiError::file_io("read image file", path, &e))?;
    let image = image::load_from_memory(&data)?;
    debug!(
        "Loaded {}x{} image from {}",
        image.width(),
        image.height(),
        path.display()
    );
    Ok(image)
}

/// Save a cutout as PNG, creating parent directories as needed
///
/// # Errors
/// Directory creation or encoding failures
pub fn save_cutout(image: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| NukkiError::file_io("create output directory", parent, &e))?;
        }
    }
    image.save_with_format(path, image::ImageFormat::Png)?;
    debug!("Saved cutout to {}", path.display());
    Ok(())
}

/// Derive the default output path for an input file
///
/// `photo.jpg` becomes `photo_nukki.png` in the same directory, or under
/// `output_dir` when one is given.
#[must_use]
pub fn output_path(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "cutout".into(), |s| s.to_string_lossy().into_owned());
    let file_name = format!("{stem}{OUTPUT_SUFFIX}.png");
    match output_dir {
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    }
}
