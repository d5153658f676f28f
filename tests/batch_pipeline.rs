//! End-to-end pipeline tests with a stubbed inference backend

use image::{DynamicImage, Rgb, RgbImage};
use ndarray::Array4;
use nukki::inference::{InferenceSession, SessionFactory};
use nukki::models::{ModelName, PreprocessingConfig};
use nukki::services::io;
use nukki::{
    remove_background_batch, BackgroundRemover, ImageInput, QualityPreset, RemovalOptions, Result,
    SessionCache,
};
use std::path::Path;
use std::sync::Arc;

struct FullMaskSession {
    model: ModelName,
}

impl InferenceSession for FullMaskSession {
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let side = input.shape()[2];
        Ok(Array4::from_elem((1, 1, side, side), 1.0))
    }

    fn preprocessing_config(&self) -> PreprocessingConfig {
        self.model.preprocessing()
    }

    fn model(&self) -> ModelName {
        self.model
    }
}

struct FullMaskFactory;

impl SessionFactory for FullMaskFactory {
    fn create_session(&self, model: ModelName) -> Result<Box<dyn InferenceSession>> {
        Ok(Box::new(FullMaskSession { model }))
    }
}

fn test_engine(options: RemovalOptions) -> BackgroundRemover {
    BackgroundRemover::new(
        Arc::new(SessionCache::new(Box::new(FullMaskFactory))),
        options,
    )
}

fn sample_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 77])
    }))
}

#[test]
fn file_to_cutout_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("product.png");
    sample_image(40, 30).save(&input_path).unwrap();

    let engine = test_engine(RemovalOptions::default());
    let result = engine
        .remove_background(ImageInput::Path(input_path.clone()))
        .unwrap();
    assert_eq!(result.image.dimensions(), (40, 30));

    let target = io::output_path(&input_path, None);
    assert_eq!(target.file_name().unwrap(), "product_nukki.png");
    io::save_cutout(&result.image, &target).unwrap();

    let reloaded = io::load_image(&target).unwrap().to_rgba8();
    assert_eq!(reloaded, result.image);
}

#[test]
fn batch_reports_progress_and_keeps_order() {
    let engine = test_engine(RemovalOptions::default());
    let inputs = vec![
        ImageInput::Image(sample_image(10, 10)),
        ImageInput::Image(sample_image(20, 10)),
        ImageInput::Image(sample_image(30, 10)),
    ];

    let mut seen = Vec::new();
    let mut progress = |completed: usize, total: usize| seen.push((completed, total));
    let results = remove_background_batch(&engine, inputs, Some(&mut progress));

    assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
    let widths: Vec<u32> = results
        .into_iter()
        .map(|r| r.unwrap().image.width())
        .collect();
    assert_eq!(widths, vec![10, 20, 30]);
}

#[test]
fn batch_isolates_per_item_failures() {
    let engine = test_engine(RemovalOptions::default());
    let inputs = vec![
        ImageInput::Image(sample_image(10, 10)),
        ImageInput::Path("/nonexistent/broken.png".into()),
        ImageInput::Image(sample_image(10, 10)),
    ];

    let results = remove_background_batch(&engine, inputs, None);
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
    assert!(results[2].is_ok());
}

#[test]
fn fast_preset_yields_fully_opaque_cutout() {
    let options = RemovalOptions::builder()
        .quality(QualityPreset::Fast)
        .build()
        .unwrap();
    let engine = test_engine(options);

    let result = engine
        .remove_background(ImageInput::Image(sample_image(16, 16)))
        .unwrap();
    assert!(result.image.pixels().all(|p| p[3] == 255));
}

#[test]
fn output_path_honors_output_dir() {
    let target = io::output_path(Path::new("shots/cat.jpeg"), Some(Path::new("out")));
    assert_eq!(target, Path::new("out/cat_nukki.png"));
}
