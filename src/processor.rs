//! Background removal engine
//!
//! Orchestrates one removal: load, optional person detection, model routing,
//! segmentation inference through the session cache, matting refinement and
//! the final RGBA composite. The input image is never mutated; the cutout is
//! always a new buffer.

use crate::config::RemovalOptions;
use crate::detector::PersonDetector;
use crate::error::Result;
use crate::filters;
use crate::preprocess::Preprocessor;
use crate::services::io;
use crate::session_cache::SessionCache;
use image::{DynamicImage, RgbaImage};
use log::{debug, info};
use std::path::PathBuf;
use std::sync::Arc;

/// Input to a removal run: a path to decode or an already loaded image
#[derive(Debug, Clone)]
pub enum ImageInput {
    /// Image file to load from disk
    Path(PathBuf),
    /// Decoded image, used as-is
    Image(DynamicImage),
}

impl From<PathBuf> for ImageInput {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&str> for ImageInput {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<DynamicImage> for ImageInput {
    fn from(image: DynamicImage) -> Self {
        Self::Image(image)
    }
}

impl ImageInput {
    fn into_image(self) -> Result<DynamicImage> {
        match self {
            Self::Path(path) => io::load_image(&path),
            Self::Image(image) => Ok(image),
        }
    }
}

/// Outcome of one background removal
#[derive(Debug, Clone)]
pub struct CutoutResult {
    /// The cutout with background pixels made transparent
    pub image: RgbaImage,
    /// Whether person detection routed this image to the portrait model
    pub person_detected: bool,
}

/// The removal engine, binding a session cache to routing and quality policy
pub struct BackgroundRemover {
    cache: Arc<SessionCache>,
    detector: Option<PersonDetector>,
    options: RemovalOptions,
}

impl BackgroundRemover {
    /// Create an engine without person detection; every image uses the
    /// general model
    #[must_use]
    pub fn new(cache: Arc<SessionCache>, options: RemovalOptions) -> Self {
        Self {
            cache,
            detector: None,
            options,
        }
    }

    /// Attach a person detector for portrait model routing
    #[must_use]
    pub fn with_person_detector(mut self, detector: PersonDetector) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Options this engine was configured with
    #[must_use]
    pub fn options(&self) -> &RemovalOptions {
        &self.options
    }

    /// Remove the background from one image
    ///
    /// # Errors
    /// - Load or decode failures for path inputs
    /// - Session construction or inference failures
    /// - Tensor conversion failures
    #[tracing::instrument(skip_all)]
    pub fn remove_background(&self, input: ImageInput) -> Result<CutoutResult> {
        let started = instant::Instant::now();
        let image = input.into_image()?;
        let dimensions = (image.width(), image.height());

        let person_detected = if self.options.auto_detect_person {
            match &self.detector {
                Some(detector) => detector.detect_person(&image),
                None => false,
            }
        } else {
            false
        };
        let model = self.options.model_for(person_detected);
        debug!(
            "Routing {}x{} image to '{model}' (person_detected={person_detected})",
            dimensions.0, dimensions.1
        );

        let config = self.cache.preprocessing_config(model)?;
        let tensor = Preprocessor::image_to_tensor(&image, &config)?;
        let mask_tensor = self.cache.run(model, &tensor)?;
        let mask = Preprocessor::tensor_to_alpha(&mask_tensor, dimensions)?;

        let params = self.options.quality.matting();
        let alpha = filters::refine_alpha(&mask, &params);
        let mut cutout = filters::with_alpha(&image.to_rgba8(), &alpha);
        if params.edge_blur_radius > 0.0 {
            cutout = filters::blur_alpha(&cutout, params.edge_blur_radius);
        }

        info!(
            "Removed background ({model}, {} preset) in {:.0}ms",
            self.options.quality,
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(CutoutResult {
            image: cutout,
            person_detected,
        })
    }
}

impl std::fmt::Debug for BackgroundRemover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemover")
            .field("options", &self.options)
            .field("has_detector", &self.detector.is_some())
            .finish_non_exhaustive()
    }
}
