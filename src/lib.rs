//! Nukki: automatic background removal for product and portrait photos
//!
//! The pipeline loads an image, optionally checks for a person to pick a
//! portrait-specialized model, segments the subject with an ONNX model,
//! refines the soft mask with threshold matting, and composites an RGBA
//! cutout. An optional cloud vision stage can judge and polish the edges.
//!
//! ```no_run
//! use nukki::{
//!     BackgroundRemover, ImageInput, OnnxSessionFactory, RemovalOptions, SessionCache,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> nukki::Result<()> {
//! let factory = OnnxSessionFactory::new("models", Default::default());
//! let cache = Arc::new(SessionCache::new(Box::new(factory)));
//! let engine = BackgroundRemover::new(cache, RemovalOptions::default());
//! let cutout = engine.remove_background(ImageInput::from("photo.jpg"))?;
//! cutout.image.save("photo_nukki.png")?;
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod batch;
pub mod config;
pub mod detector;
pub mod download;
pub mod enhance;
pub mod error;
pub mod filters;
pub mod inference;
pub mod models;
pub mod preprocess;
pub mod processor;
pub mod services;
pub mod session_cache;
pub mod settings;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(feature = "onnx")]
pub use backends::{OnnxFaceDetector, OnnxSession, OnnxSessionFactory};
pub use batch::remove_background_batch;
pub use config::{ExecutionProvider, MattingParams, QualityPreset, RemovalOptions};
pub use detector::{FaceDetector, FaceRegion, PersonDetector};
pub use enhance::{EdgeEnhancer, EdgeVerdict, GeminiVisionModel, QualityScore, VisionModel};
pub use error::{NukkiError, Result};
pub use inference::{InferenceSession, SessionFactory};
pub use models::ModelName;
pub use processor::{BackgroundRemover, CutoutResult, ImageInput};
pub use session_cache::SessionCache;
pub use settings::Settings;
