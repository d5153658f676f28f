//! Error types for the cutout pipeline

use thiserror::Error;

/// Result type alias for cutout operations
pub type Result<T> = std::result::Result<T, NukkiError>;

/// Error taxonomy for the cutout pipeline
///
/// Load, model and inference errors surface to the caller. Detection and cloud
/// errors are absorbed at their boundaries and never reach this type from the
/// public pipeline entry points.
#[derive(Error, Debug)]
pub enum NukkiError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Session construction failures (missing weights, unsupported model name)
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// Inference failures on an already constructed session
    #[error("Inference error: {0}")]
    Inference(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Network errors for model downloads and the cloud vision API
    #[error("Network error: {0}")]
    Network(String),

    /// Pixel processing or tensor conversion errors
    #[error("Processing error: {0}")]
    Processing(String),
}

impl NukkiError {
    /// Create a new model load error
    pub fn model_load<S: Into<String>>(msg: S) -> Self {
        Self::ModelLoad(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new network error with source context
    pub fn network<S: Into<String>, E: std::fmt::Display>(msg: S, source: E) -> Self {
        Self::Network(format!("{}: {}", msg.into(), source))
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a file I/O error with operation context
    pub fn file_io<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        Self::Io(std::io::Error::new(
            error.kind(),
            format!(
                "Failed to {} '{}': {}",
                operation,
                path.as_ref().display(),
                error
            ),
        ))
    }
}
