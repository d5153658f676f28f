//! Quality presets and removal configuration
//!
//! Three presets trade edge quality for speed. Each preset expands to a fixed
//! set of matting parameters; callers never tune thresholds directly.

use crate::error::{NukkiError, Result};
use crate::models::ModelName;

/// Execution provider preference for inference sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionProvider {
    /// Probe for hardware acceleration, fall back to CPU
    #[default]
    Auto,
    /// CPU only
    Cpu,
    /// NVIDIA CUDA
    Cuda,
    /// Apple CoreML
    CoreMl,
}

/// Threshold-based matting parameters derived from a quality preset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MattingParams {
    /// Whether refinement runs at all; when false the raw mask is used as-is
    pub use_matting: bool,
    /// Alpha values at or above this snap to fully opaque
    pub foreground_threshold: u8,
    /// Alpha values at or below this snap to fully transparent
    pub background_threshold: u8,
    /// Square kernel size used to erode the definite-foreground region
    pub erode_size: u32,
    /// Gaussian sigma for the final alpha-edge blur (0 disables)
    pub edge_blur_radius: f32,
}

impl MattingParams {
    /// Check internal consistency of the thresholds
    ///
    /// # Errors
    /// Overlapping thresholds or a negative blur radius
    pub fn validate(&self) -> Result<()> {
        if self.background_threshold >= self.foreground_threshold {
            return Err(NukkiError::invalid_config(format!(
                "background threshold {} must be below foreground threshold {}",
                self.background_threshold, self.foreground_threshold
            )));
        }
        if self.edge_blur_radius < 0.0 {
            return Err(NukkiError::invalid_config(format!(
                "edge blur radius must be non-negative, got {}",
                self.edge_blur_radius
            )));
        }
        Ok(())
    }
}

/// Speed/quality trade-off for background removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityPreset {
    /// Raw mask, no matting refinement, no edge blur
    Fast,
    /// Matting refinement with a light edge blur
    #[default]
    Normal,
    /// Wider soft band and the most aggressive refinement
    High,
}

impl QualityPreset {
    /// Matting parameters for this preset
    #[must_use]
    pub fn matting(self) -> MattingParams {
        match self {
            Self::Fast => MattingParams {
                use_matting: false,
                foreground_threshold: 240,
                background_threshold: 10,
                erode_size: 10,
                edge_blur_radius: 0.0,
            },
            Self::Normal => MattingParams {
                use_matting: true,
                foreground_threshold: 240,
                background_threshold: 10,
                erode_size: 10,
                edge_blur_radius: 0.5,
            },
            Self::High => MattingParams {
                use_matting: true,
                foreground_threshold: 220,
                background_threshold: 5,
                erode_size: 5,
                edge_blur_radius: 0.3,
            },
        }
    }

    /// All presets, in increasing quality order
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[Self::Fast, Self::Normal, Self::High]
    }

    /// Parse a preset from its CLI/config name
    ///
    /// # Errors
    /// Unknown preset names
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "fast" => Ok(Self::Fast),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            _ => Err(NukkiError::invalid_config(format!(
                "unknown quality preset '{name}' (expected fast, normal or high)"
            ))),
        }
    }

    /// Stable lowercase name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Options controlling a background-removal run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalOptions {
    /// Quality preset governing matting and edge blur
    pub quality: QualityPreset,
    /// Run person detection and route portraits to the portrait model
    pub auto_detect_person: bool,
    /// Segmentation model for images without a detected person
    pub general_model: ModelName,
    /// Segmentation model for images with a detected person
    pub portrait_model: ModelName,
}

impl Default for RemovalOptions {
    fn default() -> Self {
        Self {
            quality: QualityPreset::default(),
            auto_detect_person: true,
            general_model: ModelName::BirefnetGeneral,
            portrait_model: ModelName::BirefnetPortrait,
        }
    }
}

impl RemovalOptions {
    /// Start building options from the defaults
    #[must_use]
    pub fn builder() -> RemovalOptionsBuilder {
        RemovalOptionsBuilder::default()
    }

    /// Model to use given the person-detection outcome
    #[must_use]
    pub fn model_for(&self, person_detected: bool) -> ModelName {
        if person_detected {
            self.portrait_model
        } else {
            self.general_model
        }
    }
}

/// Builder for [`RemovalOptions`]
#[derive(Debug, Clone, Default)]
pub struct RemovalOptionsBuilder {
    options: RemovalOptions,
}

impl RemovalOptionsBuilder {
    #[must_use]
    pub fn quality(mut self, quality: QualityPreset) -> Self {
        self.options.quality = quality;
        self
    }

    #[must_use]
    pub fn auto_detect_person(mut self, enabled: bool) -> Self {
        self.options.auto_detect_person = enabled;
        self
    }

    #[must_use]
    pub fn general_model(mut self, model: ModelName) -> Self {
        self.options.general_model = model;
        self
    }

    #[must_use]
    pub fn portrait_model(mut self, model: ModelName) -> Self {
        self.options.portrait_model = model;
        self
    }

    /// Finish building, validating the derived matting parameters
    ///
    /// # Errors
    /// Inconsistent preset parameters
    pub fn build(self) -> Result<RemovalOptions> {
        self.options.quality.matting().validate()?;
        Ok(self.options)
    }
}
