//! Segmentation model catalog
//!
//! Named models the session cache can construct, with per-model preprocessing
//! parameters. The portrait variant exists only for `BiRefNet`; person-aware
//! routing maps any general model to [`ModelName::BirefnetPortrait`].

use crate::error::{NukkiError, Result};
use serde::{Deserialize, Serialize};

/// Face detector weight file expected inside the model directory
pub const FACE_DETECTOR_FILE: &str = "ultraface-rfb-320.onnx";

/// Named segmentation models, ordered roughly by output quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelName {
    /// Latest high-quality general model (recommended default)
    BirefnetGeneral,
    /// `BiRefNet` variant fine-tuned on people
    BirefnetPortrait,
    /// General purpose, high quality
    IsnetGeneralUse,
    /// Baseline model
    U2net,
    /// Fast with acceptable quality
    Silueta,
}

impl ModelName {
    /// All available models
    #[must_use]
    pub fn all() -> [Self; 5] {
        [
            Self::BirefnetGeneral,
            Self::BirefnetPortrait,
            Self::IsnetGeneralUse,
            Self::U2net,
            Self::Silueta,
        ]
    }

    /// Canonical model identifier as used in file names and the CLI
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BirefnetGeneral => "birefnet-general",
            Self::BirefnetPortrait => "birefnet-portrait",
            Self::IsnetGeneralUse => "isnet-general-use",
            Self::U2net => "u2net",
            Self::Silueta => "silueta",
        }
    }

    /// Parse a model identifier
    ///
    /// # Errors
    /// Unknown model names
    pub fn from_name(name: &str) -> Result<Self> {
        Self::all()
            .into_iter()
            .find(|m| m.as_str() == name)
            .ok_or_else(|| {
                NukkiError::model_load(format!(
                    "unsupported model name '{name}' (available: {})",
                    Self::all().map(Self::as_str).join(", ")
                ))
            })
    }

    /// Whether this model is specialized for people
    #[must_use]
    pub fn is_portrait(self) -> bool {
        matches!(self, Self::BirefnetPortrait)
    }

    /// Portrait counterpart used when person detection fires
    #[must_use]
    pub fn portrait_variant(self) -> Self {
        Self::BirefnetPortrait
    }

    /// Weight file name inside the model cache directory
    #[must_use]
    pub fn weight_file(self) -> String {
        format!("{}.onnx", self.as_str())
    }

    /// Upstream repository the weights are downloaded from
    #[must_use]
    pub fn download_url(self) -> String {
        format!(
            "https://huggingface.co/nukki-models/{}/resolve/main/{}",
            self.as_str(),
            self.weight_file()
        )
    }

    /// Preprocessing parameters the model was trained with
    #[must_use]
    pub fn preprocessing(self) -> PreprocessingConfig {
        match self {
            Self::BirefnetGeneral | Self::BirefnetPortrait | Self::IsnetGeneralUse => {
                PreprocessingConfig {
                    target_size: [1024, 1024],
                    normalization_mean: [0.485, 0.456, 0.406],
                    normalization_std: [0.229, 0.224, 0.225],
                }
            },
            Self::U2net | Self::Silueta => PreprocessingConfig {
                target_size: [320, 320],
                normalization_mean: [0.485, 0.456, 0.406],
                normalization_std: [0.229, 0.224, 0.225],
            },
        }
    }
}

impl std::fmt::Display for ModelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model-specific preprocessing configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessingConfig {
    /// Square input resolution expected by the model (width, height)
    pub target_size: [u32; 2],
    /// Per-channel normalization mean (RGB, 0-1 range)
    pub normalization_mean: [f32; 3],
    /// Per-channel normalization standard deviation (RGB)
    pub normalization_std: [f32; 3],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_name_round_trip() {
        for model in ModelName::all() {
            assert_eq!(ModelName::from_name(model.as_str()).unwrap(), model);
        }
    }

    #[test]
    fn test_unknown_model_name_is_model_load_error() {
        let err = ModelName::from_name("sam-vit-h").unwrap_err();
        assert!(matches!(err, NukkiError::ModelLoad(_)));
    }

    #[test]
    fn test_portrait_routing() {
        assert!(ModelName::BirefnetPortrait.is_portrait());
        assert!(!ModelName::BirefnetGeneral.is_portrait());
        assert_eq!(
            ModelName::U2net.portrait_variant(),
            ModelName::BirefnetPortrait
        );
    }

    #[test]
    fn test_preprocessing_sizes() {
        assert_eq!(
            ModelName::BirefnetGeneral.preprocessing().target_size,
            [1024, 1024]
        );
        assert_eq!(ModelName::U2net.preprocessing().target_size, [320, 320]);
    }
}
