//! ONNX Runtime sessions for segmentation and face detection
//!
//! Sessions are built from weight files in a local model directory (usually
//! populated by [`crate::download`]). Execution provider selection prefers
//! CUDA, then CoreML, then CPU, with availability checks so a missing GPU
//! stack degrades instead of failing.

use crate::config::ExecutionProvider;
use crate::detector::{FaceDetector, FaceRegion};
use crate::error::{NukkiError, Result};
use crate::inference::{InferenceSession, SessionFactory};
use crate::models::{ModelName, PreprocessingConfig, FACE_DETECTOR_FILE};
use image::DynamicImage;
use log::{debug, info, warn};
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Build an ONNX Runtime session from raw model bytes
fn build_session(
    model_data: &[u8],
    execution_provider: ExecutionProvider,
    intra_threads: usize,
) -> Result<Session> {
    let mut builder = Session::builder()
        .map_err(|e| NukkiError::model_load(format!("failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| NukkiError::model_load(format!("failed to set optimization level: {e}")))?;

    builder = match execution_provider {
        ExecutionProvider::Auto => {
            let mut providers = Vec::new();
            let cuda = CUDAExecutionProvider::default();
            if OrtExecutionProvider::is_available(&cuda).unwrap_or(false) {
                info!("CUDA execution provider is available and will be used");
                providers.push(cuda.build());
            }
            let coreml = CoreMLExecutionProvider::default().with_subgraphs(true);
            if OrtExecutionProvider::is_available(&coreml).unwrap_or(false) {
                info!("CoreML execution provider is available and will be used");
                providers.push(coreml.build());
            }
            if providers.is_empty() {
                debug!("No hardware acceleration available, using CPU");
                builder
            } else {
                builder.with_execution_providers(providers).map_err(|e| {
                    NukkiError::model_load(format!("failed to set execution providers: {e}"))
                })?
            }
        },
        ExecutionProvider::Cpu => {
            info!("Using CPU execution provider");
            builder
        },
        ExecutionProvider::Cuda => {
            let cuda = CUDAExecutionProvider::default();
            if OrtExecutionProvider::is_available(&cuda).unwrap_or(false) {
                builder
                    .with_execution_providers([cuda.build()])
                    .map_err(|e| {
                        NukkiError::model_load(format!("failed to set CUDA provider: {e}"))
                    })?
            } else {
                warn!("CUDA requested but not available, falling back to CPU");
                builder
            }
        },
        ExecutionProvider::CoreMl => {
            let coreml = CoreMLExecutionProvider::default().with_subgraphs(true);
            if OrtExecutionProvider::is_available(&coreml).unwrap_or(false) {
                builder
                    .with_execution_providers([coreml.build()])
                    .map_err(|e| {
                        NukkiError::model_load(format!("failed to set CoreML provider: {e}"))
                    })?
            } else {
                warn!("CoreML requested but not available, falling back to CPU");
                builder
            }
        },
    };

    let intra = if intra_threads > 0 {
        intra_threads
    } else {
        std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(8)
    };

    builder
        .with_intra_threads(intra)
        .map_err(|e| NukkiError::model_load(format!("failed to set intra threads: {e}")))?
        .commit_from_memory(model_data)
        .map_err(|e| NukkiError::model_load(format!("failed to build session from weights: {e}")))
}

/// Read a weight file, checking its sha256 sidecar when present
fn read_verified(path: &Path) -> Result<Vec<u8>> {
    let data = fs::read(path).map_err(|e| {
        NukkiError::model_load(format!(
            "missing model weights at '{}': {e}",
            path.display()
        ))
    })?;

    let sidecar = path.with_extension("onnx.sha256");
    if let Ok(expected) = fs::read_to_string(&sidecar) {
        let digest = format!("{:x}", Sha256::digest(&data));
        if digest != expected.trim() {
            return Err(NukkiError::model_load(format!(
                "checksum mismatch for '{}' (expected {}, got {digest})",
                path.display(),
                expected.trim()
            )));
        }
        debug!("Verified checksum for {}", path.display());
    }

    Ok(data)
}

/// Run a session on one input tensor and extract the first output as f32
fn run_single_output(session: &mut Session, input: &Array4<f32>) -> Result<ndarray::ArrayD<f32>> {
    let input_value = Value::from_array(input.clone())
        .map_err(|e| NukkiError::processing(format!("failed to convert input tensor: {e}")))?;

    let outputs = session
        .run(ort::inputs![input_value])
        .map_err(|e| NukkiError::inference(format!("model run failed: {e}")))?;

    let keys: Vec<_> = outputs.keys().collect();
    let first_key = keys
        .first()
        .ok_or_else(|| NukkiError::inference("model produced no outputs"))?;
    let tensor = outputs
        .get(first_key)
        .ok_or_else(|| NukkiError::inference("first output tensor missing"))?
        .try_extract_array::<f32>()
        .map_err(|e| NukkiError::inference(format!("failed to extract output tensor: {e}")))?;
    Ok(tensor.view().to_owned())
}

/// A loaded segmentation session bound to one named model
pub struct OnnxSession {
    model: ModelName,
    session: Session,
}

impl InferenceSession for OnnxSession {
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let started = instant::Instant::now();
        let output = run_single_output(&mut self.session, input)?;

        let shape = output.shape().to_vec();
        if shape.len() != 4 {
            return Err(NukkiError::inference(format!(
                "expected 4D mask tensor from '{}', got {}D",
                self.model,
                shape.len()
            )));
        }
        let result = Array4::from_shape_vec(
            (
                shape.first().copied().unwrap_or(1),
                shape.get(1).copied().unwrap_or(1),
                shape.get(2).copied().unwrap_or(1),
                shape.get(3).copied().unwrap_or(1),
            ),
            output.into_raw_vec_and_offset().0,
        )
        .map_err(|e| NukkiError::inference(format!("failed to reshape output tensor: {e}")))?;

        debug!(
            "Segmentation inference for '{}' took {:.0}ms",
            self.model,
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(result)
    }

    fn preprocessing_config(&self) -> PreprocessingConfig {
        self.model.preprocessing()
    }

    fn model(&self) -> ModelName {
        self.model
    }
}

/// Factory that builds [`OnnxSession`]s from weight files in a directory
pub struct OnnxSessionFactory {
    model_dir: PathBuf,
    execution_provider: ExecutionProvider,
    intra_threads: usize,
}

impl OnnxSessionFactory {
    /// Create a factory reading weights from `model_dir`
    #[must_use]
    pub fn new<P: AsRef<Path>>(model_dir: P, execution_provider: ExecutionProvider) -> Self {
        Self {
            model_dir: model_dir.as_ref().to_path_buf(),
            execution_provider,
            intra_threads: 0,
        }
    }

    /// Override intra-op thread count (0 = auto)
    #[must_use]
    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = threads;
        self
    }
}

impl SessionFactory for OnnxSessionFactory {
    fn create_session(&self, model: ModelName) -> Result<Box<dyn InferenceSession>> {
        let started = instant::Instant::now();
        let weight_path = self.model_dir.join(model.weight_file());
        let data = read_verified(&weight_path)?;
        let session = build_session(&data, self.execution_provider, self.intra_threads)?;
        info!(
            "Loaded '{model}' ({:.1} MB) in {:.0}ms",
            data.len() as f64 / (1024.0 * 1024.0),
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(Box::new(OnnxSession { model, session }))
    }
}

/// UltraFace-style face detector running through ONNX Runtime
///
/// Produces raw candidate boxes above a low confidence floor; neighbor
/// grouping and size filtering happen in [`crate::detector`].
pub struct OnnxFaceDetector {
    session: std::sync::Mutex<Session>,
}

impl OnnxFaceDetector {
    /// Input width expected by the detector model
    const INPUT_WIDTH: u32 = 320;
    /// Input height expected by the detector model
    const INPUT_HEIGHT: u32 = 240;
    /// Confidence floor for raw candidates, kept low so neighbor grouping
    /// does the real filtering
    const CANDIDATE_THRESHOLD: f32 = 0.5;

    /// Load the face detector weights from the model directory
    ///
    /// # Errors
    /// Missing weights or session construction failures
    pub fn load<P: AsRef<Path>>(
        model_dir: P,
        execution_provider: ExecutionProvider,
    ) -> Result<Self> {
        let weight_path = model_dir.as_ref().join(FACE_DETECTOR_FILE);
        let data = read_verified(&weight_path)?;
        let session = build_session(&data, execution_provider, 0)?;
        Ok(Self {
            session: std::sync::Mutex::new(session),
        })
    }

    /// Convert an image to the detector's fixed-size normalized input
    fn detector_input(image: &DynamicImage) -> Array4<f32> {
        let resized = image.resize_exact(
            Self::INPUT_WIDTH,
            Self::INPUT_HEIGHT,
            image::imageops::FilterType::Triangle,
        );
        let rgb = resized.to_rgb8();
        let mut tensor = Array4::<f32>::zeros((
            1,
            3,
            Self::INPUT_HEIGHT as usize,
            Self::INPUT_WIDTH as usize,
        ));
        for (x, y, pixel) in rgb.enumerate_pixels() {
            for channel in 0..3 {
                tensor[[0, channel, y as usize, x as usize]] =
                    (f32::from(pixel[channel]) - 127.0) / 128.0;
            }
        }
        tensor
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn detect_faces(&self, image: &DynamicImage) -> Result<Vec<FaceRegion>> {
        let input = Self::detector_input(image);
        let mut session = self
            .session
            .lock()
            .map_err(|_| NukkiError::processing("face detector lock poisoned"))?;

        let input_value = Value::from_array(input)
            .map_err(|e| NukkiError::processing(format!("failed to convert detector input: {e}")))?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| NukkiError::inference(format!("face detector run failed: {e}")))?;

        // The detector emits anchor scores [1, N, 2] and boxes [1, N, 4];
        // match outputs by their trailing dimension rather than by name.
        let mut scores = None;
        let mut boxes = None;
        let keys: Vec<String> = outputs.keys().map(ToString::to_string).collect();
        for key in &keys {
            let tensor = outputs
                .get(key.as_str())
                .ok_or_else(|| NukkiError::inference("detector output missing"))?
                .try_extract_array::<f32>()
                .map_err(|e| {
                    NukkiError::inference(format!("failed to extract detector output: {e}"))
                })?
                .view()
                .to_owned();
            match tensor.shape().last().copied() {
                Some(2) => scores = Some(tensor),
                Some(4) => boxes = Some(tensor),
                _ => {},
            }
        }
        let (scores, boxes) = match (scores, boxes) {
            (Some(s), Some(b)) => (s, b),
            _ => {
                return Err(NukkiError::inference(
                    "detector outputs missing scores or boxes tensor",
                ))
            },
        };

        let (image_width, image_height) = (image.width() as f32, image.height() as f32);
        let anchors = scores.shape().get(1).copied().unwrap_or(0);
        let mut candidates = Vec::new();
        for i in 0..anchors {
            let confidence = scores.get([0, i, 1]).copied().unwrap_or(0.0);
            if confidence < Self::CANDIDATE_THRESHOLD {
                continue;
            }
            let x1 = boxes.get([0, i, 0]).copied().unwrap_or(0.0) * image_width;
            let y1 = boxes.get([0, i, 1]).copied().unwrap_or(0.0) * image_height;
            let x2 = boxes.get([0, i, 2]).copied().unwrap_or(0.0) * image_width;
            let y2 = boxes.get([0, i, 3]).copied().unwrap_or(0.0) * image_height;
            if x2 <= x1 || y2 <= y1 {
                continue;
            }
            candidates.push(FaceRegion {
                x: x1,
                y: y1,
                width: x2 - x1,
                height: y2 - y1,
                confidence,
            });
        }

        debug!("Face detector produced {} raw candidates", candidates.len());
        Ok(candidates)
    }
}
