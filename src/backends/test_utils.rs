//! Mock sessions, factories and detectors for testing
//!
//! These stand in for the ONNX runtime and the cloud vision model so the
//! pipeline can be exercised without model files or network access.

use crate::detector::{FaceDetector, FaceRegion};
use crate::enhance::VisionModel;
use crate::error::{NukkiError, Result};
use crate::inference::{InferenceSession, SessionFactory};
use crate::models::{ModelName, PreprocessingConfig};
use async_trait::async_trait;
use image::DynamicImage;
use ndarray::Array4;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Shared construction counter for factory stubs
#[derive(Debug, Default)]
pub struct ConstructionCounter {
    constructions: Mutex<HashMap<ModelName, usize>>,
    requested: Mutex<Vec<ModelName>>,
}

impl ConstructionCounter {
    fn record(&self, model: ModelName) {
        *self
            .constructions
            .lock()
            .expect("counter lock")
            .entry(model)
            .or_insert(0) += 1;
        self.requested.lock().expect("counter lock").push(model);
    }

    /// Number of construction attempts for one model
    pub fn constructions_for(&self, model: ModelName) -> usize {
        self.constructions
            .lock()
            .expect("counter lock")
            .get(&model)
            .copied()
            .unwrap_or(0)
    }

    /// Total construction attempts across all models
    pub fn total_constructions(&self) -> usize {
        self.constructions
            .lock()
            .expect("counter lock")
            .values()
            .sum()
    }

    /// Models requested from the factory, in order
    pub fn requested_models(&self) -> Vec<ModelName> {
        self.requested.lock().expect("counter lock").clone()
    }
}

/// Session stub that always returns a fully opaque mask
pub struct ConstantMaskSession {
    model: ModelName,
}

impl ConstantMaskSession {
    pub fn new(model: ModelName) -> Self {
        Self { model }
    }
}

impl InferenceSession for ConstantMaskSession {
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let side = input.shape().get(2).copied().unwrap_or(0);
        Ok(Array4::from_elem((1, 1, side, side), 1.0))
    }

    fn preprocessing_config(&self) -> PreprocessingConfig {
        self.model.preprocessing()
    }

    fn model(&self) -> ModelName {
        self.model
    }
}

/// Factory stub that counts constructions and records requested models
#[derive(Default)]
pub struct CountingSessionFactory {
    counter: Arc<ConstructionCounter>,
}

impl CountingSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self) -> Arc<ConstructionCounter> {
        Arc::clone(&self.counter)
    }
}

impl SessionFactory for CountingSessionFactory {
    fn create_session(&self, model: ModelName) -> Result<Box<dyn InferenceSession>> {
        self.counter.record(model);
        Ok(Box::new(ConstantMaskSession::new(model)))
    }
}

/// Factory stub whose first N constructions fail with a model load error
pub struct FlakySessionFactory {
    counter: Arc<ConstructionCounter>,
    failures_remaining: Mutex<usize>,
}

impl FlakySessionFactory {
    pub fn failing_first(failures: usize) -> Self {
        Self {
            counter: Arc::default(),
            failures_remaining: Mutex::new(failures),
        }
    }

    pub fn counter(&self) -> Arc<ConstructionCounter> {
        Arc::clone(&self.counter)
    }
}

impl SessionFactory for FlakySessionFactory {
    fn create_session(&self, model: ModelName) -> Result<Box<dyn InferenceSession>> {
        self.counter.record(model);
        let mut remaining = self.failures_remaining.lock().expect("factory lock");
        if *remaining > 0 {
            *remaining -= 1;
            return Err(NukkiError::model_load(format!(
                "simulated weight load failure for '{model}'"
            )));
        }
        Ok(Box::new(ConstantMaskSession::new(model)))
    }
}

/// Face detector stub returning a fixed candidate list
pub struct StaticFaceDetector {
    candidates: Vec<FaceRegion>,
}

impl StaticFaceDetector {
    /// Detector that never sees a face
    pub fn empty() -> Self {
        Self {
            candidates: Vec::new(),
        }
    }

    /// Detector reporting a cluster of `n` agreeing candidates at (x, y)
    pub fn with_cluster(n: usize, x: f32, y: f32) -> Self {
        let candidates = (0..n)
            .map(|i| FaceRegion {
                x: x + i as f32,
                y: y + i as f32,
                width: 64.0,
                height: 64.0,
                confidence: 0.95,
            })
            .collect();
        Self { candidates }
    }
}

impl FaceDetector for StaticFaceDetector {
    fn detect_faces(&self, _image: &DynamicImage) -> Result<Vec<FaceRegion>> {
        Ok(self.candidates.clone())
    }
}

/// Face detector stub that always errors, for fail-open tests
pub struct FailingFaceDetector;

impl FaceDetector for FailingFaceDetector {
    fn detect_faces(&self, _image: &DynamicImage) -> Result<Vec<FaceRegion>> {
        Err(NukkiError::processing("simulated detector fault"))
    }
}

/// Vision model stub that replays a scripted response
pub struct ScriptedVisionModel {
    response: Result<String>,
}

impl ScriptedVisionModel {
    pub fn replying(text: &str) -> Self {
        Self {
            response: Ok(text.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self {
            response: Err(NukkiError::Network("simulated quota exhaustion".into())),
        }
    }
}

#[async_trait]
impl VisionModel for ScriptedVisionModel {
    async fn generate(&self, _prompt: &str, _image_png: &[u8]) -> Result<String> {
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err(e) => Err(NukkiError::Network(e.to_string())),
        }
    }
}
