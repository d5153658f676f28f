//! Inference session abstraction
//!
//! A session is an opaque, expensive-to-construct handle bound to one named
//! model. Sessions are owned exclusively by the
//! [`SessionCache`](crate::session_cache::SessionCache) and live for the
//! process lifetime; construction happens through a [`SessionFactory`] so that
//! tests can substitute counting or failing stubs for the real ONNX runtime.

use crate::error::Result;
use crate::models::{ModelName, PreprocessingConfig};
use ndarray::Array4;

/// A loaded, reusable handle to one segmentation model
pub trait InferenceSession: Send {
    /// Run segmentation on an NCHW float tensor, returning the mask tensor
    ///
    /// # Errors
    /// - Model inference failures
    /// - Tensor conversion errors
    /// - Unexpected output tensor rank
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Preprocessing parameters for the bound model
    fn preprocessing_config(&self) -> PreprocessingConfig;

    /// The model this session is bound to
    fn model(&self) -> ModelName;
}

/// Factory for constructing inference sessions
///
/// Session construction is the costly I/O- and compute-bound step (loading
/// model weights, building the runtime graph). The factory is invoked at most
/// once per model name by the session cache; a failed construction is not
/// cached and will be retried on the next request.
pub trait SessionFactory: Send + Sync {
    /// Construct a session for the given model
    ///
    /// # Errors
    /// Returns `NukkiError::ModelLoad` for missing weights or unsupported
    /// model names.
    fn create_session(&self, model: ModelName) -> Result<Box<dyn InferenceSession>>;
}
