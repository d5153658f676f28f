//! Inference backend implementations
//!
//! The ONNX Runtime backend covers both concerns that need a neural network:
//! segmentation sessions for the removal engine and the face-detection model
//! behind person routing.

#[cfg(feature = "onnx")]
pub mod onnx;

// Mock sessions, factories and detectors for testing
#[cfg(test)]
pub mod test_utils;

#[cfg(feature = "onnx")]
pub use self::onnx::{OnnxFaceDetector, OnnxSession, OnnxSessionFactory};
