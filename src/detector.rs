//! Person detection for model routing
//!
//! Decides whether an input depicts a person so the removal engine can route
//! it to the portrait-specialized segmentation model. Detection is a heuristic
//! and strictly advisory: backs of heads or face-like patterns can mislead it,
//! and any internal detector fault collapses to "no person detected" instead
//! of aborting the pipeline. That contract is visible in the signature of
//! [`PersonDetector::detect_person`], which returns a plain `bool`.

use crate::error::Result;
use image::DynamicImage;
use log::warn;

/// A detected face region in original image coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceRegion {
    /// Left edge, pixels
    pub x: f32,
    /// Top edge, pixels
    pub y: f32,
    /// Width, pixels
    pub width: f32,
    /// Height, pixels
    pub height: f32,
    /// Detector confidence (0-1)
    pub confidence: f32,
}

/// Fixed detection parameters
///
/// These mirror the classic cascade settings: a 1.1 pyramid step, at least 4
/// agreeing raw candidates per reported face, and a 30x30 pixel minimum face
/// size. The pyramid step doubles as the position tolerance when grouping raw
/// candidates into faces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionParams {
    /// Pyramid step between detection scales
    pub scale_factor: f32,
    /// Minimum number of overlapping raw candidates per reported face
    pub min_neighbors: usize,
    /// Minimum face size in pixels (square)
    pub min_size: u32,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 4,
            min_size: 30,
        }
    }
}

/// Face detection backends
///
/// Implementations run the actual model pass and return raw candidate
/// regions; grouping and size filtering happen in [`group_candidates`] so the
/// policy stays independent of the model runtime.
pub trait FaceDetector: Send + Sync {
    /// Detect raw face candidates in the image
    ///
    /// # Errors
    /// - Corrupt image data
    /// - Detector misconfiguration or inference failures
    fn detect_faces(&self, image: &DynamicImage) -> Result<Vec<FaceRegion>>;
}

/// Group raw candidates into reported faces
///
/// Candidates whose corners agree within the pyramid-step tolerance are
/// treated as the same face; a face is reported only when at least
/// `min_neighbors` candidates agree and the merged box is no smaller than
/// `min_size` in either dimension.
#[must_use]
pub fn group_candidates(candidates: &[FaceRegion], params: &DetectionParams) -> Vec<FaceRegion> {
    let eps = (params.scale_factor - 1.0).max(0.05);
    let mut assigned = vec![false; candidates.len()];
    let mut faces = Vec::new();

    for (i, seed) in candidates.iter().enumerate() {
        if assigned.get(i).copied().unwrap_or(true) {
            continue;
        }
        let mut group = vec![*seed];
        if let Some(slot) = assigned.get_mut(i) {
            *slot = true;
        }
        for (j, other) in candidates.iter().enumerate().skip(i + 1) {
            if assigned.get(j).copied().unwrap_or(true) {
                continue;
            }
            if same_face(seed, other, eps) {
                group.push(*other);
                if let Some(slot) = assigned.get_mut(j) {
                    *slot = true;
                }
            }
        }
        if group.len() < params.min_neighbors {
            continue;
        }
        let merged = merge_group(&group);
        if merged.width >= params.min_size as f32 && merged.height >= params.min_size as f32 {
            faces.push(merged);
        }
    }

    faces
}

/// Rectangle similarity test with a relative position tolerance
fn same_face(a: &FaceRegion, b: &FaceRegion, eps: f32) -> bool {
    let delta = eps * 0.5 * (a.width + b.width);
    (a.x - b.x).abs() <= delta
        && (a.y - b.y).abs() <= delta
        && ((a.x + a.width) - (b.x + b.width)).abs() <= delta
        && ((a.y + a.height) - (b.y + b.height)).abs() <= delta
}

/// Average a group of agreeing candidates into one face
fn merge_group(group: &[FaceRegion]) -> FaceRegion {
    let n = group.len() as f32;
    let mut merged = FaceRegion {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
        confidence: 0.0,
    };
    for candidate in group {
        merged.x += candidate.x;
        merged.y += candidate.y;
        merged.width += candidate.width;
        merged.height += candidate.height;
        merged.confidence = merged.confidence.max(candidate.confidence);
    }
    merged.x /= n;
    merged.y /= n;
    merged.width /= n;
    merged.height /= n;
    merged
}

/// Person-presence check built on a face detector
pub struct PersonDetector {
    detector: Box<dyn FaceDetector>,
    params: DetectionParams,
}

impl PersonDetector {
    /// Create a detector with the fixed default parameters
    #[must_use]
    pub fn new(detector: Box<dyn FaceDetector>) -> Self {
        Self {
            detector,
            params: DetectionParams::default(),
        }
    }

    /// Returns true iff at least one face region is found
    ///
    /// Fail-open: a detector fault is logged and reported as "no person
    /// detected" so routing falls back to the general model.
    #[must_use]
    pub fn detect_person(&self, image: &DynamicImage) -> bool {
        match self.detector.detect_faces(image) {
            Ok(candidates) => !group_candidates(&candidates, &self.params).is_empty(),
            Err(e) => {
                warn!("Face detection failed, treating as no person: {e}");
                false
            },
        }
    }
}

impl std::fmt::Debug for PersonDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonDetector")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
