//! Sequential batch processing
//!
//! Runs many removals through one engine, in input order, reporting progress
//! after every item. A failed item is captured in its slot instead of aborting
//! the batch, so one corrupt file cannot sink a folder run.

use crate::error::Result;
use crate::processor::{BackgroundRemover, CutoutResult, ImageInput};
use log::{debug, warn};

/// Progress callback: (completed items, total items)
pub type ProgressFn<'a> = &'a mut dyn FnMut(usize, usize);

/// Remove backgrounds from a batch of inputs
///
/// Results come back in input order, one slot per input. The progress callback
/// fires after every item, including failed ones, so `completed` always
/// reaches `total`.
pub fn remove_background_batch(
    engine: &BackgroundRemover,
    inputs: Vec<ImageInput>,
    mut progress: Option<ProgressFn<'_>>,
) -> Vec<Result<CutoutResult>> {
    let total = inputs.len();
    debug!("Starting batch of {total} images");

    let mut results = Vec::with_capacity(total);
    for (index, input) in inputs.into_iter().enumerate() {
        let result = engine.remove_background(input);
        if let Err(e) = &result {
            warn!("Batch item {} of {total} failed: {e}", index + 1);
        }
        results.push(result);
        if let Some(callback) = progress.as_mut() {
            callback(index + 1, total);
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::CountingSessionFactory;
    use crate::config::RemovalOptions;
    use crate::session_cache::SessionCache;
    use image::DynamicImage;
    use std::sync::Arc;

    fn test_engine() -> BackgroundRemover {
        BackgroundRemover::new(
            Arc::new(SessionCache::new(Box::new(CountingSessionFactory::new()))),
            RemovalOptions::default(),
        )
    }

    fn image_input(width: u32, height: u32) -> ImageInput {
        ImageInput::Image(DynamicImage::new_rgb8(width, height))
    }

    #[test]
    fn test_batch_preserves_input_order() {
        let engine = test_engine();
        let inputs = vec![image_input(10, 5), image_input(20, 5), image_input(30, 5)];
        let results = remove_background_batch(&engine, inputs, None);

        assert_eq!(results.len(), 3);
        let widths: Vec<u32> = results
            .iter()
            .map(|r| r.as_ref().unwrap().image.width())
            .collect();
        assert_eq!(widths, vec![10, 20, 30]);
    }

    #[test]
    fn test_progress_fires_after_every_item() {
        let engine = test_engine();
        let inputs = vec![image_input(8, 8), image_input(8, 8), image_input(8, 8)];
        let mut seen = Vec::new();
        let mut callback = |completed: usize, total: usize| seen.push((completed, total));

        remove_background_batch(&engine, inputs, Some(&mut callback));
        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_failed_item_does_not_abort_the_batch() {
        let engine = test_engine();
        let inputs = vec![
            image_input(8, 8),
            ImageInput::from("/nonexistent/missing.png"),
            image_input(8, 8),
        ];
        let mut seen = Vec::new();
        let mut callback = |completed: usize, total: usize| seen.push((completed, total));

        let results = remove_background_batch(&engine, inputs, Some(&mut callback));
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
        // Progress still reaches total despite the failure.
        assert_eq!(seen.last(), Some(&(3, 3)));
    }

    #[test]
    fn test_empty_batch_is_a_no_op() {
        let engine = test_engine();
        let mut called = false;
        let mut callback = |_: usize, _: usize| called = true;
        let results = remove_background_batch(&engine, Vec::new(), Some(&mut callback));
        assert!(results.is_empty());
        assert!(!called);
    }
}
