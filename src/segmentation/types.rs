use anyhow::Result;
use image::RgbaImage;
use std::time::Duration;

/// Background confidence per pixel: 0.0 = keep the camera pixel, 1.0 = show
/// the replacement background. Flattened in row-major order, one value per
/// pixel of the frame it was computed from.
pub type Mask = Vec<f32>;

/// Trait for segmentation models
/// Allows swapping between different backends (RVM, MODNet, MediaPipe, etc.)
pub trait SegmentationModel {
    /// Process a frame and return a background mask
    ///
    /// # Arguments
    /// * `frame` - Input RGBA frame
    /// * `timestamp` - Strictly increasing time of the frame within the stream
    ///
    /// # Returns
    /// * Mask with values 0.0-1.0 matching the frame dimensions
    fn segment(&mut self, frame: &RgbaImage, timestamp: Duration) -> Result<Mask>;

    /// Reset internal state (for models with temporal/recurrent components)
    ///
    /// Call this when:
    /// - Switching cameras
    /// - The capture resolution changes
    /// - Starting a new video session
    fn reset_state(&mut self) {
        // Default implementation: no-op for stateless models
    }

    /// Get the model's preferred input dimensions
    ///
    /// Returns (width, height)
    fn input_size(&self) -> (u32, u32);
}

/// A model that can be moved to the thread that loads it
pub type BoxedModel = Box<dyn SegmentationModel + Send>;
