mod surface;

pub use surface::WorkingSurface;

use image::RgbaImage;
use thiserror::Error;

/// Decision value at which a pixel keeps the background
pub const BACKGROUND_LEVEL: u8 = 255;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompositeError {
    #[error("mask has {actual} values but the frame has {expected} pixels")]
    MaskLength { expected: usize, actual: usize },

    #[error("background is {background:?} but the frame is {frame:?}")]
    DimensionMismatch {
        frame: (u32, u32),
        background: (u32, u32),
    },
}

/// Scale a mask confidence to the 0-255 decision range.
///
/// Rounds half away from zero. NaN maps to 0.
pub fn decision_value(confidence: f32) -> u8 {
    (confidence * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Replaces masked-out pixels of the camera frame with the background.
///
/// The background layer is never written to; each pass copies it into a
/// scratch buffer that is reused between passes of the same size.
#[derive(Default)]
pub struct Compositor {
    scratch: Option<RgbaImage>,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Composite `foreground` over `background` and return the merged frame.
    ///
    /// A pixel keeps the background only when its decision value is exactly
    /// [`BACKGROUND_LEVEL`]; every other pixel takes all four channels of the
    /// foreground.
    pub fn composite(
        &mut self,
        foreground: &RgbaImage,
        background: &RgbaImage,
        mask: &[f32],
    ) -> Result<&RgbaImage, CompositeError> {
        let _span = tracing::debug_span!("composite").entered();

        let dimensions = foreground.dimensions();
        if background.dimensions() != dimensions {
            return Err(CompositeError::DimensionMismatch {
                frame: dimensions,
                background: background.dimensions(),
            });
        }

        let expected = (dimensions.0 as usize) * (dimensions.1 as usize);
        if mask.len() != expected {
            return Err(CompositeError::MaskLength {
                expected,
                actual: mask.len(),
            });
        }

        let scratch = match self.scratch.take() {
            Some(mut scratch) if scratch.dimensions() == dimensions => {
                scratch.copy_from_slice(background.as_raw());
                scratch
            }
            _ => background.clone(),
        };
        let scratch = self.scratch.insert(scratch);

        let fg = foreground.as_raw().chunks_exact(4);
        let out = scratch.chunks_exact_mut(4);
        for ((dst, src), &confidence) in out.zip(fg).zip(mask) {
            if decision_value(confidence) < BACKGROUND_LEVEL {
                dst.copy_from_slice(src);
            }
        }

        Ok(scratch)
    }
}
