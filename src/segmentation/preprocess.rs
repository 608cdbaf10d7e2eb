use anyhow::{ensure, Result};
use image::{imageops, RgbaImage};
use ndarray::Array4;

/// Preprocessor for converting camera frames to model input tensors
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    /// Preprocess an RGBA frame into a normalized NCHW tensor
    ///
    /// Steps:
    /// 1. Resize to target dimensions
    /// 2. Drop alpha, convert to float and normalize to [0, 1]
    /// 3. Transpose from HWC to NCHW format
    ///
    /// Returns: Array4<f32> with shape [1, 3, height, width]
    pub fn preprocess(&self, image: &RgbaImage) -> Array4<f32> {
        let _span = tracing::debug_span!("preprocess").entered();

        let resized;
        let source = if image.dimensions() != (self.target_width, self.target_height) {
            resized = imageops::resize(
                image,
                self.target_width,
                self.target_height,
                imageops::FilterType::Triangle,
            );
            &resized
        } else {
            image
        };

        let (width, height) = source.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in source.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            tensor[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
            tensor[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
            tensor[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
        }

        tensor
    }

    /// Resize a model matte back to the frame dimensions
    ///
    /// # Arguments
    /// * `matte` - Flattened matte at model resolution
    /// * `matte_width` - Width of the matte
    /// * `matte_height` - Height of the matte
    /// * `target_width` - Desired output width
    /// * `target_height` - Desired output height
    ///
    /// Returns: Resized matte flattened in row-major order
    pub fn postprocess_matte(
        matte: &[f32],
        matte_width: u32,
        matte_height: u32,
        target_width: u32,
        target_height: u32,
    ) -> Result<Vec<f32>> {
        let _span = tracing::debug_span!("postprocess").entered();

        ensure!(
            matte.len() == (matte_width as usize) * (matte_height as usize),
            "matte has {} values, expected {}x{}",
            matte.len(),
            matte_width,
            matte_height
        );

        if matte_width == target_width && matte_height == target_height {
            return Ok(matte.to_vec());
        }

        // Round-trip through a grayscale image so imageops can do the resize
        let gray_image = image::GrayImage::from_fn(matte_width, matte_height, |x, y| {
            let idx = (y * matte_width + x) as usize;
            image::Luma([to_level(matte[idx])])
        });

        let resized = imageops::resize(
            &gray_image,
            target_width,
            target_height,
            imageops::FilterType::Triangle,
        );

        Ok(resized.pixels().map(|p| p[0] as f32 / 255.0).collect())
    }

    /// Turn a foreground alpha matte into a background mask
    pub fn alpha_to_background(alpha: &[f32]) -> Vec<f32> {
        alpha.iter().map(|a| 1.0 - a.clamp(0.0, 1.0)).collect()
    }

    /// Render a mask as an opaque grayscale image for visualization
    pub fn mask_to_rgba(mask: &[f32], width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let idx = (y * width + x) as usize;
            let value = mask.get(idx).copied().map(to_level).unwrap_or(0);
            image::Rgba([value, value, value, 255])
        })
    }
}

fn to_level(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}
