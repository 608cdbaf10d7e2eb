use super::preprocess::Preprocessor;
use super::types::{Mask, SegmentationModel};
use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use ndarray::{Array4, Ix4};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use std::time::Duration;

/// RobustVideoMatting segmentation model
///
/// This model uses recurrent connections to maintain temporal consistency.
/// Hidden states (r1-r4) are carried between frames for smooth results.
pub struct RobustVideoMatting {
    session: Session,
    preprocessor: Preprocessor,
    width: u32,
    height: u32,

    // Recurrent hidden states, fed back in the next frame
    r1: Option<Array4<f32>>,
    r2: Option<Array4<f32>>,
    r3: Option<Array4<f32>>,
    r4: Option<Array4<f32>>,

    downsample_ratio: f32,
    last_timestamp: Option<Duration>,
}

impl RobustVideoMatting {
    /// Create a new RVM model from an ONNX file
    ///
    /// # Default Configuration
    /// - Input size: 512x512
    /// - Downsample ratio: 0.25 (hidden states are 1/4 of input resolution)
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading RVM model from {}", path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        tracing::info!(
            inputs = session.inputs.len(),
            outputs = session.outputs.len(),
            "RVM model loaded successfully"
        );

        let width = 512;
        let height = 512;

        Ok(Self {
            session,
            preprocessor: Preprocessor::new(width, height),
            width,
            height,
            r1: None,
            r2: None,
            r3: None,
            r4: None,
            downsample_ratio: 0.25,
            last_timestamp: None,
        })
    }

    fn hidden_states(&mut self) -> [Array4<f32>; 4] {
        let h = (self.height as f32 * self.downsample_ratio) as usize;
        let w = (self.width as f32 * self.downsample_ratio) as usize;

        let r1 = self.r1.take().unwrap_or_else(|| {
            tracing::debug!("Initializing hidden states to {}x{}", w, h);
            Array4::zeros((1, 16, h, w))
        });
        let r2 = self
            .r2
            .take()
            .unwrap_or_else(|| Array4::zeros((1, 20, h / 2, w / 2)));
        let r3 = self
            .r3
            .take()
            .unwrap_or_else(|| Array4::zeros((1, 24, h / 4, w / 4)));
        let r4 = self
            .r4
            .take()
            .unwrap_or_else(|| Array4::zeros((1, 28, h / 8, w / 8)));

        [r1, r2, r3, r4]
    }
}

impl SegmentationModel for RobustVideoMatting {
    fn segment(&mut self, frame: &RgbaImage, timestamp: Duration) -> Result<Mask> {
        let _span = tracing::debug_span!("rvm_segment").entered();

        // Recurrent state from a later point in time is meaningless
        if self.last_timestamp.is_some_and(|last| timestamp <= last) {
            self.reset_state();
        }
        self.last_timestamp = Some(timestamp);

        let input = self.preprocessor.preprocess(frame);
        let [r1, r2, r3, r4] = self.hidden_states();

        // RVM expects: src, r1i, r2i, r3i, r4i
        let infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![
                Tensor::from_array(input)?,
                Tensor::from_array(r1)?,
                Tensor::from_array(r2)?,
                Tensor::from_array(r3)?,
                Tensor::from_array(r4)?
            ])
            .context("Failed to run inference")?;
        drop(infer_span);

        if outputs.len() < 6 {
            return Err(anyhow!(
                "RVM returned {} outputs, expected fgr, pha, r1-r4",
                outputs.len()
            ));
        }

        // Outputs: fgr, pha, r1o, r2o, r3o, r4o
        let pha = outputs[1].try_extract_array::<f32>()?;
        let matte_shape = pha.shape().to_vec();
        if matte_shape.len() != 4 {
            return Err(anyhow!("unexpected matte shape {:?}", matte_shape));
        }
        let matte_height = matte_shape[2] as u32;
        let matte_width = matte_shape[3] as u32;
        let alpha: Vec<f32> = pha.iter().copied().collect();

        let next_state = |index: usize| -> Result<Array4<f32>> {
            Ok(outputs[index]
                .try_extract_array::<f32>()?
                .to_owned()
                .into_dimensionality::<Ix4>()?)
        };
        self.r1 = Some(next_state(2)?);
        self.r2 = Some(next_state(3)?);
        self.r3 = Some(next_state(4)?);
        self.r4 = Some(next_state(5)?);

        let (frame_width, frame_height) = frame.dimensions();
        let alpha = Preprocessor::postprocess_matte(
            &alpha,
            matte_width,
            matte_height,
            frame_width,
            frame_height,
        )?;

        Ok(Preprocessor::alpha_to_background(&alpha))
    }

    fn reset_state(&mut self) {
        tracing::info!("Resetting RVM hidden states");
        self.r1 = None;
        self.r2 = None;
        self.r3 = None;
        self.r4 = None;
        self.last_timestamp = None;
    }

    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
