mod loader;
mod preprocess;
mod rvm;
pub mod types;

pub use loader::{LoadStatus, ModelLoader};
pub use preprocess::Preprocessor;
pub use rvm::RobustVideoMatting;
pub use types::{BoxedModel, Mask, SegmentationModel};

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Create a default segmentation model (RVM)
pub fn create_default_model<P: AsRef<Path>>(model_path: P) -> Result<BoxedModel> {
    let model = RobustVideoMatting::new(model_path)?;
    Ok(Box::new(model))
}

/// Start loading the default model on a worker thread
pub fn load_default_model(model_path: impl Into<PathBuf>) -> ModelLoader {
    let model_path = model_path.into();
    ModelLoader::spawn(move || create_default_model(&model_path))
}
