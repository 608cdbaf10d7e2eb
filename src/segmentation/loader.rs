use super::types::BoxedModel;
use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use std::thread;

/// Result of polling a [`ModelLoader`]
pub enum LoadStatus {
    Pending,
    Ready(BoxedModel),
    Failed(anyhow::Error),
}

/// Builds a segmentation model on a worker thread so frames keep flowing
/// while the session initializes.
pub struct ModelLoader {
    rx: Receiver<Result<BoxedModel>>,
}

impl ModelLoader {
    pub fn spawn<F>(build: F) -> Self
    where
        F: FnOnce() -> Result<BoxedModel> + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        thread::spawn(move || {
            let result = build();
            if tx.send(result).is_err() {
                tracing::debug!("Model loader dropped before the model was ready");
            }
        });
        Self { rx }
    }

    /// Non-blocking check for the finished model
    pub fn poll(&self) -> LoadStatus {
        match self.rx.try_recv() {
            Ok(Ok(model)) => LoadStatus::Ready(model),
            Ok(Err(err)) => LoadStatus::Failed(err),
            Err(TryRecvError::Empty) => LoadStatus::Pending,
            Err(TryRecvError::Disconnected) => {
                LoadStatus::Failed(anyhow!("model loader thread exited without a result"))
            }
        }
    }
}
