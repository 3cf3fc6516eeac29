use ndarray::{Array, Ix4};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelServiceError {
    #[error("ONNX Runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("Session mutex poisoned: {0}")]
    Poisoned(String),
    #[error("Model produced no outputs")]
    NoOutput,
    #[error("Invalid output tensor: {0}")]
    InvalidOutput(String),
}

/// A loaded classifier: a `(1, H, W, 3)` tensor in, one probability per
/// class label out.
pub trait ModelService: Send + Sync + 'static {
    fn predict(&self, input: &Array<f32, Ix4>) -> Result<Vec<f32>, ModelServiceError>;
}
