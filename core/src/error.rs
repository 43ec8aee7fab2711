use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("invalid region: every extent must be positive, got {size:?}")]
    InvalidRegion { size: [i64; 3] },
    #[error("shape mismatch: expected {expected} cells, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("cell {index:?} is outside a field of shape {shape:?}")]
    OutOfBounds { index: [usize; 3], shape: [usize; 3] },
}

pub type Result<T> = std::result::Result<T, EngineError>;
