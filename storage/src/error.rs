use spacemap_core::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("mongodb: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("corrupt quadrant document: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;
