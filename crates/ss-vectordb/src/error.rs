use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorDbError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("Duplicate record id: {0}")]
    DuplicateId(u64),
    #[error("Record id out of range: {0}")]
    IdOutOfRange(u64),
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("Corrupt index data: {0}")]
    CorruptData(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VectorDbError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptData(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, VectorDbError>;
