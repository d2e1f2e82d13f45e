use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Embedding error: {0}")]
    Embedding(String),
    #[error("Scene extraction error: {0}")]
    Extraction(String),
    #[error("Presentation error: {0}")]
    Presentation(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
