use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Frame is empty ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

pub type Result<T> = std::result::Result<T, DetectError>;
