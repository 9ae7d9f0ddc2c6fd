//! Error types for SpeakUp Frame

use thiserror::Error;

/// Frame processing error types
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Invalid framing parameters: {msg}")]
    InvalidParameters { msg: String },
}

/// Result type for SpeakUp Frame operations
pub type Result<T> = std::result::Result<T, FrameError>;
