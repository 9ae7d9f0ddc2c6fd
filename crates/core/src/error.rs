//! Error types for SpeakUp Core

use thiserror::Error;

/// Core error types
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid sample rate: {rate}")]
    InvalidSampleRate { rate: f64 },

    #[error("Invalid queue capacity: {capacity} (need at least 2 slots)")]
    InvalidCapacity { capacity: usize },

    #[error("Buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Invalid filter parameters: {msg}")]
    InvalidFilterParameters { msg: String },
}

/// Result type for SpeakUp Core operations
pub type Result<T> = std::result::Result<T, CoreError>;
