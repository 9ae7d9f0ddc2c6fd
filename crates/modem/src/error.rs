//! Error types for SpeakUp Modem

use thiserror::Error;

/// Modem error types
#[derive(Error, Debug)]
pub enum ModemError {
    #[error("Invalid modem parameters: {msg}")]
    InvalidParameters { msg: String },

    #[error("Transmit queue full: {dropped} symbols dropped")]
    TransmitQueueFull { dropped: usize },

    #[error("Core error: {0}")]
    Core(#[from] speakup_core::CoreError),

    #[error("Frame error: {0}")]
    Frame(#[from] speakup_frame::FrameError),
}

/// Result type for SpeakUp Modem operations
pub type Result<T> = std::result::Result<T, ModemError>;
