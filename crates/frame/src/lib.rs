//! SpeakUp Frame - HDLC-style framing and CRC-16
//!
//! This crate wraps arbitrary byte payloads in boundary-delimited,
//! escaped, CRC-protected frames, and recovers validated payloads from a
//! received byte or bit stream.

pub mod crc;
pub mod hdlc;
pub mod error;

pub use error::{FrameError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        crc::{crc16_ccitt, crc16_update, CRC16_CCITT_INIT},
        hdlc::{FrameHandler, Hdlc, HdlcConfig, HdlcStats, OutputSink},
        error::{FrameError, Result},
    };
}
