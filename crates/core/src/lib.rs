//! SpeakUp Core - sample queues and fixed-point front-end primitives
//!
//! This crate provides the bounded single-producer/single-consumer queue
//! used between the real-time sample context and the application context,
//! the integer filters the FSK demodulator is built from, and a simple
//! resampler used by the host tools.

pub mod queue;
pub mod filter;
pub mod resample;
pub mod error;

pub use error::{CoreError, Result};

/// One analog-to-digital reading or one synthesized output value
pub type Sample = i32;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        queue::{BoundedQueue, RingPosn},
        filter::{Filter, HighPassIir3, EnvelopeFollower, MarkTracker, UnanimousVote},
        resample::Resampler,
        error::{CoreError, Result},
        Sample,
    };
}
