//! SpeakUp Modem - binary FSK over an acoustic channel
//!
//! This crate provides the tone generator, the envelope-detecting
//! demodulator with its self-clocking symbol recovery, and the [`Modem`]
//! facade that ties both to the HDLC-style frame codec.
//!
//! Every per-sample entry point is synchronous and non-blocking, meant to
//! be called once per tick by an externally owned timer or sample loop.

pub mod clock;
pub mod common;
pub mod error;
pub mod fsk;
pub mod modem;

pub use error::{ModemError, Result};
pub use modem::Modem;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        clock::{ClockRecovery, ClockRecoveryConfig, ClockTrace},
        common::{MessageLink, ModemConfig, SampleSink, SampleSource},
        error::{ModemError, Result},
        fsk::{DemodTrace, EnvelopeConfig, FskDemodulator, FskModulator},
        modem::Modem,
    };
    pub use speakup_core::Sample;
    pub use speakup_frame::hdlc::{HdlcConfig, HdlcStats};
}
