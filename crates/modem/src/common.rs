//! Shared modem configuration and the sample/message boundary traits

use crate::clock::ClockRecoveryConfig;
use crate::fsk::EnvelopeConfig;
use crate::{ModemError, Result};
use serde::{Deserialize, Serialize};
use speakup_core::Sample;
use speakup_frame::hdlc::HdlcConfig;

/// Anything that produces one output sample per tick
pub trait SampleSource {
    /// Next sample, or `None` when there is nothing left to play
    fn get_sample(&mut self) -> Option<Sample>;

    /// Pull samples until the source runs dry
    fn drain(&mut self) -> Vec<Sample> {
        let mut out = Vec::new();
        while let Some(sample) = self.get_sample() {
            out.push(sample);
        }
        out
    }
}

/// Anything that consumes one input sample per tick
pub trait SampleSink {
    fn process_sample(&mut self, sample: Sample);

    fn process_samples(&mut self, samples: &[Sample]) {
        for &sample in samples {
            self.process_sample(sample);
        }
    }
}

/// Message-level send and receive
pub trait MessageLink {
    /// Queue `payload` for transmission as a single frame
    fn send_message(&mut self, payload: &[u8]) -> Result<()>;

    /// Take the most recently completed, unread payload
    fn receive_message(&mut self) -> Option<Vec<u8>>;
}

/// Modem configuration
///
/// Both ends of a link must agree on everything except the queue
/// capacities.
///
/// The demodulator's fixed high-pass filter has its corner at a fifth of
/// the sample rate (1600 Hz at 8 kHz), so the low tone must lie below that
/// corner and the high tone above it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    pub sample_rate: u32,
    pub symbol_rate: u32,
    /// Tone for a 1 symbol (first half of a Manchester 1)
    pub freq_high: u32,
    /// Tone for a 0 symbol
    pub freq_low: u32,
    pub manchester: bool,
    /// Alternating symbols sent before each frame
    pub preamble_len: usize,
    /// Zero symbols sent after each frame
    pub postamble_len: usize,
    /// Transmit symbol queue slots
    pub tx_queue_capacity: usize,
    /// Receive symbol queue slots
    pub rx_queue_capacity: usize,
    pub clock: ClockRecoveryConfig,
    pub envelope: EnvelopeConfig,
    pub hdlc: HdlcConfig,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            sample_rate: 8000,
            symbol_rate: 100,
            freq_high: 2000,
            freq_low: 1000,
            manchester: true,
            preamble_len: 20,
            postamble_len: 5,
            tx_queue_capacity: 16384,
            rx_queue_capacity: 4000,
            clock: ClockRecoveryConfig::default(),
            envelope: EnvelopeConfig::default(),
            hdlc: HdlcConfig::default(),
        }
    }
}

impl ModemConfig {
    /// Longest tone period the quarter-wave table can step through
    pub const MAX_SAMPLES_PER_CYCLE: u32 = 1024;

    /// Sample rate over the demodulator high-pass corner frequency
    pub const HIGHPASS_CORNER_DIVISOR: u32 = 5;

    /// Create a configuration with the given rates and tones
    pub fn new(
        sample_rate: u32,
        symbol_rate: u32,
        freq_high: u32,
        freq_low: u32,
        manchester: bool,
    ) -> Result<Self> {
        let config = Self {
            sample_rate,
            symbol_rate,
            freq_high,
            freq_low,
            manchester,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Get samples per symbol
    pub fn samples_per_symbol(&self) -> u32 {
        self.sample_rate / self.symbol_rate.max(1)
    }

    /// Samples between tone changes (half a symbol with Manchester coding)
    pub fn samples_per_change(&self) -> u32 {
        let sps = self.samples_per_symbol();
        if self.manchester {
            sps / 2
        } else {
            sps
        }
    }

    pub fn with_preamble(mut self, symbols: usize) -> Self {
        self.preamble_len = symbols;
        self
    }

    pub fn with_postamble(mut self, symbols: usize) -> Self {
        self.postamble_len = symbols;
        self
    }

    pub fn with_manchester(mut self, manchester: bool) -> Result<Self> {
        self.manchester = manchester;
        self.validate()?;
        Ok(self)
    }

    /// Set both symbol queue capacities
    pub fn with_queue_capacities(mut self, tx: usize, rx: usize) -> Result<Self> {
        self.tx_queue_capacity = tx;
        self.rx_queue_capacity = rx;
        self.validate()?;
        Ok(self)
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(invalid(format!("Invalid sample rate: {}", self.sample_rate)));
        }

        if self.symbol_rate == 0 || self.symbol_rate > self.sample_rate {
            return Err(invalid(format!("Invalid symbol rate: {}", self.symbol_rate)));
        }

        for (name, freq) in [("high", self.freq_high), ("low", self.freq_low)] {
            if freq == 0 || freq as u64 * 2 >= self.sample_rate as u64 {
                return Err(invalid(format!(
                    "The {} tone must lie between 0 Hz and Nyquist ({} Hz): {}",
                    name,
                    self.sample_rate / 2,
                    freq
                )));
            }
            if self.sample_rate / freq > Self::MAX_SAMPLES_PER_CYCLE {
                return Err(invalid(format!(
                    "The {} tone is too low for a {} Hz sample rate: {}",
                    name, self.sample_rate, freq
                )));
            }
        }

        if self.freq_high <= self.freq_low {
            return Err(invalid(format!(
                "High tone ({} Hz) must be above the low tone ({} Hz)",
                self.freq_high, self.freq_low
            )));
        }

        let corner = Self::HIGHPASS_CORNER_DIVISOR as u64;
        let sample_rate = self.sample_rate as u64;
        if self.freq_low as u64 * corner >= sample_rate
            || self.freq_high as u64 * corner <= sample_rate
        {
            return Err(invalid(format!(
                "Tones ({} Hz, {} Hz) must lie either side of the {} Hz filter corner",
                self.freq_low,
                self.freq_high,
                self.sample_rate / Self::HIGHPASS_CORNER_DIVISOR
            )));
        }

        let sps = self.samples_per_symbol();
        if sps < 4 {
            return Err(invalid(format!(
                "At least 4 samples per symbol are needed, got {}",
                sps
            )));
        }

        if self.manchester && sps % 2 != 0 {
            return Err(invalid(format!(
                "Manchester coding needs an even number of samples per symbol, got {}",
                sps
            )));
        }

        if self.tx_queue_capacity < 2 || self.rx_queue_capacity < 2 {
            return Err(invalid(format!(
                "Queue capacities must be at least 2 (tx {}, rx {})",
                self.tx_queue_capacity, self.rx_queue_capacity
            )));
        }

        self.clock.validate()?;
        self.envelope.validate()?;
        self.hdlc.validate()?;

        Ok(())
    }
}

fn invalid(msg: String) -> ModemError {
    ModemError::InvalidParameters { msg }
}
