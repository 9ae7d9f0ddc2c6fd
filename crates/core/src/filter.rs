//! Fixed-point filter primitives for the FSK receive front end
//!
//! Everything here runs on integers so the per-sample path behaves the same
//! on a microcontroller timer interrupt as it does on a desktop CPU.

use crate::{CoreError, Result, Sample};

/// Generic filter trait
pub trait Filter<T: Copy> {
    /// Process a single sample
    fn process_sample(&mut self, input: T) -> T;

    /// Process a buffer of samples
    fn process_buffer(&mut self, input: &[T], output: &mut [T]) -> Result<()> {
        if input.len() != output.len() {
            return Err(CoreError::BufferSizeMismatch {
                expected: input.len(),
                actual: output.len(),
            });
        }

        for (i, sample) in input.iter().enumerate() {
            output[i] = self.process_sample(*sample);
        }

        Ok(())
    }

    /// Reset the filter state
    fn reset(&mut self);
}

/// Third-order high-pass IIR filter with integer coefficients
///
/// Implements `y[n] = (x[n] - x[n-3] + 3 (x[n-2] - x[n-1])) / gain
/// + a0 y[n-3] + a1 y[n-2] + a2 y[n-1]`, with every `a` coefficient stored
/// as `round(a * scale)` and the sum divided back down by `scale`.
#[derive(Debug, Clone)]
pub struct HighPassIir3 {
    xv: [i64; 4],
    yv: [i64; 4],
    scale: i64,
    gain: i64,
    feedback: [i64; 3],
}

impl HighPassIir3 {
    /// Create a filter from real-valued feedback coefficients
    pub fn new(scale: i32, gain: i32, feedback: [f64; 3]) -> Result<Self> {
        if scale <= 0 {
            return Err(CoreError::InvalidFilterParameters {
                msg: format!("Scale factor must be positive: {}", scale),
            });
        }

        if gain <= 0 {
            return Err(CoreError::InvalidFilterParameters {
                msg: format!("Filter gain must be positive: {}", gain),
            });
        }

        let quantize = |c: f64| (c * scale as f64 + 0.5) as i64;

        Ok(Self {
            xv: [0; 4],
            yv: [0; 4],
            scale: scale as i64,
            gain: gain as i64,
            feedback: [quantize(feedback[0]), quantize(feedback[1]), quantize(feedback[2])],
        })
    }

    /// Butterworth high-pass, 1600 Hz corner at an 8 kHz sample rate
    pub fn butterworth_1600hz() -> Self {
        Self {
            xv: [0; 4],
            yv: [0; 4],
            scale: 100,
            gain: 4,
            // round(100 * [0.0562, -0.4217, 0.5772]) with truncation toward zero
            feedback: [6, -41, 58],
        }
    }

    /// Quantized feedback coefficients, oldest output first
    pub fn feedback(&self) -> [i64; 3] {
        self.feedback
    }
}

impl Filter<Sample> for HighPassIir3 {
    fn process_sample(&mut self, input: Sample) -> Sample {
        self.xv.copy_within(1..4, 0);
        self.xv[3] = (input as i64 * self.scale) / self.gain;

        self.yv.copy_within(1..4, 0);
        let xv = &self.xv;
        let yv = &self.yv;
        let acc = (xv[3] - xv[0])
            + 3 * (xv[1] - xv[2])
            + self.feedback[0] * yv[0]
            + self.feedback[1] * yv[1]
            + self.feedback[2] * yv[2];
        self.yv[3] = acc / self.scale;

        self.yv[3].clamp(Sample::MIN as i64, Sample::MAX as i64) as Sample
    }

    fn reset(&mut self) {
        self.xv = [0; 4];
        self.yv = [0; 4];
    }
}

/// One-pole smoother: `v += (x - v) * percent / 100`
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    value: Sample,
    percent: Sample,
}

impl EnvelopeFollower {
    pub fn new(percent: u8) -> Result<Self> {
        if percent == 0 || percent > 100 {
            return Err(CoreError::InvalidFilterParameters {
                msg: format!("Envelope smoothing must be 1..=100 percent: {}", percent),
            });
        }

        Ok(Self {
            value: 0,
            percent: percent as Sample,
        })
    }

    /// Current envelope value
    pub fn value(&self) -> Sample {
        self.value
    }
}

impl Filter<Sample> for EnvelopeFollower {
    fn process_sample(&mut self, input: Sample) -> Sample {
        let step = (input as i64 - self.value as i64) * self.percent as i64 / 100;
        self.value = (self.value as i64 + step) as Sample;
        self.value
    }

    fn reset(&mut self) {
        self.value = 0;
    }
}

/// High and low marks of an envelope with fast attack and slow release
///
/// The high mark jumps up towards a rising envelope by `follow / 10000`
/// of the difference and sags towards a falling one by `release / 10000`;
/// the low mark does the mirror image. Their midpoint is the adaptive
/// decision threshold.
#[derive(Debug, Clone)]
pub struct MarkTracker {
    high: Sample,
    low: Sample,
    follow_per_10k: Sample,
    release_per_10k: Sample,
}

impl MarkTracker {
    /// Initial value of the low mark (full scale, so it is pulled down at once)
    pub const LOW_START: Sample = i16::MAX as Sample;

    pub fn new(follow_per_10k: u16, release_per_10k: u16) -> Result<Self> {
        if follow_per_10k == 0 || follow_per_10k > 10_000 || release_per_10k > 10_000 {
            return Err(CoreError::InvalidFilterParameters {
                msg: format!(
                    "Mark rates must be within 0..=10000 (follow {}, release {})",
                    follow_per_10k, release_per_10k
                ),
            });
        }

        Ok(Self {
            high: 0,
            low: Self::LOW_START,
            follow_per_10k: follow_per_10k as Sample,
            release_per_10k: release_per_10k as Sample,
        })
    }

    /// Move both marks towards `envelope`
    pub fn update(&mut self, envelope: Sample) {
        let diff = envelope as i64 - self.high as i64;
        let rate = if diff > 0 { self.follow_per_10k } else { self.release_per_10k };
        self.high = (self.high as i64 + diff * rate as i64 / 10_000) as Sample;

        let diff = envelope as i64 - self.low as i64;
        let rate = if diff < 0 { self.follow_per_10k } else { self.release_per_10k };
        self.low = (self.low as i64 + diff * rate as i64 / 10_000) as Sample;
    }

    pub fn high(&self) -> Sample {
        self.high
    }

    pub fn low(&self) -> Sample {
        self.low
    }

    /// Decision threshold halfway between the marks
    pub fn midpoint(&self) -> Sample {
        (self.high + self.low) / 2
    }

    pub fn reset(&mut self) {
        self.high = 0;
        self.low = Self::LOW_START;
    }
}

/// Glitch filter that only changes its output when the last `window`
/// inputs all agree
#[derive(Debug, Clone)]
pub struct UnanimousVote {
    history: u32,
    mask: u32,
    level: bool,
}

impl UnanimousVote {
    pub fn new(window: usize) -> Result<Self> {
        if window == 0 || window > 32 {
            return Err(CoreError::InvalidFilterParameters {
                msg: format!("Vote window must be 1..=32 samples: {}", window),
            });
        }

        let mask = if window == 32 { u32::MAX } else { (1u32 << window) - 1 };
        Ok(Self {
            history: 0,
            mask,
            level: false,
        })
    }

    /// Currently accepted level
    pub fn level(&self) -> bool {
        self.level
    }
}

impl Filter<bool> for UnanimousVote {
    fn process_sample(&mut self, input: bool) -> bool {
        self.history = ((self.history << 1) | input as u32) & self.mask;
        if self.history == 0 {
            self.level = false;
        } else if self.history == self.mask {
            self.level = true;
        }
        self.level
    }

    fn reset(&mut self) {
        self.history = 0;
        self.level = false;
    }
}
