//! Sample rate conversion for recordings made at a foreign rate

use crate::{CoreError, Result, Sample};
use tracing::debug;

/// Streaming linear-interpolation resampler
///
/// Input may be fed in arbitrary chunks; interpolation state carries over
/// between calls.
pub struct Resampler {
    input_rate: f64,
    output_rate: f64,
    step: f64,
    pending: Vec<f64>,
    position: f64,
}

impl Resampler {
    /// Create a new resampler
    pub fn new(input_rate: f64, output_rate: f64) -> Result<Self> {
        if input_rate <= 0.0 || !input_rate.is_finite() {
            return Err(CoreError::InvalidSampleRate { rate: input_rate });
        }
        if output_rate <= 0.0 || !output_rate.is_finite() {
            return Err(CoreError::InvalidSampleRate { rate: output_rate });
        }

        debug!("Resampling {} Hz to {} Hz", input_rate, output_rate);

        Ok(Self {
            input_rate,
            output_rate,
            step: input_rate / output_rate,
            pending: Vec::new(),
            position: 0.0,
        })
    }

    pub fn input_rate(&self) -> f64 {
        self.input_rate
    }

    pub fn output_rate(&self) -> f64 {
        self.output_rate
    }

    /// Input samples consumed per output sample
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Resample a chunk, appending to `output`
    pub fn process(&mut self, input: &[Sample], output: &mut Vec<Sample>) {
        self.pending.extend(input.iter().map(|&s| s as f64));

        while self.position + 1.0 < self.pending.len() as f64 {
            let index = self.position as usize;
            let frac = self.position - index as f64;
            let value = self.pending[index] * (1.0 - frac) + self.pending[index + 1] * frac;
            output.push(value.round() as Sample);
            self.position += self.step;
        }

        // Keep the sample the next interpolation starts from
        let consumed = (self.position as usize).min(self.pending.len());
        if consumed > 0 {
            self.pending.drain(0..consumed);
            self.position -= consumed as f64;
        }
    }

    /// Resample a whole recording in one go
    pub fn process_all(&mut self, input: &[Sample]) -> Vec<Sample> {
        let mut output = Vec::with_capacity(self.output_length(input.len()));
        self.process(input, &mut output);
        output
    }

    /// Approximate number of output samples for `input_length` inputs
    pub fn output_length(&self, input_length: usize) -> usize {
        (input_length as f64 / self.step).ceil() as usize
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.position = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resampler_creation() {
        let resampler = Resampler::new(48000.0, 8000.0).unwrap();
        assert_eq!(resampler.input_rate(), 48000.0);
        assert_eq!(resampler.output_rate(), 8000.0);
        assert!((resampler.step() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_rates() {
        assert!(Resampler::new(0.0, 8000.0).is_err());
        assert!(Resampler::new(8000.0, -1.0).is_err());
    }

    #[test]
    fn test_integer_decimation_picks_every_nth() {
        let mut resampler = Resampler::new(16000.0, 8000.0).unwrap();
        let input: Vec<Sample> = (0..10).map(|i| i * 100).collect();
        let output = resampler.process_all(&input);
        assert_eq!(output, vec![0, 200, 400, 600, 800]);
    }

    #[test]
    fn test_upsampling_interpolates() {
        let mut resampler = Resampler::new(4000.0, 8000.0).unwrap();
        let output = resampler.process_all(&[0, 100, 200]);
        assert_eq!(output, vec![0, 50, 100, 150]);
    }

    #[test]
    fn test_chunked_matches_whole() {
        let input: Vec<Sample> = (0..300).map(|i| ((i * 37) % 1000) - 500).collect();

        let mut whole = Resampler::new(44100.0, 8000.0).unwrap();
        let expected = whole.process_all(&input);

        let mut chunked = Resampler::new(44100.0, 8000.0).unwrap();
        let mut output = Vec::new();
        for chunk in input.chunks(17) {
            chunked.process(chunk, &mut output);
        }
        assert_eq!(output.len(), expected.len());
        for (a, b) in output.iter().zip(&expected) {
            assert!((a - b).abs() <= 1);
        }
    }
}
