//! Binary Frequency Shift Keying (FSK) modulator and demodulator
//!
//! The modulator is a phase-accumulating tone generator reading a
//! quarter-wave sine table. The demodulator does not measure frequency at
//! all: a fixed high-pass filter attenuates the low tone far more than the
//! high one, so the filtered envelope alone tells the two apart.

use crate::clock::{ClockRecovery, ClockTrace};
use crate::common::{ModemConfig, SampleSink, SampleSource};
use crate::Result;
use serde::{Deserialize, Serialize};
use speakup_core::filter::{EnvelopeFollower, Filter, HighPassIir3, MarkTracker, UnanimousVote};
use speakup_core::queue::BoundedQueue;
use speakup_core::Sample;

/// Phase steps in one full tone cycle
const PHASE_STEPS: u32 = 1024;

/// The accumulator spans one cycle over the full u32 range; the top bits
/// select the phase step
const PHASE_FRAC_BITS: u32 = 32 - PHASE_STEPS.trailing_zeros();

/// First quarter of a sine wave, `round(32767 * sin(pi * i / 512))`
static QUARTER_SINE: [i16; 256] = [
    0, 201, 402, 603, 804, 1005, 1206, 1407,
    1608, 1809, 2009, 2210, 2410, 2611, 2811, 3012,
    3212, 3412, 3612, 3811, 4011, 4210, 4410, 4609,
    4808, 5007, 5205, 5404, 5602, 5800, 5998, 6195,
    6393, 6590, 6786, 6983, 7179, 7375, 7571, 7767,
    7962, 8157, 8351, 8545, 8739, 8933, 9126, 9319,
    9512, 9704, 9896, 10087, 10278, 10469, 10659, 10849,
    11039, 11228, 11417, 11605, 11793, 11980, 12167, 12353,
    12539, 12725, 12910, 13094, 13279, 13462, 13645, 13828,
    14010, 14191, 14372, 14553, 14732, 14912, 15090, 15269,
    15446, 15623, 15800, 15976, 16151, 16325, 16499, 16673,
    16846, 17018, 17189, 17360, 17530, 17700, 17869, 18037,
    18204, 18371, 18537, 18703, 18868, 19032, 19195, 19357,
    19519, 19680, 19841, 20000, 20159, 20317, 20475, 20631,
    20787, 20942, 21096, 21250, 21403, 21554, 21705, 21856,
    22005, 22154, 22301, 22448, 22594, 22739, 22884, 23027,
    23170, 23311, 23452, 23592, 23731, 23870, 24007, 24143,
    24279, 24413, 24547, 24680, 24811, 24942, 25072, 25201,
    25329, 25456, 25582, 25708, 25832, 25955, 26077, 26198,
    26319, 26438, 26556, 26674, 26790, 26905, 27019, 27133,
    27245, 27356, 27466, 27575, 27683, 27790, 27896, 28001,
    28105, 28208, 28310, 28411, 28510, 28609, 28706, 28803,
    28898, 28992, 29085, 29177, 29268, 29358, 29447, 29534,
    29621, 29706, 29791, 29874, 29956, 30037, 30117, 30195,
    30273, 30349, 30424, 30498, 30571, 30643, 30714, 30783,
    30852, 30919, 30985, 31050, 31113, 31176, 31237, 31297,
    31356, 31414, 31470, 31526, 31580, 31633, 31685, 31736,
    31785, 31833, 31880, 31926, 31971, 32014, 32057, 32098,
    32137, 32176, 32213, 32250, 32285, 32318, 32351, 32382,
    32412, 32441, 32469, 32495, 32521, 32545, 32567, 32589,
    32609, 32628, 32646, 32663, 32678, 32692, 32705, 32717,
    32728, 32737, 32745, 32752, 32757, 32761, 32765, 32766,
];

/// Sine value for a phase in `0..PHASE_STEPS` (taken modulo)
fn sine_lookup(phase: u32) -> Sample {
    let table_len = QUARTER_SINE.len() as u32;
    let phase = phase % PHASE_STEPS;
    let mut index = phase % (table_len * 2);
    if index >= table_len {
        index = table_len * 2 - index - 1;
    }
    let value = QUARTER_SINE[index as usize] as Sample;
    if phase >= table_len * 2 {
        -value
    } else {
        value
    }
}

/// FSK modulator
///
/// Symbols are queued with [`add_symbol`](Self::add_symbol) and pulled out
/// as audio one sample at a time with [`get_sample`](Self::get_sample).
#[derive(Debug, Clone)]
pub struct FskModulator {
    sample_rate: u32,
    symbol_rate: u32,
    // Indexed by symbol value: low tone for 0, high tone for 1
    freqs: [u32; 2],
    manchester: bool,
    preamble_len: usize,
    postamble_len: usize,

    symbols: BoundedQueue<u8>,

    busy: bool,
    cur_symbol: u8,
    second_half: bool,
    // Fractional phase accumulator, one full cycle per 2^32
    phase: u32,
    phase_inc: u32,
    samples_to_next_change: u32,
}

impl FskModulator {
    /// Create a new FSK modulator
    pub fn new(config: &ModemConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            sample_rate: config.sample_rate,
            symbol_rate: config.symbol_rate,
            freqs: [config.freq_low, config.freq_high],
            manchester: config.manchester,
            preamble_len: config.preamble_len,
            postamble_len: config.postamble_len,
            symbols: BoundedQueue::new(config.tx_queue_capacity)?,
            busy: false,
            cur_symbol: 0,
            second_half: false,
            phase: 0,
            phase_inc: 0,
            samples_to_next_change: 0,
        })
    }

    /// Reconfigure rates, tones, coding and framing lengths
    ///
    /// Queued symbols are dropped and the generator restarts from phase zero.
    /// On error the modulator is left unchanged.
    pub fn setup(&mut self, config: &ModemConfig) -> Result<()> {
        *self = Self::new(config)?;
        Ok(())
    }

    /// Drop all queued symbols and stop the generator
    pub fn clear(&mut self) {
        self.symbols.clear();
        self.busy = false;
        self.second_half = false;
        self.phase = 0;
        self.phase_inc = 0;
        self.samples_to_next_change = 0;
    }

    pub fn set_preamble(&mut self, symbols: usize) {
        self.preamble_len = symbols;
    }

    pub fn set_postamble(&mut self, symbols: usize) {
        self.postamble_len = symbols;
    }

    pub fn preamble_len(&self) -> usize {
        self.preamble_len
    }

    pub fn postamble_len(&self) -> usize {
        self.postamble_len
    }

    /// Queue the alternating synchronisation run, returning how many
    /// symbols did not fit
    pub fn add_preamble(&mut self) -> usize {
        (0..self.preamble_len)
            .filter(|i| !self.add_symbol((i % 2) as u8))
            .count()
    }

    /// Queue the trailing run of zeros, returning how many symbols did not fit
    pub fn add_postamble(&mut self) -> usize {
        (0..self.postamble_len).filter(|_| !self.add_symbol(0)).count()
    }

    /// Queue one symbol; false if the queue is full
    pub fn add_symbol(&mut self, symbol: u8) -> bool {
        self.symbols.put(symbol & 1).is_ok()
    }

    /// Symbols queued but not yet started
    pub fn pending_symbols(&self) -> usize {
        self.symbols.count()
    }

    /// True when nothing is being generated and nothing is queued
    pub fn is_idle(&self) -> bool {
        !self.busy && self.symbols.is_empty()
    }

    /// Next output sample, or `None` once idle
    pub fn get_sample(&mut self) -> Option<Sample> {
        if !self.busy {
            if let Some(symbol) = self.symbols.get() {
                self.start_symbol(symbol);
            }
        }

        if !self.busy {
            self.phase = 0;
            return None;
        }

        let value = sine_lookup(self.phase >> PHASE_FRAC_BITS);

        // Wrapping is the cycle boundary, so the phase stays continuous
        self.phase = self.phase.wrapping_add(self.phase_inc);
        self.samples_to_next_change = self.samples_to_next_change.saturating_sub(1);
        if self.samples_to_next_change == 0 {
            if self.manchester && !self.second_half {
                let freq = self.freqs[if self.cur_symbol == 1 { 0 } else { 1 }];
                self.set_freq(freq);
                self.second_half = true;
            } else {
                self.busy = false;
            }
        }

        Some(value)
    }

    fn start_symbol(&mut self, symbol: u8) {
        self.cur_symbol = symbol;
        self.second_half = false;
        self.set_freq(self.freqs[symbol as usize & 1]);
        self.busy = true;
    }

    fn set_freq(&mut self, freq: u32) {
        // freq is below Nyquist, so the increment is under 2^31
        self.phase_inc = (((freq as u64) << 32) / self.sample_rate as u64) as u32;

        self.samples_to_next_change = self.sample_rate / self.symbol_rate;
        if self.manchester {
            self.samples_to_next_change /= 2;
        }
    }
}

impl SampleSource for FskModulator {
    fn get_sample(&mut self) -> Option<Sample> {
        FskModulator::get_sample(self)
    }
}

/// Envelope detector tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    /// Envelope smoothing per sample, percent
    pub smoothing_percent: u8,
    /// Mark attack rate per 10000
    pub mark_follow_per_10k: u16,
    /// Mark release rate per 10000
    pub mark_release_per_10k: u16,
    /// Samples that must agree before the level changes
    pub vote_window: usize,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            smoothing_percent: 20,
            mark_follow_per_10k: 500,
            mark_release_per_10k: 10,
            vote_window: 3,
        }
    }
}

impl EnvelopeConfig {
    pub fn validate(&self) -> Result<()> {
        self.build().map(|_| ())
    }

    fn build(&self) -> Result<(EnvelopeFollower, MarkTracker, UnanimousVote)> {
        Ok((
            EnvelopeFollower::new(self.smoothing_percent)?,
            MarkTracker::new(self.mark_follow_per_10k, self.mark_release_per_10k)?,
            UnanimousVote::new(self.vote_window)?,
        ))
    }
}

/// Demodulator state after one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DemodTrace {
    pub input: Sample,
    pub envelope: Sample,
    pub instantaneous: bool,
    pub level: bool,
    pub signal_high: Sample,
    pub signal_low: Sample,
    /// Symbol decided on this sample, if any
    pub symbol: Option<u8>,
    #[serde(flatten)]
    pub clock: ClockTrace,
}

/// FSK demodulator
#[derive(Debug, Clone)]
pub struct FskDemodulator {
    manchester: bool,
    highpass: HighPassIir3,
    envelope: EnvelopeFollower,
    marks: MarkTracker,
    vote: UnanimousVote,
    clock: ClockRecovery,
    symbols: BoundedQueue<u8>,
    dropped_symbols: u64,
}

impl FskDemodulator {
    /// Create a new FSK demodulator
    ///
    /// The high-pass front end is designed for an 8 kHz sample rate with
    /// tones either side of 1600 Hz.
    pub fn new(config: &ModemConfig) -> Result<Self> {
        config.validate()?;

        let (envelope, marks, vote) = config.envelope.build()?;
        let clock = ClockRecovery::new(
            config.samples_per_symbol(),
            config.manchester,
            &config.clock,
        )?;

        Ok(Self {
            manchester: config.manchester,
            highpass: HighPassIir3::butterworth_1600hz(),
            envelope,
            marks,
            vote,
            clock,
            symbols: BoundedQueue::new(config.rx_queue_capacity)?,
            dropped_symbols: 0,
        })
    }

    /// Feed one input sample
    pub fn process_sample(&mut self, sample: Sample) {
        self.process_sample_traced(sample);
    }

    /// Feed one input sample and report every intermediate value
    pub fn process_sample_traced(&mut self, sample: Sample) -> DemodTrace {
        let filtered = self.highpass.process_sample(sample);
        let magnitude = filtered.saturating_abs();

        // Marks follow the envelope as it stood before this sample
        self.marks.update(self.envelope.value());
        let envelope = self.envelope.process_sample(magnitude);

        let instantaneous = envelope > self.marks.midpoint();
        let level = self.vote.process_sample(instantaneous);

        let (sample_point, clock) = self.clock.new_sample_traced(level);
        let mut symbol = None;
        if sample_point {
            // Just past a Manchester centre transition the level is the inverse of the bit
            let value = u8::from(if self.manchester { !level } else { level });
            if self.symbols.put(value).is_err() {
                self.dropped_symbols += 1;
            }
            symbol = Some(value);
        }

        DemodTrace {
            input: sample,
            envelope,
            instantaneous,
            level,
            signal_high: self.marks.high(),
            signal_low: self.marks.low(),
            symbol,
            clock,
        }
    }

    /// Take the oldest decoded symbol
    pub fn get_rx_bit(&mut self) -> Option<u8> {
        self.symbols.get()
    }

    pub fn pending_symbols(&self) -> usize {
        self.symbols.count()
    }

    /// Symbols lost because the output queue was full
    pub fn dropped_symbols(&self) -> u64 {
        self.dropped_symbols
    }

    pub fn clock(&self) -> &ClockRecovery {
        &self.clock
    }

    /// Current decision threshold
    pub fn threshold(&self) -> Sample {
        self.marks.midpoint()
    }

    pub fn reset(&mut self) {
        self.highpass.reset();
        self.envelope.reset();
        self.marks.reset();
        self.vote.reset();
        self.clock.reset();
        self.symbols.clear();
        self.dropped_symbols = 0;
    }
}

impl SampleSink for FskDemodulator {
    fn process_sample(&mut self, sample: Sample) {
        FskDemodulator::process_sample(self, sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nrz_config() -> ModemConfig {
        ModemConfig::default().with_manchester(false).unwrap()
    }

    fn modulate(config: &ModemConfig, symbols: &[u8], lead: usize, tail: usize) -> Vec<Sample> {
        let mut modulator = FskModulator::new(config).unwrap();
        for &s in symbols {
            assert!(modulator.add_symbol(s));
        }
        let mut samples = vec![0; lead];
        samples.extend(modulator.drain());
        samples.extend(std::iter::repeat(0).take(tail));
        samples
    }

    fn sign_changes(samples: &[Sample]) -> usize {
        samples.windows(2).filter(|w| (w[0] < 0) != (w[1] < 0)).count()
    }

    fn demodulate(config: &ModemConfig, samples: &[Sample]) -> Vec<u8> {
        let mut demod = FskDemodulator::new(config).unwrap();
        let mut out = Vec::new();
        for &s in samples {
            demod.process_sample(s);
            while let Some(bit) = demod.get_rx_bit() {
                out.push(bit);
            }
        }
        out
    }

    #[test]
    fn test_sine_lookup_quadrants() {
        assert_eq!(sine_lookup(0), 0);
        assert_eq!(sine_lookup(128), 23170);
        assert_eq!(sine_lookup(256), 32766);
        assert_eq!(sine_lookup(512), 0);
        assert_eq!(sine_lookup(640), -23170);
        assert_eq!(sine_lookup(768), -32766);
        assert_eq!(sine_lookup(1024 + 128), 23170);
        // Symmetric about the quarter points
        for i in 0..256 {
            assert_eq!(sine_lookup(i), sine_lookup(511 - i));
            assert_eq!(sine_lookup(512 + i), -sine_lookup(i));
        }
    }

    #[test]
    fn test_manchester_symbol_layout() {
        let config = ModemConfig::default();
        let samples = modulate(&config, &[1], 0, 0);
        assert_eq!(samples.len(), 80);

        // First half at 2000 Hz: one cycle every 4 samples
        assert_eq!(&samples[..4], &[0, 32766, 0, -32766]);
        // Second half at 1000 Hz, phase carried over
        assert_eq!(&samples[40..43], &[0, 23170, 32766]);
        // Mirrored quadrant lookup is one step short of exact symmetry
        assert_eq!(samples[43], sine_lookup(384));
        assert_eq!(samples[43], QUARTER_SINE[127] as Sample);
    }

    #[test]
    fn test_nrz_symbol_length() {
        let samples = modulate(&nrz_config(), &[0, 1], 0, 0);
        assert_eq!(samples.len(), 160);
        assert_eq!(samples[2], 32766);
        assert_eq!(samples[81], 32766);
    }

    #[test]
    fn test_tone_frequency_with_fractional_period() {
        // 8000 / 2400 and 8000 / 3000 are not whole sample counts
        for freq in [2400u32, 3000] {
            let config = ModemConfig::new(8000, 10, freq, 1000, false).unwrap();
            let samples = modulate(&config, &[1], 0, 0);
            assert_eq!(samples.len(), 800);

            // 0.1 s of tone crosses zero twice per cycle
            let expected = 2 * freq as usize / 10;
            let changes = sign_changes(&samples);
            assert!(
                changes.abs_diff(expected) <= 2,
                "{} Hz: {} sign changes, expected {}",
                freq,
                changes,
                expected
            );
            assert!(samples.iter().map(|s| s.abs()).max().unwrap() > 20000);
        }
    }

    #[test]
    fn test_setup_applies_new_rates_and_resets() {
        let mut modulator = FskModulator::new(&ModemConfig::default()).unwrap();
        modulator.add_symbol(1);
        modulator.add_symbol(1);
        assert!(modulator.get_sample().is_some());

        let config = ModemConfig::new(8000, 50, 2400, 1000, false)
            .unwrap()
            .with_preamble(3)
            .with_postamble(2);
        modulator.setup(&config).unwrap();
        assert!(modulator.is_idle());
        assert_eq!(modulator.preamble_len(), 3);
        assert_eq!(modulator.postamble_len(), 2);

        assert!(modulator.add_symbol(1));
        let samples = modulator.drain();
        assert_eq!(samples.len(), 160);
        assert_eq!(samples[0], 0);
        // 2400 Hz for 20 ms is 48 cycles
        assert!(sign_changes(&samples).abs_diff(96) <= 2);

        let invalid = ModemConfig {
            sample_rate: 0,
            ..ModemConfig::default()
        };
        assert!(modulator.setup(&invalid).is_err());
        assert_eq!(modulator.preamble_len(), 3);
    }

    #[test]
    fn test_modulator_idle_and_clear() {
        let mut modulator = FskModulator::new(&ModemConfig::default()).unwrap();
        assert!(modulator.is_idle());
        assert_eq!(modulator.get_sample(), None);

        modulator.add_symbol(1);
        modulator.add_symbol(0);
        assert!(modulator.get_sample().is_some());
        modulator.clear();
        assert!(modulator.is_idle());
        assert_eq!(modulator.get_sample(), None);
    }

    #[test]
    fn test_transmit_queue_full() {
        let config = ModemConfig::default().with_queue_capacities(4, 16).unwrap();
        let mut modulator = FskModulator::new(&config).unwrap();
        assert!(modulator.add_symbol(1));
        assert!(modulator.add_symbol(0));
        assert!(modulator.add_symbol(1));
        assert!(!modulator.add_symbol(1));
        assert_eq!(modulator.pending_symbols(), 3);
    }

    #[test]
    fn test_preamble_and_postamble_lengths() {
        let mut modulator = FskModulator::new(&ModemConfig::default()).unwrap();
        modulator.set_preamble(7);
        modulator.set_postamble(3);
        assert_eq!(modulator.add_preamble(), 0);
        assert_eq!(modulator.add_postamble(), 0);
        assert_eq!(modulator.pending_symbols(), 10);

        let mut queued = Vec::new();
        while let Some(s) = modulator.symbols.get() {
            queued.push(s);
        }
        assert_eq!(queued, vec![0, 1, 0, 1, 0, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_preamble_overflow_is_counted() {
        let config = ModemConfig::default()
            .with_preamble(10)
            .with_queue_capacities(5, 16)
            .unwrap();
        let mut modulator = FskModulator::new(&config).unwrap();
        assert_eq!(modulator.add_preamble(), 6);
    }

    #[test]
    fn test_demodulate_manchester() {
        let config = ModemConfig::default();
        let data = [1, 1, 0, 0, 1, 0, 1, 1, 1, 0, 0, 0, 1];
        let mut symbols: Vec<u8> = (0..20).map(|i| (i % 2) as u8).collect();
        symbols.extend(data);

        let samples = modulate(&config, &symbols, 200, 400);
        let decoded = demodulate(&config, &samples);
        assert!(decoded.ends_with(&data), "decoded {:?}", decoded);
        assert!(decoded.len() <= symbols.len());
    }

    #[test]
    fn test_demodulate_nrz() {
        let config = nrz_config();
        let data = [1, 1, 0, 1, 0, 0, 1, 1, 1, 0, 1];
        let mut symbols: Vec<u8> = (0..20).map(|i| (i % 2) as u8).collect();
        symbols.extend(data);

        let samples = modulate(&config, &symbols, 200, 0);
        let decoded = demodulate(&config, &samples);
        assert!(decoded.len() >= data.len());
        let start = decoded.len() - data.len();
        assert_eq!(&decoded[start..], &data);
    }

    #[test]
    fn test_silence_decodes_nothing() {
        let config = ModemConfig::default();
        assert!(demodulate(&config, &[0; 4000]).is_empty());
    }

    #[test]
    fn test_trace_reports_symbols() {
        let config = ModemConfig::default();
        let symbols: Vec<u8> = (0..20).map(|i| (i % 2) as u8).collect();
        let samples = modulate(&config, &symbols, 200, 0);

        let mut demod = FskDemodulator::new(&config).unwrap();
        let traces: Vec<DemodTrace> = samples
            .iter()
            .map(|&s| demod.process_sample_traced(s))
            .collect();
        let emitted = traces.iter().filter(|t| t.symbol.is_some()).count();
        assert_eq!(emitted, demod.pending_symbols());
        assert!(emitted > 10);
        assert!(traces.iter().all(|t| t.clock.samples_per_symbol == 80));
        assert!(traces.last().unwrap().signal_high > traces.last().unwrap().signal_low);
    }

    #[test]
    fn test_receive_queue_overflow_drops_symbols() {
        let config = ModemConfig::default().with_queue_capacities(16, 3).unwrap();
        let symbols: Vec<u8> = (0..20).map(|i| (i % 2) as u8).collect();
        let samples = modulate(&config, &symbols, 200, 0);

        let mut demod = FskDemodulator::new(&config).unwrap();
        for &s in &samples {
            demod.process_sample(s);
        }
        assert_eq!(demod.pending_symbols(), 2);
        assert!(demod.dropped_symbols() > 0);
    }
}
