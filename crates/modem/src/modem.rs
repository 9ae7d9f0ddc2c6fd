//! Message-level modem: FSK modulator, demodulator and HDLC codec wired together

use crate::common::{MessageLink, ModemConfig, SampleSink, SampleSource};
use crate::fsk::{DemodTrace, FskDemodulator, FskModulator};
use crate::{ModemError, Result};
use speakup_core::Sample;
use speakup_frame::hdlc::{FrameHandler, Hdlc, HdlcStats, OutputSink};
use tracing::debug;

/// Feeds encoded bits into the modulator, counting any that do not fit
struct SymbolSink<'a> {
    modulator: &'a mut FskModulator,
    dropped: usize,
}

impl OutputSink for SymbolSink<'_> {
    fn put(&mut self, unit: u8) {
        if !self.modulator.add_symbol(unit) {
            self.dropped += 1;
        }
    }
}

/// Holds at most one unread message; later frames are dropped
struct PendingMessage<'a> {
    slot: &'a mut Option<Vec<u8>>,
}

impl FrameHandler for PendingMessage<'_> {
    fn on_frame(&mut self, frame: Vec<u8>) {
        if self.slot.is_some() {
            debug!(
                "Dropping received frame of {} bytes, previous message unread",
                frame.len()
            );
            return;
        }
        *self.slot = Some(frame);
    }
}

/// Acoustic modem
///
/// Transmit: [`encode_message_to_samples`](Self::encode_message_to_samples)
/// then call [`encode_get_sample`](Self::encode_get_sample) once per output
/// tick. Receive: call [`decode_process_sample`](Self::decode_process_sample)
/// once per input tick and poll [`decode_get_message`](Self::decode_get_message).
#[derive(Debug, Clone)]
pub struct Modem {
    config: ModemConfig,
    modulator: FskModulator,
    demodulator: FskDemodulator,
    hdlc: Hdlc,
    pending: Option<Vec<u8>>,
}

impl Modem {
    /// Create a new modem
    pub fn new(config: ModemConfig) -> Result<Self> {
        check_config(&config)?;

        Ok(Self {
            modulator: FskModulator::new(&config)?,
            demodulator: FskDemodulator::new(&config)?,
            hdlc: Hdlc::new(config.hdlc.clone())?,
            pending: None,
            config,
        })
    }

    /// Reconfigure, dropping all transmit and receive state
    pub fn setup(&mut self, config: ModemConfig) -> Result<()> {
        check_config(&config)?;

        self.demodulator = FskDemodulator::new(&config)?;
        self.hdlc = Hdlc::new(config.hdlc.clone())?;
        self.modulator.setup(&config)?;
        self.pending = None;
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Queue a message as preamble, one frame and postamble
    ///
    /// Anything still queued from a previous message is discarded. If the
    /// transmit queue cannot hold the whole frame nothing is sent.
    pub fn encode_message_to_samples(&mut self, message: impl AsRef<[u8]>) -> Result<()> {
        self.modulator.clear();
        let mut dropped = self.modulator.add_preamble();

        let mut sink = SymbolSink {
            modulator: &mut self.modulator,
            dropped: 0,
        };
        self.hdlc.send_frame(message.as_ref(), &mut sink);
        dropped += sink.dropped;

        dropped += self.modulator.add_postamble();

        if dropped > 0 {
            self.modulator.clear();
            return Err(ModemError::TransmitQueueFull { dropped });
        }
        Ok(())
    }

    /// Next audio sample of the message being sent
    pub fn encode_get_sample(&mut self) -> Option<Sample> {
        self.modulator.get_sample()
    }

    /// True while there are samples left to send
    pub fn is_transmitting(&self) -> bool {
        !self.modulator.is_idle()
    }

    /// Feed one received audio sample
    pub fn decode_process_sample(&mut self, sample: Sample) {
        self.demodulator.process_sample(sample);
        self.forward_symbol();
    }

    /// As [`decode_process_sample`](Self::decode_process_sample), reporting the demodulator state
    pub fn decode_process_sample_traced(&mut self, sample: Sample) -> DemodTrace {
        let trace = self.demodulator.process_sample_traced(sample);
        self.forward_symbol();
        trace
    }

    /// Take the pending message as text
    pub fn decode_get_message(&mut self) -> Option<String> {
        self.pending
            .take()
            .map(|frame| String::from_utf8_lossy(&frame).into_owned())
    }

    /// Discard the pending message, if any
    pub fn decode_clear_message(&mut self) {
        self.pending = None;
    }

    pub fn has_message(&self) -> bool {
        self.pending.is_some()
    }

    /// Receive-side frame counters
    pub fn stats(&self) -> HdlcStats {
        self.hdlc.stats()
    }

    pub fn demodulator(&self) -> &FskDemodulator {
        &self.demodulator
    }

    pub fn modulator(&self) -> &FskModulator {
        &self.modulator
    }

    fn forward_symbol(&mut self) {
        if let Some(bit) = self.demodulator.get_rx_bit() {
            let mut handler = PendingMessage {
                slot: &mut self.pending,
            };
            self.hdlc.handle_bit(bit, &mut handler);
        }
    }
}

fn check_config(config: &ModemConfig) -> Result<()> {
    config.validate()?;

    if !config.hdlc.bitwise {
        return Err(ModemError::InvalidParameters {
            msg: "The modem needs bit-oriented framing".to_string(),
        });
    }
    Ok(())
}

impl SampleSource for Modem {
    fn get_sample(&mut self) -> Option<Sample> {
        self.encode_get_sample()
    }
}

impl SampleSink for Modem {
    fn process_sample(&mut self, sample: Sample) {
        self.decode_process_sample(sample);
    }
}

impl MessageLink for Modem {
    fn send_message(&mut self, payload: &[u8]) -> Result<()> {
        self.encode_message_to_samples(payload)
    }

    fn receive_message(&mut self) -> Option<Vec<u8>> {
        self.pending.take()
    }
}
