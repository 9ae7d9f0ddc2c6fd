//! Receiver configuration and implementation

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use speakup_core::resample::Resampler;
use speakup_modem::prelude::*;

use crate::common::{read_wav_file, GlobalConfig};
use crate::config::ModemArgs;

/// Receiver configuration
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(about = "SpeakUp receiver: decode messages from a WAV file")]
pub struct RxConfig {
    #[command(flatten)]
    pub global: GlobalConfig,

    #[command(flatten)]
    pub modem: ModemArgs,

    /// Input WAV file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Write decoded messages to this file, one per line
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print messages as base64 instead of text
    #[arg(long)]
    pub base64: bool,

    /// Write per-sample demodulator state as JSON lines
    #[arg(long)]
    pub trace: Option<PathBuf>,
}

impl Default for RxConfig {
    fn default() -> Self {
        Self {
            global: GlobalConfig::default(),
            modem: ModemArgs::default(),
            input: PathBuf::from("message.wav"),
            output: None,
            base64: false,
            trace: None,
        }
    }
}

/// SpeakUp receiver
pub struct Receiver {
    config: RxConfig,
    modem: Modem,
    trace: Option<BufWriter<File>>,
}

impl Receiver {
    /// Create a new receiver with the given configuration
    pub fn new(config: RxConfig) -> Result<Self> {
        let modem_config = config.modem.resolve(&config.global)?;
        let modem = Modem::new(modem_config)?;

        let trace = match &config.trace {
            Some(path) => Some(BufWriter::new(
                File::create(path)
                    .with_context(|| format!("Failed to create trace file: {:?}", path))?,
            )),
            None => None,
        };

        Ok(Self {
            config,
            modem,
            trace,
        })
    }

    /// Decode the configured input file
    pub fn receive_file(&mut self) -> Result<Vec<Vec<u8>>> {
        let (samples, sample_rate) = read_wav_file(&self.config.input)?;
        self.receive(&samples, sample_rate)
    }

    /// Decode every message in a recording made at `sample_rate`
    pub fn receive(&mut self, samples: &[Sample], sample_rate: u32) -> Result<Vec<Vec<u8>>> {
        let modem_rate = self.modem.config().sample_rate;
        let resampled;
        let samples = if sample_rate != modem_rate {
            let mut resampler = Resampler::new(sample_rate as f64, modem_rate as f64)?;
            resampled = resampler.process_all(samples);
            &resampled[..]
        } else {
            samples
        };

        info!("Processing {} samples", samples.len());

        let mut messages = Vec::new();
        for &sample in samples {
            match self.trace.as_mut() {
                Some(writer) => {
                    let trace = self.modem.decode_process_sample_traced(sample);
                    serde_json::to_writer(&mut *writer, &trace)?;
                    writeln!(writer)?;
                }
                None => self.modem.decode_process_sample(sample),
            }

            if let Some(message) = self.modem.receive_message() {
                debug!("Received message of {} bytes", message.len());
                messages.push(message);
            }
        }

        if let Some(writer) = self.trace.as_mut() {
            writer.flush()?;
        }

        let dropped = self.modem.demodulator().dropped_symbols();
        if dropped > 0 {
            warn!("{} received symbols were dropped", dropped);
        }

        Ok(messages)
    }

    /// Render a message for display
    pub fn format_message(&self, message: &[u8]) -> String {
        if self.config.base64 {
            STANDARD.encode(message)
        } else {
            String::from_utf8_lossy(message).into_owned()
        }
    }

    /// Write messages to the configured output file, if any
    pub fn write_messages(&self, messages: &[Vec<u8>]) -> Result<()> {
        let Some(path) = &self.config.output else {
            return Ok(());
        };

        let mut file = BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create output file: {:?}", path))?,
        );
        for message in messages {
            writeln!(file, "{}", self.format_message(message))?;
        }
        file.flush()?;
        Ok(())
    }

    /// Frame counters so far
    pub fn stats(&self) -> HdlcStats {
        self.modem.stats()
    }

    /// Drop all receive state
    pub fn reset(&mut self) -> Result<()> {
        let modem_config = self.modem.config().clone();
        self.modem.setup(modem_config)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::write_wav_file;
    use crate::common::SampleDepth;
    use tempfile::tempdir;

    fn modulate(messages: &[&[u8]]) -> Vec<Sample> {
        let mut modem = Modem::new(ModemConfig::default()).unwrap();
        let mut samples = Vec::new();
        for message in messages {
            samples.extend(std::iter::repeat(0).take(1000));
            modem.encode_message_to_samples(message).unwrap();
            samples.extend(modem.drain());
        }
        samples.extend(std::iter::repeat(0).take(1000));
        samples
    }

    #[test]
    fn test_receiver_creation() {
        let receiver = Receiver::new(RxConfig::default()).unwrap();
        assert_eq!(receiver.stats(), HdlcStats::default());
    }

    #[test]
    fn test_receive_multiple_messages() {
        let samples = modulate(&[b"one", b"two", b"three"]);
        let mut receiver = Receiver::new(RxConfig::default()).unwrap();

        let messages = receiver.receive(&samples, 8000).unwrap();
        assert_eq!(messages, vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);
        assert_eq!(receiver.stats().frames_ok, 3);
    }

    #[test]
    fn test_receive_foreign_sample_rate() {
        let samples = modulate(&[b"resampled"]);
        let upsampled = Resampler::new(8000.0, 16000.0).unwrap().process_all(&samples);

        let mut receiver = Receiver::new(RxConfig::default()).unwrap();
        let messages = receiver.receive(&upsampled, 16000).unwrap();
        assert_eq!(messages, vec![b"resampled".to_vec()]);
    }

    #[test]
    fn test_receive_file_with_output_and_trace() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.txt");
        let trace = dir.path().join("trace.jsonl");

        let samples = modulate(&[&[0x00, 0x7e, 0xff]]);
        write_wav_file(&samples, &input, 8000, SampleDepth::Bits16).unwrap();

        let config = RxConfig {
            input,
            output: Some(output.clone()),
            base64: true,
            trace: Some(trace.clone()),
            ..RxConfig::default()
        };
        let mut receiver = Receiver::new(config).unwrap();
        let messages = receiver.receive_file().unwrap();
        receiver.write_messages(&messages).unwrap();

        assert_eq!(std::fs::read_to_string(&output).unwrap(), "AH7/\n");

        let lines = std::fs::read_to_string(&trace).unwrap();
        assert_eq!(lines.lines().count(), samples.len());
        let first: serde_json::Value = serde_json::from_str(lines.lines().next().unwrap()).unwrap();
        assert!(first.get("envelope").is_some());
        assert!(first.get("samples_per_symbol").is_some());
    }

    #[test]
    fn test_silence_decodes_nothing() {
        let mut receiver = Receiver::new(RxConfig::default()).unwrap();
        let messages = receiver.receive(&vec![0; 8000], 8000).unwrap();
        assert!(messages.is_empty());
        assert_eq!(receiver.format_message(b"text"), "text");
    }

    #[test]
    fn test_reset_clears_counters() {
        let samples = modulate(&[b"count me"]);
        let mut receiver = Receiver::new(RxConfig::default()).unwrap();
        receiver.receive(&samples, 8000).unwrap();
        assert_eq!(receiver.stats().frames_ok, 1);

        receiver.reset().unwrap();
        assert_eq!(receiver.stats().frames_ok, 0);
    }
}
