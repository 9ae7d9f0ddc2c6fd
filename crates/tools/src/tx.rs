//! Transmitter configuration and implementation

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use speakup_modem::prelude::*;

use crate::common::{silence_len, write_wav_file, GlobalConfig, SampleDepth};
use crate::config::ModemArgs;

/// Transmitter configuration
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(about = "SpeakUp transmitter: encode a message as a WAV file")]
pub struct TxConfig {
    #[command(flatten)]
    pub global: GlobalConfig,

    #[command(flatten)]
    pub modem: ModemArgs,

    /// Output WAV file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Message text to transmit
    #[arg(short, long, conflicts_with = "file")]
    pub text: Option<String>,

    /// Read the message from a file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// The message is base64 encoded
    #[arg(long)]
    pub base64: bool,

    /// Bits per output sample
    #[arg(long, value_enum, default_value = "16")]
    pub bits: SampleDepth,

    /// Number of times to send the message
    #[arg(long, default_value = "1")]
    pub repeat: usize,

    /// Silence before each transmission in milliseconds
    #[arg(long, default_value = "250")]
    pub lead_silence_ms: u32,

    /// Silence after the last transmission in milliseconds
    #[arg(long, default_value = "250")]
    pub tail_silence_ms: u32,
}

impl Default for TxConfig {
    fn default() -> Self {
        Self {
            global: GlobalConfig::default(),
            modem: ModemArgs::default(),
            output: PathBuf::from("message.wav"),
            text: None,
            file: None,
            base64: false,
            bits: SampleDepth::Bits16,
            repeat: 1,
            lead_silence_ms: 250,
            tail_silence_ms: 250,
        }
    }
}

/// SpeakUp transmitter
pub struct Transmitter {
    config: TxConfig,
    modem: Modem,
}

impl Transmitter {
    /// Create a new transmitter with the given configuration
    pub fn new(config: TxConfig) -> Result<Self> {
        if config.text.is_none() && config.file.is_none() {
            anyhow::bail!("Either text or file must be specified");
        }

        let modem_config = config.modem.resolve(&config.global)?;
        let modem = Modem::new(modem_config)?;

        Ok(Self { config, modem })
    }

    pub fn modem_config(&self) -> &ModemConfig {
        self.modem.config()
    }

    /// The payload bytes to send
    pub fn payload(&self) -> Result<Vec<u8>> {
        let raw = if let Some(text) = &self.config.text {
            text.as_bytes().to_vec()
        } else if let Some(file) = &self.config.file {
            std::fs::read(file).with_context(|| format!("Failed to read message file: {:?}", file))?
        } else {
            anyhow::bail!("No input specified");
        };

        if !self.config.base64 {
            return Ok(raw);
        }

        let encoded = String::from_utf8(raw).context("Base64 input is not valid text")?;
        STANDARD
            .decode(encoded.trim())
            .context("Failed to decode base64 input")
    }

    /// Modulate the configured message into audio samples
    pub fn transmit(&mut self) -> Result<Vec<Sample>> {
        let payload = self.payload()?;
        let sample_rate = self.modem.config().sample_rate;
        let lead = silence_len(self.config.lead_silence_ms, sample_rate);

        info!(
            "Transmitting {} bytes {} time(s)",
            payload.len(),
            self.config.repeat
        );

        let mut samples = Vec::new();
        for _ in 0..self.config.repeat {
            samples.extend(std::iter::repeat(0).take(lead));
            self.modem.encode_message_to_samples(&payload)?;
            samples.extend(self.modem.drain());
        }
        samples.extend(std::iter::repeat(0).take(silence_len(self.config.tail_silence_ms, sample_rate)));

        info!(
            "Generated {} samples ({:.2} s)",
            samples.len(),
            samples.len() as f64 / sample_rate as f64
        );
        Ok(samples)
    }

    /// Write samples to the configured output file
    pub fn write(&self, samples: &[Sample]) -> Result<()> {
        write_wav_file(
            samples,
            &self.config.output,
            self.modem.config().sample_rate,
            self.config.bits,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn text_config(text: &str) -> TxConfig {
        TxConfig {
            text: Some(text.to_string()),
            ..TxConfig::default()
        }
    }

    #[test]
    fn test_requires_input() {
        assert!(Transmitter::new(TxConfig::default()).is_err());
    }

    #[test]
    fn test_transmit_adds_silence() {
        let mut tx = Transmitter::new(text_config("hi")).unwrap();
        let samples = tx.transmit().unwrap();

        assert!(samples[..2000].iter().all(|&s| s == 0));
        assert!(samples[samples.len() - 2000..].iter().all(|&s| s == 0));
        assert!(samples[2000..samples.len() - 2000].iter().any(|&s| s != 0));
        assert_eq!((samples.len() - 4000) % 80, 0);
    }

    #[test]
    fn test_repeat_sends_message_again() {
        let mut once = Transmitter::new(text_config("hi")).unwrap();
        let mut twice = Transmitter::new(TxConfig {
            repeat: 2,
            ..text_config("hi")
        })
        .unwrap();

        let once = once.transmit().unwrap().len() - 2000;
        let twice = twice.transmit().unwrap().len() - 2000;
        assert_eq!(twice, 2 * once);
    }

    #[test]
    fn test_base64_payload() {
        let tx = Transmitter::new(TxConfig {
            base64: true,
            ..text_config("AAF+/w==\n")
        })
        .unwrap();
        assert_eq!(tx.payload().unwrap(), vec![0x00, 0x01, 0x7e, 0xff]);

        let bad = Transmitter::new(TxConfig {
            base64: true,
            ..text_config("not base64!")
        })
        .unwrap();
        assert!(bad.payload().is_err());
    }

    #[test]
    fn test_file_payload_and_wav_output() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("message.bin");
        std::fs::write(&input, [1u8, 2, 3]).unwrap();

        let config = TxConfig {
            file: Some(input),
            output: dir.path().join("out.wav"),
            bits: SampleDepth::Bits8,
            ..TxConfig::default()
        };
        let mut tx = Transmitter::new(config.clone()).unwrap();
        assert_eq!(tx.payload().unwrap(), vec![1, 2, 3]);

        let samples = tx.transmit().unwrap();
        tx.write(&samples).unwrap();

        let reader = hound::WavReader::open(&config.output).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 8);
        assert_eq!(reader.spec().sample_rate, 8000);
        assert_eq!(reader.len() as usize, samples.len());
    }
}
