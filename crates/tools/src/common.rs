//! Common utilities and configuration for tools

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use speakup_core::Sample;
use std::path::{Path, PathBuf};
use tracing::info;

/// Global configuration options
#[derive(Debug, Clone, Default, Serialize, Deserialize, Args)]
pub struct GlobalConfig {
    /// Modem profile (TOML or JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalConfig {
    /// Log level selected by the flags
    pub fn log_level(&self) -> tracing::Level {
        if self.debug {
            tracing::Level::DEBUG
        } else if self.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }
}

/// Bits per sample of written WAV files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum SampleDepth {
    #[value(name = "8")]
    #[serde(rename = "8")]
    Bits8,
    #[default]
    #[value(name = "16")]
    #[serde(rename = "16")]
    Bits16,
}

impl SampleDepth {
    pub fn bits(&self) -> u16 {
        match self {
            SampleDepth::Bits8 => 8,
            SampleDepth::Bits16 => 16,
        }
    }
}

/// Initialize logging based on configuration
pub fn init_logging(config: &GlobalConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(config.log_level())
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))
}

/// Write mono samples (16-bit full scale) to a WAV file
pub fn write_wav_file(
    samples: &[Sample],
    path: &Path,
    sample_rate: u32,
    depth: SampleDepth,
) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: depth.bits(),
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {:?}", path))?;

    for &sample in samples {
        let sample = sample.clamp(i16::MIN as Sample, i16::MAX as Sample);
        match depth {
            SampleDepth::Bits8 => writer.write_sample((sample >> 8) as i8)?,
            SampleDepth::Bits16 => writer.write_sample(sample as i16)?,
        }
    }

    writer.finalize()?;
    info!("Wrote {} samples to {:?}", samples.len(), path);
    Ok(())
}

/// Read a WAV file as 16-bit full-scale samples, mixing channels down to mono
///
/// Returns the samples and the file's sample rate.
pub fn read_wav_file(path: &Path) -> Result<(Vec<Sample>, u32)> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {:?}", path))?;
    let spec = reader.spec();

    let interleaved: Vec<Sample> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let shift = spec.bits_per_sample as i32 - 16;
            reader
                .samples::<i32>()
                .map(|s| {
                    s.map(|s| {
                        if shift >= 0 {
                            s >> shift
                        } else {
                            s << -shift
                        }
                    })
                })
                .collect::<Result<_, _>>()
                .with_context(|| "Failed to read audio samples")?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as Sample))
            .collect::<Result<_, _>>()
            .with_context(|| "Failed to read audio samples")?,
    };

    let channels = spec.channels.max(1) as usize;
    let samples = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<Sample>() / frame.len() as Sample)
        .collect::<Vec<_>>();

    info!(
        "Read {} samples at {} Hz from {:?}",
        samples.len(),
        spec.sample_rate,
        path
    );
    Ok((samples, spec.sample_rate))
}

/// Number of samples in `millis` milliseconds
pub fn silence_len(millis: u32, sample_rate: u32) -> usize {
    (millis as u64 * sample_rate as u64 / 1000) as usize
}

/// Add uniform noise of at most `amplitude` to every sample
pub fn add_noise(samples: &mut [Sample], amplitude: Sample, seed: Option<u64>) {
    if amplitude <= 0 {
        return;
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    for sample in samples.iter_mut() {
        *sample = sample.saturating_add(rng.gen_range(-amplitude..=amplitude));
    }
}

/// Load configuration from file
pub fn load_config<T: for<'a> Deserialize<'a>>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    if path.extension().and_then(|s| s.to_str()) == Some("json") {
        return serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON config: {:?}", path));
    }

    toml::from_str(&content).with_context(|| format!("Failed to parse TOML config: {:?}", path))
}

/// Save configuration to file
pub fn save_config<T: Serialize>(config: &T, path: &Path) -> Result<()> {
    let content = if path.extension().and_then(|s| s.to_str()) == Some("json") {
        serde_json::to_string_pretty(config)?
    } else {
        toml::to_string_pretty(config)?
    };

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;
    Ok(())
}
