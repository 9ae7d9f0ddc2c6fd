//! Transmit-through-receive self test with optional channel noise

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use speakup_modem::prelude::*;

use crate::common::add_noise;

/// Outcome of one loopback run
#[derive(Debug, Clone, Serialize)]
pub struct LoopbackReport {
    pub sent: Vec<u8>,
    pub received: Option<Vec<u8>>,
    pub samples: usize,
    pub stats: HdlcStats,
    pub dropped_symbols: u64,
}

impl LoopbackReport {
    pub fn is_success(&self) -> bool {
        self.received.as_deref() == Some(&self.sent[..])
    }
}

/// Send `payload` through a fresh modem pair
///
/// `lead` and `tail` zero samples surround the transmission and uniform
/// noise of up to `noise` is added to the channel.
pub fn run_loopback(
    config: &ModemConfig,
    payload: &[u8],
    noise: Sample,
    seed: Option<u64>,
) -> Result<(LoopbackReport, Vec<Sample>)> {
    let mut tx = Modem::new(config.clone())?;
    let mut rx = Modem::new(config.clone())?;

    let padding = config.samples_per_symbol() as usize * 10;
    tx.encode_message_to_samples(payload)?;

    let mut channel = vec![0; padding];
    channel.extend(tx.drain());
    channel.extend(std::iter::repeat(0).take(padding));
    add_noise(&mut channel, noise, seed);

    info!(
        "Loopback of {} bytes over {} samples, noise {}",
        payload.len(),
        channel.len(),
        noise
    );

    let mut received = None;
    for &sample in &channel {
        rx.decode_process_sample(sample);
        if received.is_none() {
            received = rx.receive_message();
        }
    }

    let report = LoopbackReport {
        sent: payload.to_vec(),
        received,
        samples: channel.len(),
        stats: rx.stats(),
        dropped_symbols: rx.demodulator().dropped_symbols(),
    };
    Ok((report, channel))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_loopback() {
        let (report, channel) =
            run_loopback(&ModemConfig::default(), b"clean channel", 0, None).unwrap();
        assert!(report.is_success());
        assert_eq!(report.samples, channel.len());
        assert_eq!(report.stats.frames_ok, 1);
        assert_eq!(report.dropped_symbols, 0);
    }

    #[test]
    fn test_noise_is_added_to_channel() {
        let config = ModemConfig::default();
        let (_, clean) = run_loopback(&config, b"hiss", 0, None).unwrap();
        let (first, noisy) = run_loopback(&config, b"hiss", 1000, Some(42)).unwrap();
        let (second, again) = run_loopback(&config, b"hiss", 1000, Some(42)).unwrap();

        assert_eq!(clean.len(), noisy.len());
        assert_ne!(clean, noisy);
        assert_eq!(noisy, again);
        assert_eq!(first.received, second.received);
    }

    #[test]
    fn test_report_failure() {
        let report = LoopbackReport {
            sent: b"abc".to_vec(),
            received: Some(b"abd".to_vec()),
            samples: 0,
            stats: HdlcStats::default(),
            dropped_symbols: 0,
        };
        assert!(!report.is_success());
    }
}
