//! SpeakUp TX - encode a message as FSK audio

use anyhow::Result;
use clap::Parser;
use speakup_tools::common::init_logging;
use speakup_tools::{Transmitter, TxConfig};

fn main() -> Result<()> {
    let config = TxConfig::parse();
    init_logging(&config.global)?;

    let output = config.output.clone();
    let mut transmitter = Transmitter::new(config)?;
    let samples = transmitter.transmit()?;
    transmitter.write(&samples)?;

    println!(
        "✓ Wrote {} samples ({:.2} s) to {}",
        samples.len(),
        samples.len() as f64 / transmitter.modem_config().sample_rate as f64,
        output.display()
    );
    Ok(())
}
