//! SpeakUp RX - decode messages from FSK audio

use anyhow::Result;
use clap::Parser;
use speakup_tools::common::init_logging;
use speakup_tools::{Receiver, RxConfig};

fn main() -> Result<()> {
    let config = RxConfig::parse();
    init_logging(&config.global)?;

    let mut receiver = Receiver::new(config)?;
    let messages = receiver.receive_file()?;

    for message in &messages {
        println!("{}", receiver.format_message(message));
    }
    receiver.write_messages(&messages)?;

    let stats = receiver.stats();
    eprintln!(
        "✓ {} message(s), {} CRC error(s), {} overflow(s)",
        stats.frames_ok, stats.crc_errors, stats.overflows
    );
    Ok(())
}
