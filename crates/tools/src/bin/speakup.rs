//! SpeakUp - acoustic FSK modem tool

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use speakup_modem::prelude::*;
use speakup_tools::common::{init_logging, save_config, write_wav_file, SampleDepth};
use speakup_tools::{run_loopback, GlobalConfig, ModemArgs, Receiver, RxConfig, Transmitter, TxConfig};

#[derive(Parser)]
#[command(name = "speakup")]
#[command(about = "SpeakUp acoustic FSK modem")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a message as a WAV file
    Tx(TxConfig),

    /// Decode messages from a WAV file
    Rx(RxConfig),

    /// Send a message through a simulated channel and decode it
    Loopback(LoopbackArgs),

    /// Show the resolved modem profile
    Info(InfoArgs),
}

#[derive(Args)]
struct LoopbackArgs {
    #[command(flatten)]
    global: GlobalConfig,

    #[command(flatten)]
    modem: ModemArgs,

    /// Message text
    #[arg(short, long, default_value = "Hello SpeakUp!")]
    text: String,

    /// Peak amplitude of uniform channel noise
    #[arg(long, default_value = "0")]
    noise: Sample,

    /// Noise seed for repeatable runs
    #[arg(long)]
    seed: Option<u64>,

    /// Save the channel audio
    #[arg(long)]
    save: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct InfoArgs {
    #[command(flatten)]
    global: GlobalConfig,

    #[command(flatten)]
    modem: ModemArgs,

    /// Write the resolved profile to a TOML or JSON file
    #[arg(long)]
    save: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Tx(config) => {
            init_logging(&config.global)?;
            let mut transmitter = Transmitter::new(config.clone())?;
            let samples = transmitter.transmit()?;
            transmitter.write(&samples)?;
            println!("✓ Wrote {} samples to {}", samples.len(), config.output.display());
        }
        Commands::Rx(config) => {
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
        }
        Commands::Loopback(args) => loopback(args)?,
        Commands::Info(args) => show_info(args)?,
    }

    Ok(())
}

fn loopback(args: LoopbackArgs) -> Result<()> {
    init_logging(&args.global)?;
    let config = args.modem.resolve(&args.global)?;

    let (report, channel) = run_loopback(&config, args.text.as_bytes(), args.noise, args.seed)?;

    if let Some(path) = &args.save {
        write_wav_file(&channel, path, config.sample_rate, SampleDepth::Bits16)?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.is_success() {
        println!("✓ Loopback OK: {:?}", args.text);
    } else {
        let received = report
            .received
            .as_deref()
            .map(|m| String::from_utf8_lossy(m).into_owned());
        println!("✗ Loopback failed, received {:?}", received);
        println!(
            "  {} frame(s), {} CRC error(s), {} overflow(s)",
            report.stats.frames_ok, report.stats.crc_errors, report.stats.overflows
        );
    }

    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn show_info(args: InfoArgs) -> Result<()> {
    init_logging(&args.global)?;
    let config = args.modem.resolve(&args.global)?;

    let sps = config.samples_per_symbol();
    let coding = if config.manchester { "Manchester" } else { "NRZ" };

    println!("SpeakUp modem profile");
    println!("=====================");
    println!("Sample rate:        {} Hz", config.sample_rate);
    println!("Symbol rate:        {} baud ({})", config.symbol_rate, coding);
    println!("Samples per symbol: {}", sps);
    println!("High tone:          {} Hz", config.freq_high);
    println!("Low tone:           {} Hz", config.freq_low);
    println!("Preamble:           {} symbols", config.preamble_len);
    println!("Postamble:          {} symbols", config.postamble_len);
    println!(
        "Queues:             {} tx / {} rx symbols",
        config.tx_queue_capacity, config.rx_queue_capacity
    );
    println!(
        "Framing:            {}, {}-endian CRC, max {} bytes",
        if config.hdlc.bitwise { "bit stuffed" } else { "byte escaped" },
        if config.hdlc.big_endian_crc { "big" } else { "little" },
        config.hdlc.max_frame_len
    );

    // Flags and CRC take 32 bits, stuffing adds at most one bit in five
    let frame_bits = config
        .tx_queue_capacity
        .saturating_sub(config.preamble_len + config.postamble_len + 32);
    println!("Longest message:    ~{} bytes", frame_bits / 10);

    if let Some(path) = &args.save {
        save_config(&config, path)?;
        println!("✓ Profile saved to {}", path.display());
    }

    Ok(())
}
