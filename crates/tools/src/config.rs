//! Modem profile resolution for the SpeakUp tools
//!
//! A profile file (`--config`) is loaded first, then any command line
//! overrides are applied on top and the result is validated.

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use speakup_modem::common::ModemConfig;
use tracing::debug;

use crate::common::{load_config, GlobalConfig};

/// Command line overrides for the modem profile
#[derive(Debug, Clone, Default, Serialize, Deserialize, Args)]
pub struct ModemArgs {
    /// Modem sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Symbol rate in baud
    #[arg(long)]
    pub symbol_rate: Option<u32>,

    /// High tone in Hz
    #[arg(long)]
    pub freq_high: Option<u32>,

    /// Low tone in Hz
    #[arg(long)]
    pub freq_low: Option<u32>,

    /// Send plain NRZ symbols instead of Manchester pairs
    #[arg(long)]
    pub nrz: bool,

    /// Preamble length in symbols
    #[arg(long)]
    pub preamble: Option<usize>,

    /// Postamble length in symbols
    #[arg(long)]
    pub postamble: Option<usize>,

    /// Transmit symbol queue capacity
    #[arg(long)]
    pub tx_queue: Option<usize>,

    /// Receive symbol queue capacity
    #[arg(long)]
    pub rx_queue: Option<usize>,
}

impl ModemArgs {
    /// Apply the overrides to `config`
    pub fn apply(&self, mut config: ModemConfig) -> ModemConfig {
        if let Some(rate) = self.sample_rate {
            config.sample_rate = rate;
        }
        if let Some(rate) = self.symbol_rate {
            config.symbol_rate = rate;
        }
        if let Some(freq) = self.freq_high {
            config.freq_high = freq;
        }
        if let Some(freq) = self.freq_low {
            config.freq_low = freq;
        }
        if self.nrz {
            config.manchester = false;
        }
        if let Some(len) = self.preamble {
            config.preamble_len = len;
        }
        if let Some(len) = self.postamble {
            config.postamble_len = len;
        }
        if let Some(capacity) = self.tx_queue {
            config.tx_queue_capacity = capacity;
        }
        if let Some(capacity) = self.rx_queue {
            config.rx_queue_capacity = capacity;
        }
        config
    }

    /// Load the profile named by `global` (or the defaults) and apply the overrides
    pub fn resolve(&self, global: &GlobalConfig) -> Result<ModemConfig> {
        let base = match &global.config {
            Some(path) => {
                debug!("Loading modem profile from {:?}", path);
                load_config::<ModemConfig>(path)?
            }
            None => ModemConfig::default(),
        };

        let config = self.apply(base);
        config.validate().context("Invalid modem configuration")?;
        Ok(config)
    }
}
