//! SpeakUp Tools library

pub mod common;
pub mod config;
pub mod loopback;
pub mod rx;
pub mod tx;

pub use common::{GlobalConfig, SampleDepth};
pub use config::ModemArgs;
pub use loopback::{run_loopback, LoopbackReport};
pub use rx::{Receiver, RxConfig};
pub use tx::{Transmitter, TxConfig};
