//! HDLC-style framing, byte-oriented and bit-oriented
//!
//! Wire format: `0x7E`, escaped payload, escaped CRC-16 (byte order per
//! config), `0x7E`. Any `0x7E` or `0x7D` inside the frame is sent as `0x7D`
//! followed by the byte XOR `0x20`. In bit-oriented mode every octet goes
//! out LSB first and a zero is stuffed after five consecutive ones, except
//! within the boundary octets themselves.
//!
//! There is no flow control, no addressing and no multi-frame windowing.

use crate::crc::{crc16_update, CRC16_CCITT_INIT};
use crate::{FrameError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Frame boundary flag
pub const FRAME_BOUNDARY_OCTET: u8 = 0x7E;

/// Control escape
pub const CONTROL_ESCAPE_OCTET: u8 = 0x7D;

/// XOR applied to the octet following an escape
pub const ESCAPE_XOR: u8 = 0x20;

/// Default maximum received frame length, CRC included
pub const DEFAULT_MAX_FRAME_LEN: usize = 5000;

/// Destination for encoded output
///
/// Receives single bits (0/1) in bit-oriented mode, whole octets otherwise.
pub trait OutputSink {
    fn put(&mut self, unit: u8);
}

impl OutputSink for Vec<u8> {
    fn put(&mut self, unit: u8) {
        self.push(unit);
    }
}

/// Consumer of validated received payloads (CRC already stripped)
pub trait FrameHandler {
    fn on_frame(&mut self, frame: Vec<u8>);
}

impl FrameHandler for Vec<Vec<u8>> {
    fn on_frame(&mut self, frame: Vec<u8>) {
        self.push(frame);
    }
}

/// Framing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HdlcConfig {
    /// Bit-oriented (with bit stuffing) rather than byte-oriented output
    pub bitwise: bool,
    /// Send the CRC high byte first
    pub big_endian_crc: bool,
    /// Longest frame accepted on receive, CRC bytes included
    pub max_frame_len: usize,
}

impl Default for HdlcConfig {
    fn default() -> Self {
        Self {
            bitwise: true,
            big_endian_crc: true,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl HdlcConfig {
    /// Byte-oriented framing with otherwise default settings
    pub fn bytewise() -> Self {
        Self {
            bitwise: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_frame_len < 2 {
            return Err(FrameError::InvalidParameters {
                msg: format!(
                    "Maximum frame length must hold at least the CRC: {}",
                    self.max_frame_len
                ),
            });
        }
        Ok(())
    }
}

/// Receive-side counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HdlcStats {
    pub frames_ok: u64,
    pub crc_errors: u64,
    pub overflows: u64,
}

/// HDLC-style frame encoder and decoder
///
/// Output and delivery go through the sink passed to each call, so the
/// codec itself holds no reference to the modulator or the application.
#[derive(Debug, Clone)]
pub struct Hdlc {
    config: HdlcConfig,

    // Byte-wise receive state
    frame: Vec<u8>,
    frame_crc: u16,
    in_escape: bool,
    overflowed: bool,

    // Bit-wise receive state
    rx_last8: u8,
    rx_byte: u8,
    rx_bit_count: u8,

    // Bit-wise send state
    tx_ones: u8,

    stats: HdlcStats,
}

impl Hdlc {
    /// Create a new codec
    pub fn new(config: HdlcConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            frame: Vec::with_capacity(config.max_frame_len),
            config,
            frame_crc: CRC16_CCITT_INIT,
            in_escape: false,
            overflowed: false,
            rx_last8: 0,
            rx_byte: 0,
            rx_bit_count: 0,
            tx_ones: 0,
            stats: HdlcStats::default(),
        })
    }

    pub fn config(&self) -> &HdlcConfig {
        &self.config
    }

    pub fn stats(&self) -> HdlcStats {
        self.stats
    }

    /// Drop any partially received frame and bit alignment
    pub fn reset(&mut self) {
        self.start_new_frame();
        self.rx_last8 = 0;
        self.rx_byte = 0;
        self.rx_bit_count = 0;
        self.tx_ones = 0;
    }

    /// Wrap `payload` in a frame and push it to `sink`
    pub fn send_frame<S>(&mut self, payload: &[u8], sink: &mut S)
    where
        S: OutputSink + ?Sized,
    {
        let mut fcs = CRC16_CCITT_INIT;

        self.send_boundary(sink);

        for &byte in payload {
            fcs = crc16_update(fcs, byte);
            self.send_escaped(byte, sink);
        }

        let [first, second] = if self.config.big_endian_crc {
            fcs.to_be_bytes()
        } else {
            fcs.to_le_bytes()
        };
        self.send_escaped(first, sink);
        self.send_escaped(second, sink);

        self.send_boundary(sink);
    }

    /// Encode a frame into a fresh buffer of output units
    pub fn encode_frame(&mut self, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(payload.len() + payload.len() / 4 + 8);
        self.send_frame(payload, &mut out);
        out
    }

    /// Feed one received bit (bit-oriented mode)
    pub fn handle_bit<H>(&mut self, bit: u8, handler: &mut H)
    where
        H: FrameHandler + ?Sized,
    {
        let bit = bit & 1;
        self.rx_last8 = (self.rx_last8 >> 1) | (bit << 7);

        if self.rx_last8 == FRAME_BOUNDARY_OCTET {
            self.handle_byte(FRAME_BOUNDARY_OCTET, handler);
            self.rx_byte = 0;
            self.rx_bit_count = 0;
            return;
        }

        // A zero straight after five ones was stuffed by the sender
        if self.rx_last8 & 0xfc == 0x7c {
            return;
        }

        self.rx_byte = (self.rx_byte >> 1) | (bit << 7);
        self.rx_bit_count += 1;
        if self.rx_bit_count == 8 {
            let byte = self.rx_byte;
            self.rx_byte = 0;
            self.rx_bit_count = 0;
            self.handle_byte(byte, handler);
        }
    }

    /// Feed one received octet (byte-oriented mode, or de-stuffed bits)
    pub fn handle_byte<H>(&mut self, ch: u8, handler: &mut H)
    where
        H: FrameHandler + ?Sized,
    {
        if ch == FRAME_BOUNDARY_OCTET {
            self.end_of_frame(handler);
            return;
        }

        if self.overflowed {
            return;
        }

        let ch = if self.in_escape {
            self.in_escape = false;
            ch ^ ESCAPE_XOR
        } else if ch == CONTROL_ESCAPE_OCTET {
            self.in_escape = true;
            return;
        } else {
            ch
        };

        if self.frame.len() >= self.config.max_frame_len {
            debug!(
                "Discarding frame longer than {} bytes",
                self.config.max_frame_len
            );
            self.stats.overflows += 1;
            self.start_new_frame();
            self.overflowed = true;
            return;
        }

        self.frame.push(ch);

        // The newest two bytes may be the trailing CRC, so fold in lagging by two
        let len = self.frame.len();
        if len >= 3 {
            self.frame_crc = crc16_update(self.frame_crc, self.frame[len - 3]);
        }
    }

    fn end_of_frame<H>(&mut self, handler: &mut H)
    where
        H: FrameHandler + ?Sized,
    {
        let len = self.frame.len();
        if !self.overflowed && len >= 2 {
            let tail = [self.frame[len - 2], self.frame[len - 1]];
            let rx_crc = if self.config.big_endian_crc {
                u16::from_be_bytes(tail)
            } else {
                u16::from_le_bytes(tail)
            };

            if rx_crc == self.frame_crc {
                self.stats.frames_ok += 1;
                let mut frame = std::mem::replace(
                    &mut self.frame,
                    Vec::with_capacity(self.config.max_frame_len),
                );
                frame.truncate(len - 2);
                handler.on_frame(frame);
            } else {
                debug!(
                    "Frame CRC mismatch: received {:04x}, computed {:04x}, {} bytes",
                    rx_crc,
                    self.frame_crc,
                    len - 2
                );
                self.stats.crc_errors += 1;
            }
        }

        self.start_new_frame();
    }

    fn start_new_frame(&mut self) {
        self.frame.clear();
        self.frame_crc = CRC16_CCITT_INIT;
        self.in_escape = false;
        self.overflowed = false;
    }

    fn send_boundary<S>(&mut self, sink: &mut S)
    where
        S: OutputSink + ?Sized,
    {
        if self.config.bitwise {
            for i in 0..8 {
                sink.put((FRAME_BOUNDARY_OCTET >> i) & 1);
            }
            // The flag ends in a zero
            self.tx_ones = 0;
        } else {
            sink.put(FRAME_BOUNDARY_OCTET);
        }
    }

    fn send_stuffed<S>(&mut self, octet: u8, sink: &mut S)
    where
        S: OutputSink + ?Sized,
    {
        if !self.config.bitwise {
            sink.put(octet);
            return;
        }

        for i in 0..8 {
            let bit = (octet >> i) & 1;
            sink.put(bit);
            if bit == 1 {
                self.tx_ones += 1;
                if self.tx_ones == 5 {
                    sink.put(0);
                    self.tx_ones = 0;
                }
            } else {
                self.tx_ones = 0;
            }
        }
    }

    fn send_escaped<S>(&mut self, octet: u8, sink: &mut S)
    where
        S: OutputSink + ?Sized,
    {
        if octet == FRAME_BOUNDARY_OCTET || octet == CONTROL_ESCAPE_OCTET {
            self.send_stuffed(CONTROL_ESCAPE_OCTET, sink);
            self.send_stuffed(octet ^ ESCAPE_XOR, sink);
        } else {
            self.send_stuffed(octet, sink);
        }
    }
}
