//! Symbol clock recovery from logic-level transitions
//!
//! With Manchester coding every symbol has a transition at its centre and
//! only some have one at their edge. Transitions one whole symbol apart
//! are therefore centre-to-centre, and they alone are used to estimate
//! where the symbol edge falls. A transition is reported as a data sample
//! point when it lands in the middle part of the symbol period relative to
//! that estimate.
//!
//! Without Manchester coding the edge is re-anchored on every transition
//! and the mid-symbol sample of each period is reported.

use crate::{ModemError, Result};
use serde::{Deserialize, Serialize};
use speakup_core::queue::BoundedQueue;
use tracing::{debug, trace};

/// Manchester data never goes this many symbols without a transition
const MAX_GAP_SYMBOLS: u32 = 2;

/// Clock recovery tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockRecoveryConfig {
    /// Accepted centre-to-centre intervals to average over
    pub history_len: usize,
    /// Shortest accepted interval as a fraction of a symbol
    pub tolerance_min: f64,
    /// Longest accepted interval as a fraction of a symbol
    pub tolerance_max: f64,
    /// Start of the centre window as a fraction of a symbol
    pub centre_min: f64,
    /// End of the centre window as a fraction of a symbol
    pub centre_max: f64,
}

impl Default for ClockRecoveryConfig {
    fn default() -> Self {
        Self {
            history_len: 5,
            tolerance_min: 0.9,
            tolerance_max: 1.1,
            centre_min: 0.25,
            centre_max: 0.75,
        }
    }
}

impl ClockRecoveryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.history_len == 0 {
            return Err(ModemError::InvalidParameters {
                msg: "Clock history must hold at least one transition".to_string(),
            });
        }

        if !(self.tolerance_min > 0.0 && self.tolerance_min <= self.tolerance_max) {
            return Err(ModemError::InvalidParameters {
                msg: format!(
                    "Invalid transition tolerance window: {}..{}",
                    self.tolerance_min, self.tolerance_max
                ),
            });
        }

        if !(0.0..=1.0).contains(&self.centre_min)
            || !(0.0..=1.0).contains(&self.centre_max)
            || self.centre_min > self.centre_max
        {
            return Err(ModemError::InvalidParameters {
                msg: format!(
                    "Invalid symbol centre window: {}..{}",
                    self.centre_min, self.centre_max
                ),
            });
        }

        Ok(())
    }
}

/// Per-sample clock state, for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClockTrace {
    /// Samples since the previous transition, 0 if no transition this sample
    pub transition_interval: u32,
    pub edge_offset: Option<u32>,
    pub samples_per_symbol: u32,
    /// Mean of the accepted intervals in the history, 0 when empty
    pub mean_interval: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct TransitionRecord {
    interval: u32,
    centre_pos: u32,
}

/// Symbol timing tracker
#[derive(Debug, Clone)]
pub struct ClockRecovery {
    samples_per_symbol: u32,
    manchester: bool,

    sample_count: u32,
    last_transition: u32,
    prev_level: bool,

    history: BoundedQueue<TransitionRecord>,
    history_len: usize,
    interval_accum: u64,
    centre_accum: u64,

    interval_min: u32,
    interval_max: u32,
    centre_min: u32,
    centre_max: u32,

    edge_offset: Option<u32>,
}

impl ClockRecovery {
    /// Create a tracker for symbols `samples_per_symbol` samples long
    pub fn new(
        samples_per_symbol: u32,
        manchester: bool,
        config: &ClockRecoveryConfig,
    ) -> Result<Self> {
        config.validate()?;

        if samples_per_symbol < 2 {
            return Err(ModemError::InvalidParameters {
                msg: format!("Invalid samples per symbol: {}", samples_per_symbol),
            });
        }

        let sps = samples_per_symbol as f64;

        Ok(Self {
            samples_per_symbol,
            manchester,
            sample_count: 0,
            last_transition: 0,
            prev_level: false,
            history: BoundedQueue::new(config.history_len + 1)?,
            history_len: config.history_len,
            interval_accum: 0,
            centre_accum: 0,
            interval_min: (sps * config.tolerance_min) as u32,
            interval_max: (sps * config.tolerance_max) as u32,
            centre_min: (sps * config.centre_min) as u32,
            centre_max: (sps * config.centre_max) as u32,
            edge_offset: None,
        })
    }

    pub fn samples_per_symbol(&self) -> u32 {
        self.samples_per_symbol
    }

    /// Current symbol edge estimate, modulo the symbol length
    pub fn edge_offset(&self) -> Option<u32> {
        self.edge_offset
    }

    pub fn is_locked(&self) -> bool {
        self.edge_offset.is_some()
    }

    /// Mean accepted transition interval over the history
    pub fn mean_interval(&self) -> Option<u32> {
        let count = self.history.count() as u64;
        if count == 0 {
            return None;
        }
        Some((self.interval_accum / count) as u32)
    }

    /// Feed the next accepted logic level; true at a data sample point
    pub fn new_sample(&mut self, level: bool) -> bool {
        self.new_sample_traced(level).0
    }

    pub fn new_sample_traced(&mut self, level: bool) -> (bool, ClockTrace) {
        let mut sample_point = false;
        let mut transition_interval = 0;

        if level != self.prev_level {
            transition_interval = self.sample_count.wrapping_sub(self.last_transition);

            if self.manchester {
                if transition_interval > MAX_GAP_SYMBOLS * self.samples_per_symbol
                    && self.edge_offset.is_some()
                {
                    debug!(
                        "No transition for {} samples, re-acquiring symbol clock",
                        transition_interval
                    );
                    self.edge_offset = None;
                    self.clear_history();
                }
                self.track_transition(transition_interval);
                if let Some(edge) = self.edge_offset {
                    let pos = self.position(edge);
                    sample_point = pos >= self.centre_min && pos <= self.centre_max;
                }
            } else {
                self.edge_offset = Some(self.sample_count % self.samples_per_symbol);
            }

            self.last_transition = self.sample_count;
        }

        if !self.manchester {
            if let Some(edge) = self.edge_offset {
                sample_point = self.position(edge) == self.samples_per_symbol / 2;
            }
        }

        let trace = ClockTrace {
            transition_interval,
            edge_offset: self.edge_offset,
            samples_per_symbol: self.samples_per_symbol,
            mean_interval: self.mean_interval().unwrap_or(0),
        };

        self.prev_level = level;
        let (next, wrapped) = self.sample_count.overflowing_add(1);
        self.sample_count = next;
        if wrapped {
            // Positions are taken modulo the symbol length, which does not divide 2^32
            debug!("Sample counter wrapped, re-acquiring symbol clock");
            self.edge_offset = None;
            self.clear_history();
        }

        (sample_point, trace)
    }

    pub fn reset(&mut self) {
        self.sample_count = 0;
        self.last_transition = 0;
        self.prev_level = false;
        self.edge_offset = None;
        self.clear_history();
    }

    fn position(&self, edge: u32) -> u32 {
        let sps = self.samples_per_symbol;
        (self.sample_count % sps + sps - edge) % sps
    }

    fn track_transition(&mut self, interval: u32) {
        if interval < self.interval_min || interval > self.interval_max {
            return;
        }

        let sps = self.samples_per_symbol;
        let centre_pos = match self.edge_offset {
            Some(edge) => self.position(edge),
            None => sps / 2,
        };

        if self.history.count() >= self.history_len {
            if let Some(oldest) = self.history.get() {
                self.interval_accum -= oldest.interval as u64;
                self.centre_accum -= oldest.centre_pos as u64;
            }
        }

        let record = TransitionRecord {
            interval,
            centre_pos,
        };
        if self.history.put(record).is_err() {
            return;
        }
        self.interval_accum += interval as u64;
        self.centre_accum += centre_pos as u64;

        let now = self.sample_count % sps;
        if self.edge_offset.is_none() {
            // Take this one as a centre transition
            self.edge_offset = Some((now + (interval / 2) % sps) % sps);
        } else if self.history.count() == self.history_len {
            let mean_centre = (self.centre_accum / self.history_len as u64) as u32;
            self.edge_offset = Some((now + mean_centre % sps) % sps);
        }

        trace!(
            "Transition interval {} centre {} edge {:?}",
            interval,
            centre_pos,
            self.edge_offset
        );
    }

    fn clear_history(&mut self) {
        self.history.clear();
        self.interval_accum = 0;
        self.centre_accum = 0;
    }
}
