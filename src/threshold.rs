//! Debounced threshold comparators driving the digital outputs.
//!
//! Each output line can be bound to one analog channel. Every conversion the bound sample is
//! compared against the line's threshold (`sample >= threshold` counts as above). A run of
//! `up_samples + 1` consecutive samples above the threshold drives the line high, a run of
//! `down_samples + 1` consecutive samples below drives it low. A single contrary sample
//! cancels any progress in the other direction.
//!
//! The engine holds no hardware: [`ThresholdEngine::evaluate`] takes the current samples,
//! bindings and output levels, and returns the new levels plus which lines changed. The whole
//! pass is a fixed four iterations with no allocation, so it fits inside the BUSY interrupt.

use crate::{
    output::OutputLine,
    registers::{RegisterError, CHANNELS, OUTPUTS},
};

/// Register encoding of an unbound threshold
pub const CHANNEL_UNUSED: u8 = 8;

/// Analog input channel, 0 to 3
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channel(u8);

impl Channel {
    /// Channel number `index`, if it exists
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < CHANNELS {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Position of the channel in the sample array
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Decode a `DOn_CH` register value. [`CHANNEL_UNUSED`] unbinds the line.
pub fn decode_source(value: u8) -> Result<Option<Channel>, RegisterError> {
    if value == CHANNEL_UNUSED {
        return Ok(None);
    }
    Channel::new(value)
        .map(Some)
        .ok_or(RegisterError::InvalidValue)
}

/// Encode a binding source back to its `DOn_CH` register value
pub fn encode_source(source: Option<Channel>) -> u8 {
    source.map_or(CHANNEL_UNUSED, |channel| channel.0)
}

/// Configuration of one output line's comparator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThresholdBinding {
    /// Channel feeding the comparator, `None` when the line is not threshold-driven
    pub source: Option<Channel>,
    /// Samples at or above this value count as above the threshold
    pub threshold: i16,
    /// Extra consecutive samples above the threshold required to set the line
    pub up_samples: u16,
    /// Extra consecutive samples below the threshold required to clear the line
    pub down_samples: u16,
}

impl ThresholdBinding {
    /// Reset configuration: unbound, threshold 0, one extra sample each way
    pub const DEFAULT: Self = Self {
        source: None,
        threshold: 0,
        up_samples: 1,
        down_samples: 1,
    };
}

impl Default for ThresholdBinding {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Consecutive-sample counters of one comparator. At most one of them is non-zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Debounce {
    /// Consecutive samples at or above the threshold, clamped at `up_samples + 1`
    up: u32,
    /// Consecutive samples below the threshold, clamped at `down_samples + 1`
    down: u32,
}

impl Debounce {
    /// Current `(up, down)` counts
    pub fn counts(&self) -> (u32, u32) {
        (self.up, self.down)
    }

    /// Feed one comparison. Returns the level to drive when a debounce run completes.
    fn step(&mut self, above: bool, binding: &ThresholdBinding) -> Option<bool> {
        let (active, opposite, target) = if above {
            (&mut self.up, &mut self.down, binding.up_samples)
        } else {
            (&mut self.down, &mut self.up, binding.down_samples)
        };
        *opposite = 0;

        let fire_at = u32::from(target) + 1;
        if *active < fire_at {
            *active += 1;
            if *active == fire_at {
                return Some(above);
            }
        }
        None
    }
}

/// Result of one threshold pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThresholdUpdate {
    /// Output levels after the pass, one bit per [`OutputLine`]
    pub levels: u8,
    /// Lines whose debounce run completed during this pass
    pub changed: u8,
    /// Lines the comparators own: bound, and not DO0 while it toggles each second
    pub owned: u8,
}

impl ThresholdUpdate {
    /// Whether any line changed
    pub fn any_changed(&self) -> bool {
        self.changed != 0
    }

    /// Value of the `THRESHOLDS` register: levels of the owned lines in bits 0..3, changed
    /// flags in bits 4..7
    pub fn status(&self) -> u8 {
        (self.levels & self.owned & 0x0F) | (self.changed << 4)
    }
}

/// Debounce state for all four output lines
#[derive(Debug, Default)]
pub struct ThresholdEngine {
    /// Counters per output line
    debounce: [Debounce; OUTPUTS],
}

impl ThresholdEngine {
    /// Engine with all counters at zero
    pub const fn new() -> Self {
        Self {
            debounce: [Debounce { up: 0, down: 0 }; OUTPUTS],
        }
    }

    /// Counters of `line`
    pub fn debounce(&self, line: OutputLine) -> Debounce {
        self.debounce[line.index()]
    }

    /// Forget all debounce progress
    pub fn clear(&mut self) {
        self.debounce = [Debounce::default(); OUTPUTS];
    }

    /// Run every comparator once over `samples`.
    ///
    /// `levels` are the current output levels. Unbound lines, and DO0 when `skip_do0` is set
    /// (DO0 is then owned by the toggle-each-second timer), are left exactly as they are.
    pub fn evaluate(
        &mut self,
        samples: &[i16; CHANNELS],
        bindings: &[ThresholdBinding; OUTPUTS],
        skip_do0: bool,
        levels: u8,
    ) -> ThresholdUpdate {
        let mut update = ThresholdUpdate {
            levels,
            changed: 0,
            owned: 0,
        };

        for ((line, binding), debounce) in OutputLine::ALL
            .into_iter()
            .zip(bindings)
            .zip(self.debounce.iter_mut())
        {
            let Some(channel) = binding.source else {
                continue;
            };
            if skip_do0 && line == OutputLine::Do0 {
                continue;
            }

            update.owned |= line.mask();

            let above = samples[channel.index()] >= binding.threshold;
            if let Some(high) = debounce.step(above, binding) {
                if high {
                    update.levels |= line.mask();
                } else {
                    update.levels &= !line.mask();
                }
                update.changed |= line.mask();
            }
        }

        update
    }
}
