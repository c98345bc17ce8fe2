//! Digital output lines and the secondary timing behaviour of DO0.

use crate::registers::Do0Mode;

/// Number of scheduler ticks (500 µs each) in one second
pub const TICKS_PER_SECOND: u16 = 2000;

/// One of the four digital output lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputLine {
    /// DO0, also used for the toggle-each-second and timed pulse modes
    Do0,
    /// DO1
    Do1,
    /// DO2
    Do2,
    /// DO3
    Do3,
}

impl OutputLine {
    /// All lines, in bit order
    pub const ALL: [OutputLine; 4] = [Self::Do0, Self::Do1, Self::Do2, Self::Do3];

    /// Position of the line in output arrays and bitmasks
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Bit of the line in the `DO_*` and `THRESHOLDS` registers
    pub const fn mask(self) -> u8 {
        1 << self.index()
    }

    /// Line at `index`, if there is one
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Lines whose bit is set in `mask`
    pub fn in_mask(mask: u8) -> impl Iterator<Item = OutputLine> {
        Self::ALL
            .into_iter()
            .filter(move |line| mask & line.mask() != 0)
    }
}

/// Tick-driven state for DO0: the once-per-second toggle and the one-shot pulse countdown.
///
/// Only one of the two is ever acting on the line, selected by [`Do0Mode`].
#[derive(Debug, Default)]
pub struct Do0Timer {
    /// Scheduler ticks since the last new-second boundary
    ticks: u16,
    /// Millisecond ticks left before a pulse ends, zero when no pulse is running
    pulse_remaining: u8,
}

impl Do0Timer {
    /// Create an idle timer
    pub const fn new() -> Self {
        Self {
            ticks: 0,
            pulse_remaining: 0,
        }
    }

    /// Count one scheduler tick. Returns `true` when DO0 must be flipped now.
    pub fn count_tick(&mut self, mode: Do0Mode, acquiring: bool) -> bool {
        self.ticks = self.ticks.saturating_add(1);
        self.ticks == TICKS_PER_SECOND && acquiring && mode == Do0Mode::ToggleEachSecond
    }

    /// Restart the tick count at a new-second boundary
    pub fn new_second(&mut self) {
        self.ticks = 0;
    }

    /// Start (or restart) a pulse lasting `duration` millisecond ticks
    pub fn arm_pulse(&mut self, duration: u8) {
        self.pulse_remaining = duration;
    }

    /// Whether a pulse is currently counting down
    pub fn pulse_active(&self) -> bool {
        self.pulse_remaining != 0
    }

    /// Advance the pulse countdown by one millisecond tick. Returns `true` when DO0 must be
    /// cleared now.
    pub fn pulse_tick(&mut self, mode: Do0Mode) -> bool {
        if self.pulse_remaining == 0 {
            return false;
        }
        self.pulse_remaining -= 1;
        self.pulse_remaining == 0 && mode == Do0Mode::Pulse
    }
}
