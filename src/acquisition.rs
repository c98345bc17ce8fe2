//! Conversion triggering and completion.
//!
//! A conversion starts by raising both convert-start lines (plus the trigger-destination
//! output, if configured, so the pulse can be observed externally). The converter raises BUSY
//! while converting; when BUSY drops, [`Acquisition::finish`] lowers exactly the lines
//! [`Acquisition::start`] raised, then drains the results over SPI.
//!
//! Only one conversion is in flight at a time. A start request while one is pending is
//! skipped. If BUSY never clears, the pending conversion is abandoned after
//! [`CONVERSION_TIMEOUT_TICKS`] scheduler ticks so acquisition can resume.

use crate::{
    components::{Board, HardwareError},
    output::OutputLine,
    registers::{InputMode, RegisterBank, SampleRate, TriggerDestination, CHANNELS},
};

/// Scheduler ticks (500 µs each) a conversion may stay in flight before it is abandoned
pub const CONVERSION_TIMEOUT_TICKS: u8 = 4;

/// Scheduler hook that is currently running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Tick {
    /// Millisecond boundary
    Millisecond,
    /// Half-way point between two millisecond boundaries
    HalfMillisecond,
}

/// Whether `tick` should start a conversion with the current configuration
pub fn tick_starts_conversion(tick: Tick, registers: &RegisterBank) -> bool {
    if !registers.acquisition_enabled() || registers.input_mode() == InputMode::RiseCatchesSample {
        return false;
    }
    match tick {
        Tick::Millisecond => true,
        Tick::HalfMillisecond => registers.sample_rate() == SampleRate::Hz2000,
    }
}

/// A conversion that has been started and not yet read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InFlight {
    /// Output line raised alongside the convert-start lines
    mirror: Option<OutputLine>,
    /// Scheduler ticks since the start
    age: u8,
}

/// Conversion bookkeeping
#[derive(Debug, Default)]
pub struct Acquisition {
    /// Pending conversion, if any
    in_flight: Option<InFlight>,
    /// Conversions started since boot
    started: u32,
    /// Conversions abandoned because BUSY never cleared
    timeouts: u32,
}

impl Acquisition {
    /// No conversion pending
    pub const fn new() -> Self {
        Self {
            in_flight: None,
            started: 0,
            timeouts: 0,
        }
    }

    /// Whether a conversion is pending
    pub fn in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Conversions started since boot
    pub fn started(&self) -> u32 {
        self.started
    }

    /// Conversions abandoned since boot
    pub fn timeouts(&self) -> u32 {
        self.timeouts
    }

    /// Raise the convert-start lines and the trigger-destination line.
    ///
    /// Returns `false` without touching the hardware if a conversion is already pending.
    pub fn start<B: Board>(
        &mut self,
        board: &mut B,
        destination: TriggerDestination,
    ) -> Result<bool, HardwareError> {
        if self.in_flight.is_some() {
            trace!("conversion still in flight, skipping trigger");
            return Ok(false);
        }

        board.set_convert_start(true)?;
        let mirror = destination.line();
        if let Some(line) = mirror {
            board.set_output(line, true)?;
        }
        self.in_flight = Some(InFlight { mirror, age: 0 });
        self.started = self.started.wrapping_add(1);
        Ok(true)
    }

    /// Count one scheduler tick against the pending conversion, abandoning it once it is
    /// [`CONVERSION_TIMEOUT_TICKS`] old. Returns `true` if it was abandoned.
    pub fn age<B: Board>(&mut self, board: &mut B) -> Result<bool, HardwareError> {
        let Some(pending) = self.in_flight.as_mut() else {
            return Ok(false);
        };
        pending.age = pending.age.saturating_add(1);
        if pending.age < CONVERSION_TIMEOUT_TICKS {
            return Ok(false);
        }

        self.timeouts = self.timeouts.wrapping_add(1);
        warn!(
            "converter still busy after {} ticks, abandoning conversion ({} so far)",
            CONVERSION_TIMEOUT_TICKS,
            self.timeouts
        );
        self.abort(board)?;
        Ok(true)
    }

    /// Complete the pending conversion: lower the lines raised by [`Acquisition::start`],
    /// then read every channel into `samples`.
    ///
    /// Returns `false` without touching the hardware if no conversion is pending.
    pub fn finish<B: Board>(
        &mut self,
        board: &mut B,
        samples: &mut [i16; CHANNELS],
    ) -> Result<bool, HardwareError> {
        if self.in_flight.is_none() {
            debug!("BUSY cleared without a pending conversion");
            return Ok(false);
        }
        self.abort(board)?;
        board.read_conversion(samples)?;

        #[cfg(feature = "trace_samples")]
        trace!(
            "conversion {}: {} {} {} {}",
            self.started,
            samples[0],
            samples[1],
            samples[2],
            samples[3]
        );
        Ok(true)
    }

    /// Lower the lines of the pending conversion, if any, and forget it
    pub fn abort<B: Board>(&mut self, board: &mut B) -> Result<(), HardwareError> {
        if let Some(pending) = self.in_flight.take() {
            board.set_convert_start(false)?;
            if let Some(line) = pending.mirror {
                board.set_output(line, false)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        device::tests::{Call, FakeBoard},
        registers::{Register, RegisterValue},
    };

    fn configured(writes: &[(Register, u8)]) -> RegisterBank {
        let mut registers = RegisterBank::new();
        for (register, value) in writes {
            registers
                .write(*register, RegisterValue::U8(*value))
                .unwrap();
        }
        registers
    }

    #[test]
    fn ticks_follow_sample_rate() {
        let stopped = configured(&[]);
        assert!(!tick_starts_conversion(Tick::Millisecond, &stopped));

        let slow = configured(&[(Register::Start, 1)]);
        assert!(tick_starts_conversion(Tick::Millisecond, &slow));
        assert!(!tick_starts_conversion(Tick::HalfMillisecond, &slow));

        let fast = configured(&[(Register::Start, 1), (Register::SampleFrequency, 1)]);
        assert!(tick_starts_conversion(Tick::Millisecond, &fast));
        assert!(tick_starts_conversion(Tick::HalfMillisecond, &fast));

        let catching = configured(&[(Register::Start, 1), (Register::Di0Conf, 3)]);
        assert!(!tick_starts_conversion(Tick::Millisecond, &catching));
    }

    #[test]
    fn finish_mirrors_start() {
        let mut board = FakeBoard::new();
        board.samples = [1, -2, 3, -4];
        let mut acquisition = Acquisition::new();

        assert!(acquisition
            .start(&mut board, TriggerDestination::Output(OutputLine::Do1))
            .unwrap());
        assert!(acquisition.in_flight());

        let mut samples = [0; CHANNELS];
        assert!(acquisition.finish(&mut board, &mut samples).unwrap());
        assert_eq!(samples, [1, -2, 3, -4]);
        assert!(!acquisition.in_flight());
        assert_eq!(
            board.calls,
            [
                Call::ConvertStart(true),
                Call::Output(OutputLine::Do1, true),
                Call::ConvertStart(false),
                Call::Output(OutputLine::Do1, false),
                Call::ReadConversion,
            ]
        );
    }

    #[test]
    fn no_retrigger_while_in_flight() {
        let mut board = FakeBoard::new();
        let mut acquisition = Acquisition::new();
        assert!(acquisition
            .start(&mut board, TriggerDestination::None)
            .unwrap());
        assert!(!acquisition
            .start(&mut board, TriggerDestination::None)
            .unwrap());
        assert_eq!(board.calls, [Call::ConvertStart(true)]);
        assert_eq!(acquisition.started(), 1);
    }

    #[test]
    fn spurious_busy_edge_reads_nothing() {
        let mut board = FakeBoard::new();
        let mut acquisition = Acquisition::new();
        let mut samples = [7; CHANNELS];
        assert!(!acquisition.finish(&mut board, &mut samples).unwrap());
        assert_eq!(samples, [7; CHANNELS]);
        assert!(board.calls.is_empty());
    }

    #[test]
    fn stuck_conversion_is_abandoned() {
        let mut board = FakeBoard::new();
        let mut acquisition = Acquisition::new();
        acquisition
            .start(&mut board, TriggerDestination::Output(OutputLine::Do0))
            .unwrap();

        for _ in 1..CONVERSION_TIMEOUT_TICKS {
            assert!(!acquisition.age(&mut board).unwrap());
        }
        assert!(acquisition.age(&mut board).unwrap());
        assert!(!acquisition.in_flight());
        assert_eq!(acquisition.timeouts(), 1);
        assert_eq!(
            &board.calls[2..],
            [Call::ConvertStart(false), Call::Output(OutputLine::Do0, false)]
        );

        assert!(acquisition
            .start(&mut board, TriggerDestination::None)
            .unwrap());
    }
}
