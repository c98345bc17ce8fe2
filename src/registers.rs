//! Host-visible register bank.
//!
//! Every register has a fixed address, payload type and element count. Reads return the
//! stored value. Writes are validated against the register's bitmask or range and only
//! committed when valid; a rejected write leaves the bank untouched. Hardware side effects of
//! a write (front-end pins, output pins, pulse arming) are applied by
//! [`Device::write_register`](crate::device::Device::write_register) after the commit.

use heapless::spsc::Queue;

use crate::{
    output::OutputLine,
    threshold::{decode_source, encode_source, ThresholdBinding},
};

/// Number of analog input channels
pub const CHANNELS: usize = 4;
/// Number of digital output lines
pub const OUTPUTS: usize = 4;

/// Valid bits of `RANGE_AND_INPUT_FILTER`: oversampling in bits 0..2, range in bit 4
pub const MASK_RANGE_AND_INPUT_FILTER: u8 = 0x17;
/// Valid bits of `SAMPLE_FREQUENCY`
pub const MASK_SAMPLE_FREQUENCY: u8 = 0x01;
/// Valid bits of `DI0_CONF`
pub const MASK_DI0_CONF: u8 = 0x03;
/// Valid bits of `DO0_CONF`
pub const MASK_DO0_CONF: u8 = 0x03;
/// Valid bits of the `DO_SET`, `DO_CLEAR`, `DO_TOGGLE` and `DO_WRITE` registers
pub const MASK_OUTPUTS: u8 = 0x0F;
/// Valid bits of `TRIGGER_DESTINATION`
pub const MASK_TRIGGER_DESTINATION: u8 = 0x07;
/// Accepted range of `DO0_PULSE`, in milliseconds
pub const DO0_PULSE_RANGE: core::ops::RangeInclusive<u8> = 1..=250;

/// Failure of a host register access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegisterError {
    /// No register lives at this address
    UnknownAddress,
    /// Payload type or element count does not match the register
    TypeMismatch,
    /// Register is written by the firmware only
    ReadOnly,
    /// Value is outside the register's bitmask or range
    InvalidValue,
    /// Value was committed but applying it to the hardware failed
    Hardware,
}

/// Payload type of a register, as declared to the host protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PayloadType {
    /// Unsigned 8-bit
    U8,
    /// Unsigned 16-bit
    U16,
    /// Signed 16-bit
    I16,
}

/// Typed register payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegisterValue {
    /// Single unsigned 8-bit element
    U8(u8),
    /// Single unsigned 16-bit element
    U16(u16),
    /// Single signed 16-bit element
    I16(i16),
    /// One signed 16-bit element per analog channel
    I16Array([i16; CHANNELS]),
}

impl RegisterValue {
    /// Payload type of the elements
    pub fn payload_type(&self) -> PayloadType {
        match self {
            Self::U8(_) => PayloadType::U8,
            Self::U16(_) => PayloadType::U16,
            Self::I16(_) | Self::I16Array(_) => PayloadType::I16,
        }
    }

    /// Number of elements carried
    pub fn element_count(&self) -> usize {
        match self {
            Self::I16Array(values) => values.len(),
            _ => 1,
        }
    }
}

/// Register addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// Acquisition enable; any non-zero value starts acquiring
    Start,
    /// Latest sample of every channel
    AnalogInputs,
    /// Level of digital input 0
    Di0,
    /// Threshold output levels (bits 0..3) and changed flags (bits 4..7)
    Thresholds,
    /// Input range and anti-aliasing filter of the converter
    RangeAndInputFilter,
    /// Sample rate
    SampleFrequency,
    /// Meaning of DI0 edges
    Di0Conf,
    /// Mode of DO0
    Do0Conf,
    /// Duration of a DO0 pulse, in milliseconds
    Do0Pulse,
    /// Set the selected outputs
    DoSet,
    /// Clear the selected outputs
    DoClear,
    /// Toggle the selected outputs
    DoToggle,
    /// Write all outputs; reads back the driven levels
    DoWrite,
    /// Output mirroring the convert-start pulse
    TriggerDestination,
    /// Channel bound to the line's threshold
    Channel(OutputLine),
    /// Threshold value of the line
    ThresholdValue(OutputLine),
    /// Up-debounce target of the line
    UpSamples(OutputLine),
    /// Down-debounce target of the line
    DownSamples(OutputLine),
}

impl Register {
    /// First application register address
    pub const ADDRESS_MIN: u8 = 32;
    /// Last application register address
    pub const ADDRESS_MAX: u8 = 90;

    /// Base address of the per-line `DOn_CH` registers
    const CHANNEL_BASE: u8 = 58;
    /// Base address of the per-line `DOn_TH_VALUE` registers
    const THRESHOLD_VALUE_BASE: u8 = 66;
    /// Base address of the per-line `DOn_TH_UP_SAMPLES` registers
    const UP_SAMPLES_BASE: u8 = 74;
    /// Base address of the per-line `DOn_TH_DOWN_SAMPLES` registers
    const DOWN_SAMPLES_BASE: u8 = 82;

    /// Host address of the register
    pub const fn address(self) -> u8 {
        match self {
            Self::Start => 32,
            Self::AnalogInputs => 33,
            Self::Di0 => 34,
            Self::Thresholds => 36,
            Self::RangeAndInputFilter => 37,
            Self::SampleFrequency => 38,
            Self::Di0Conf => 39,
            Self::Do0Conf => 40,
            Self::Do0Pulse => 41,
            Self::DoSet => 42,
            Self::DoClear => 43,
            Self::DoToggle => 44,
            Self::DoWrite => 45,
            Self::TriggerDestination => 48,
            Self::Channel(line) => Self::CHANNEL_BASE + line.index() as u8,
            Self::ThresholdValue(line) => Self::THRESHOLD_VALUE_BASE + line.index() as u8,
            Self::UpSamples(line) => Self::UP_SAMPLES_BASE + line.index() as u8,
            Self::DownSamples(line) => Self::DOWN_SAMPLES_BASE + line.index() as u8,
        }
    }

    /// Payload type of the register
    pub const fn payload_type(self) -> PayloadType {
        match self {
            Self::AnalogInputs | Self::ThresholdValue(_) => PayloadType::I16,
            Self::UpSamples(_) | Self::DownSamples(_) => PayloadType::U16,
            _ => PayloadType::U8,
        }
    }

    /// Number of elements of the register
    pub const fn element_count(self) -> usize {
        match self {
            Self::AnalogInputs => CHANNELS,
            _ => 1,
        }
    }

    /// Whether the host may write the register
    pub const fn is_writable(self) -> bool {
        !matches!(self, Self::AnalogInputs | Self::Di0 | Self::Thresholds)
    }
}

impl TryFrom<u8> for Register {
    type Error = RegisterError;

    fn try_from(address: u8) -> Result<Self, Self::Error> {
        /// Line for a per-line register block starting at `base`
        fn line(address: u8, base: u8) -> OutputLine {
            // Callers only pass addresses within `base..base + 4`
            OutputLine::ALL[usize::from(address - base) % OUTPUTS]
        }

        Ok(match address {
            32 => Self::Start,
            33 => Self::AnalogInputs,
            34 => Self::Di0,
            36 => Self::Thresholds,
            37 => Self::RangeAndInputFilter,
            38 => Self::SampleFrequency,
            39 => Self::Di0Conf,
            40 => Self::Do0Conf,
            41 => Self::Do0Pulse,
            42 => Self::DoSet,
            43 => Self::DoClear,
            44 => Self::DoToggle,
            45 => Self::DoWrite,
            48 => Self::TriggerDestination,
            58..=61 => Self::Channel(line(address, Self::CHANNEL_BASE)),
            66..=69 => Self::ThresholdValue(line(address, Self::THRESHOLD_VALUE_BASE)),
            74..=77 => Self::UpSamples(line(address, Self::UP_SAMPLES_BASE)),
            82..=85 => Self::DownSamples(line(address, Self::DOWN_SAMPLES_BASE)),
            _ => return Err(RegisterError::UnknownAddress),
        })
    }
}

/// Reject `value` if it has bits outside `mask`
fn check_mask(value: u8, mask: u8) -> Result<u8, RegisterError> {
    if value & !mask != 0 {
        Err(RegisterError::InvalidValue)
    } else {
        Ok(value)
    }
}

/// Conversion rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleRate {
    /// One conversion per millisecond tick
    Hz1000,
    /// One conversion per 500 µs tick
    Hz2000,
}

impl TryFrom<u8> for SampleRate {
    type Error = RegisterError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match check_mask(value, MASK_SAMPLE_FREQUENCY)? {
            0 => Ok(Self::Hz1000),
            _ => Ok(Self::Hz2000),
        }
    }
}

/// Meaning of edges on DI0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputMode {
    /// Plain input: every level change is reported to the host
    Sync,
    /// Rising edge starts acquisition, falling edge stops it
    RiseStartsAcquisition,
    /// Falling edge starts acquisition, rising edge stops it
    FallStartsAcquisition,
    /// Each rising edge starts a single conversion; ticks no longer trigger
    RiseCatchesSample,
}

impl TryFrom<u8> for InputMode {
    type Error = RegisterError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match check_mask(value, MASK_DI0_CONF)? {
            0 => Ok(Self::Sync),
            1 => Ok(Self::RiseStartsAcquisition),
            2 => Ok(Self::FallStartsAcquisition),
            _ => Ok(Self::RiseCatchesSample),
        }
    }
}

/// Mode of DO0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Do0Mode {
    /// Plain digital output like the other lines
    Output,
    /// Flips once per second while acquiring; threshold logic leaves DO0 alone
    ToggleEachSecond,
    /// Setting DO0 starts a pulse of `DO0_PULSE` milliseconds
    Pulse,
}

impl TryFrom<u8> for Do0Mode {
    type Error = RegisterError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match check_mask(value, MASK_DO0_CONF)? {
            0 => Ok(Self::Output),
            1 => Ok(Self::ToggleEachSecond),
            2 => Ok(Self::Pulse),
            _ => Err(RegisterError::InvalidValue),
        }
    }
}

/// Output line mirroring the convert-start pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerDestination {
    /// Pulse is not mirrored
    None,
    /// Pulse is mirrored on this line
    Output(OutputLine),
}

impl TriggerDestination {
    /// Mirrored line, if any
    pub fn line(self) -> Option<OutputLine> {
        match self {
            Self::None => None,
            Self::Output(line) => Some(line),
        }
    }
}

impl TryFrom<u8> for TriggerDestination {
    type Error = RegisterError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match check_mask(value, MASK_TRIGGER_DESTINATION)? {
            0 => Ok(Self::None),
            line => OutputLine::from_index(usize::from(line) - 1)
                .map(Self::Output)
                .ok_or(RegisterError::InvalidValue),
        }
    }
}

impl From<TriggerDestination> for u8 {
    fn from(destination: TriggerDestination) -> Self {
        match destination {
            TriggerDestination::None => 0,
            TriggerDestination::Output(line) => line.index() as u8 + 1,
        }
    }
}

/// Converter front-end pin state derived from `RANGE_AND_INPUT_FILTER`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrontEnd {
    /// Levels of the oversampling pins OS0..OS2, one bit each
    pub oversampling: u8,
    /// RANGE pin: `true` selects ±10 V, `false` ±5 V
    pub range_10v: bool,
}

impl FrontEnd {
    /// Pin state for a `RANGE_AND_INPUT_FILTER` value
    pub const fn from_register(value: u8) -> Self {
        Self {
            oversampling: value & 0x07,
            range_10v: value & 0x10 != 0,
        }
    }
}

/// Events the firmware reports to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// A conversion completed and `ANALOG_INPUTS` holds new samples
    AnalogInputs,
    /// DI0 changed level in sync mode
    DigitalInput,
    /// The threshold logic changed at least one output
    DigitalOutputs,
}

impl Event {
    /// Register whose contents the event reports
    pub const fn register(self) -> Register {
        match self {
            Self::AnalogInputs => Register::AnalogInputs,
            Self::DigitalInput => Register::Di0,
            Self::DigitalOutputs => Register::Thresholds,
        }
    }
}

/// Slots in the event queue. One slot stays free, so at most `EVENT_QUEUE_LEN - 1` events wait.
pub const EVENT_QUEUE_LEN: usize = 16;

/// An event together with its register's contents at the moment it was published
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventMessage {
    /// What happened
    pub event: Event,
    /// Snapshot of [`Event::register`]
    pub value: RegisterValue,
}

/// Events waiting for the host layer, oldest first. When the queue is full new events are
/// dropped and counted.
pub struct Events {
    /// Pending messages
    queue: Queue<EventMessage, EVENT_QUEUE_LEN>,
    /// Messages lost to a full queue since boot
    dropped: u32,
}

impl Default for Events {
    fn default() -> Self {
        Self::new()
    }
}

impl Events {
    /// Empty queue
    pub const fn new() -> Self {
        Self {
            queue: Queue::new(),
            dropped: 0,
        }
    }

    /// Queue `event` with `value`, the current contents of its register
    pub fn publish(&mut self, event: Event, value: RegisterValue) {
        if self.queue.enqueue(EventMessage { event, value }).is_err() {
            self.dropped = self.dropped.wrapping_add(1);
            warn!(
                "event queue full, dropping {:?} ({} dropped so far)",
                event, self.dropped
            );
        }
    }

    /// Number of messages waiting
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Messages lost to a full queue
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Remove and return the oldest message
    pub fn take(&mut self) -> Option<EventMessage> {
        self.queue.dequeue()
    }
}

/// Storage for every application register
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterBank {
    /// `START`
    start: u8,
    /// `ANALOG_INPUTS`
    analog_inputs: [i16; CHANNELS],
    /// `DI0`
    di0: u8,
    /// `THRESHOLDS`
    thresholds: u8,
    /// `RANGE_AND_INPUT_FILTER`
    range_and_input_filter: u8,
    /// `SAMPLE_FREQUENCY`
    sample_rate: SampleRate,
    /// `DI0_CONF`
    input_mode: InputMode,
    /// `DO0_CONF`
    do0_mode: Do0Mode,
    /// `DO0_PULSE`
    do0_pulse: u8,
    /// Last value written to `DO_SET`
    do_set: u8,
    /// Last value written to `DO_CLEAR`
    do_clear: u8,
    /// Last value written to `DO_TOGGLE`
    do_toggle: u8,
    /// `DO_WRITE`: driven output levels
    output_levels: u8,
    /// `TRIGGER_DESTINATION`
    trigger_destination: TriggerDestination,
    /// `DOn_CH`, `DOn_TH_VALUE`, `DOn_TH_UP_SAMPLES` and `DOn_TH_DOWN_SAMPLES`
    bindings: [ThresholdBinding; OUTPUTS],
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterBank {
    /// Reset value of `RANGE_AND_INPUT_FILTER`: ±10 V, 1.5 kHz low-pass
    pub const DEFAULT_RANGE_AND_INPUT_FILTER: u8 = 0x16;
    /// Reset value of `DO0_PULSE`
    pub const DEFAULT_DO0_PULSE: u8 = 10;

    /// Bank holding the reset values
    pub const fn new() -> Self {
        Self {
            start: 0,
            analog_inputs: [0; CHANNELS],
            di0: 0,
            thresholds: 0,
            range_and_input_filter: Self::DEFAULT_RANGE_AND_INPUT_FILTER,
            sample_rate: SampleRate::Hz1000,
            input_mode: InputMode::Sync,
            do0_mode: Do0Mode::Output,
            do0_pulse: Self::DEFAULT_DO0_PULSE,
            do_set: 0,
            do_clear: 0,
            do_toggle: 0,
            output_levels: 0,
            trigger_destination: TriggerDestination::None,
            bindings: [ThresholdBinding::DEFAULT; OUTPUTS],
        }
    }

    /// Current value of `register`
    pub fn read(&self, register: Register) -> RegisterValue {
        match register {
            Register::Start => RegisterValue::U8(self.start),
            Register::AnalogInputs => RegisterValue::I16Array(self.analog_inputs),
            Register::Di0 => RegisterValue::U8(self.di0),
            Register::Thresholds => RegisterValue::U8(self.thresholds),
            Register::RangeAndInputFilter => RegisterValue::U8(self.range_and_input_filter),
            Register::SampleFrequency => RegisterValue::U8(self.sample_rate as u8),
            Register::Di0Conf => RegisterValue::U8(self.input_mode as u8),
            Register::Do0Conf => RegisterValue::U8(self.do0_mode as u8),
            Register::Do0Pulse => RegisterValue::U8(self.do0_pulse),
            Register::DoSet => RegisterValue::U8(self.do_set),
            Register::DoClear => RegisterValue::U8(self.do_clear),
            Register::DoToggle => RegisterValue::U8(self.do_toggle),
            Register::DoWrite => RegisterValue::U8(self.output_levels),
            Register::TriggerDestination => RegisterValue::U8(self.trigger_destination.into()),
            Register::Channel(line) => {
                RegisterValue::U8(encode_source(self.bindings[line.index()].source))
            }
            Register::ThresholdValue(line) => {
                RegisterValue::I16(self.bindings[line.index()].threshold)
            }
            Register::UpSamples(line) => RegisterValue::U16(self.bindings[line.index()].up_samples),
            Register::DownSamples(line) => {
                RegisterValue::U16(self.bindings[line.index()].down_samples)
            }
        }
    }

    /// Validate and commit a host write. Nothing changes when an error is returned.
    ///
    /// The `DO_*` registers only record the request here; driving the pins is up to the caller.
    pub fn write(&mut self, register: Register, value: RegisterValue) -> Result<(), RegisterError> {
        if value.payload_type() != register.payload_type()
            || value.element_count() != register.element_count()
        {
            return Err(RegisterError::TypeMismatch);
        }
        if !register.is_writable() {
            return Err(RegisterError::ReadOnly);
        }

        match (register, value) {
            (Register::Start, RegisterValue::U8(v)) => self.start = v,
            (Register::RangeAndInputFilter, RegisterValue::U8(v)) => {
                self.range_and_input_filter = check_mask(v, MASK_RANGE_AND_INPUT_FILTER)?
            }
            (Register::SampleFrequency, RegisterValue::U8(v)) => {
                self.sample_rate = SampleRate::try_from(v)?
            }
            (Register::Di0Conf, RegisterValue::U8(v)) => self.input_mode = InputMode::try_from(v)?,
            (Register::Do0Conf, RegisterValue::U8(v)) => self.do0_mode = Do0Mode::try_from(v)?,
            (Register::Do0Pulse, RegisterValue::U8(v)) => {
                if !DO0_PULSE_RANGE.contains(&v) {
                    return Err(RegisterError::InvalidValue);
                }
                self.do0_pulse = v
            }
            (Register::DoSet, RegisterValue::U8(v)) => self.do_set = check_mask(v, MASK_OUTPUTS)?,
            (Register::DoClear, RegisterValue::U8(v)) => {
                self.do_clear = check_mask(v, MASK_OUTPUTS)?
            }
            (Register::DoToggle, RegisterValue::U8(v)) => {
                self.do_toggle = check_mask(v, MASK_OUTPUTS)?
            }
            (Register::DoWrite, RegisterValue::U8(v)) => {
                check_mask(v, MASK_OUTPUTS)?;
            }
            (Register::TriggerDestination, RegisterValue::U8(v)) => {
                self.trigger_destination = TriggerDestination::try_from(v)?
            }
            (Register::Channel(line), RegisterValue::U8(v)) => {
                self.bindings[line.index()].source = decode_source(v)?
            }
            (Register::ThresholdValue(line), RegisterValue::I16(v)) => {
                self.bindings[line.index()].threshold = v
            }
            (Register::UpSamples(line), RegisterValue::U16(v)) => {
                self.bindings[line.index()].up_samples = v
            }
            (Register::DownSamples(line), RegisterValue::U16(v)) => {
                self.bindings[line.index()].down_samples = v
            }
            _ => return Err(RegisterError::TypeMismatch),
        }
        Ok(())
    }

    /// Whether acquisition is enabled
    pub fn acquisition_enabled(&self) -> bool {
        self.start != 0
    }

    /// Enable or disable acquisition from firmware
    pub fn set_acquisition(&mut self, enabled: bool) {
        self.start = u8::from(enabled);
    }

    /// Latest samples
    pub fn analog_inputs(&self) -> &[i16; CHANNELS] {
        &self.analog_inputs
    }

    /// Commit the samples of a completed conversion
    pub fn set_analog_inputs(&mut self, samples: [i16; CHANNELS]) {
        self.analog_inputs = samples;
    }

    /// Record the level of DI0
    pub fn set_di0(&mut self, high: bool) {
        self.di0 = u8::from(high);
    }

    /// `THRESHOLDS` register value
    pub fn threshold_status(&self) -> u8 {
        self.thresholds
    }

    /// Publish the outcome of a threshold pass
    pub fn set_threshold_status(&mut self, status: u8) {
        self.thresholds = status;
    }

    /// Configured front-end pin state
    pub fn front_end(&self) -> FrontEnd {
        FrontEnd::from_register(self.range_and_input_filter)
    }

    /// Configured sample rate
    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    /// Configured DI0 mode
    pub fn input_mode(&self) -> InputMode {
        self.input_mode
    }

    /// Configured DO0 mode
    pub fn do0_mode(&self) -> Do0Mode {
        self.do0_mode
    }

    /// Configured DO0 pulse duration, in milliseconds
    pub fn do0_pulse(&self) -> u8 {
        self.do0_pulse
    }

    /// Driven output levels, one bit per line
    pub fn output_levels(&self) -> u8 {
        self.output_levels
    }

    /// Record driven output levels
    pub fn set_output_levels(&mut self, levels: u8) {
        self.output_levels = levels & MASK_OUTPUTS;
    }

    /// Configured trigger destination
    pub fn trigger_destination(&self) -> TriggerDestination {
        self.trigger_destination
    }

    /// Threshold configuration of every line
    pub fn bindings(&self) -> &[ThresholdBinding; OUTPUTS] {
        &self.bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threshold::Channel;

    #[test]
    fn addresses_round_trip() {
        for address in 0..=u8::MAX {
            if let Ok(register) = Register::try_from(address) {
                assert_eq!(register.address(), address);
                assert!((Register::ADDRESS_MIN..=Register::ADDRESS_MAX).contains(&address));
            }
        }
        assert_eq!(Register::try_from(35), Err(RegisterError::UnknownAddress));
        assert_eq!(Register::try_from(49), Err(RegisterError::UnknownAddress));
        assert_eq!(Register::try_from(90), Err(RegisterError::UnknownAddress));
        assert_eq!(
            Register::try_from(76),
            Ok(Register::UpSamples(OutputLine::Do2))
        );
    }

    #[test]
    fn range_and_filter_round_trip() {
        let mut bank = RegisterBank::new();
        for value in [0x01, 0x06, 0x11, 0x16, 0x17] {
            bank.write(Register::RangeAndInputFilter, RegisterValue::U8(value))
                .unwrap();
            assert_eq!(
                bank.read(Register::RangeAndInputFilter),
                RegisterValue::U8(value)
            );
        }
    }

    #[test]
    fn range_and_filter_rejects_bits_outside_mask() {
        let mut bank = RegisterBank::new();
        bank.write(Register::RangeAndInputFilter, RegisterValue::U8(0x13))
            .unwrap();
        for value in [0x08, 0x20, 0x1F, 0x80, 0xFF] {
            assert_eq!(
                bank.write(Register::RangeAndInputFilter, RegisterValue::U8(value)),
                Err(RegisterError::InvalidValue)
            );
            assert_eq!(
                bank.read(Register::RangeAndInputFilter),
                RegisterValue::U8(0x13)
            );
        }
    }

    #[test]
    fn front_end_follows_register() {
        assert_eq!(
            FrontEnd::from_register(0x16),
            FrontEnd {
                oversampling: 0b110,
                range_10v: true
            }
        );
        assert_eq!(
            FrontEnd::from_register(0x03),
            FrontEnd {
                oversampling: 0b011,
                range_10v: false
            }
        );
    }

    #[test]
    fn pulse_duration_range() {
        let mut bank = RegisterBank::new();
        assert_eq!(
            bank.write(Register::Do0Pulse, RegisterValue::U8(0)),
            Err(RegisterError::InvalidValue)
        );
        assert_eq!(
            bank.write(Register::Do0Pulse, RegisterValue::U8(251)),
            Err(RegisterError::InvalidValue)
        );
        assert_eq!(bank.do0_pulse(), RegisterBank::DEFAULT_DO0_PULSE);

        bank.write(Register::Do0Pulse, RegisterValue::U8(1)).unwrap();
        assert_eq!(bank.do0_pulse(), 1);
        bank.write(Register::Do0Pulse, RegisterValue::U8(250)).unwrap();
        assert_eq!(bank.do0_pulse(), 250);
    }

    #[test]
    fn mode_registers_validate() {
        let mut bank = RegisterBank::new();

        bank.write(Register::SampleFrequency, RegisterValue::U8(1)).unwrap();
        assert_eq!(bank.sample_rate(), SampleRate::Hz2000);
        assert!(bank
            .write(Register::SampleFrequency, RegisterValue::U8(2))
            .is_err());
        assert_eq!(bank.sample_rate(), SampleRate::Hz2000);

        bank.write(Register::Di0Conf, RegisterValue::U8(3)).unwrap();
        assert_eq!(bank.input_mode(), InputMode::RiseCatchesSample);
        assert!(bank.write(Register::Di0Conf, RegisterValue::U8(4)).is_err());

        bank.write(Register::Do0Conf, RegisterValue::U8(2)).unwrap();
        assert_eq!(bank.do0_mode(), Do0Mode::Pulse);
        assert!(bank.write(Register::Do0Conf, RegisterValue::U8(3)).is_err());
        assert_eq!(bank.read(Register::Do0Conf), RegisterValue::U8(2));

        bank.write(Register::TriggerDestination, RegisterValue::U8(4))
            .unwrap();
        assert_eq!(
            bank.trigger_destination(),
            TriggerDestination::Output(OutputLine::Do3)
        );
        assert!(bank
            .write(Register::TriggerDestination, RegisterValue::U8(5))
            .is_err());
        assert!(bank
            .write(Register::TriggerDestination, RegisterValue::U8(8))
            .is_err());
        assert_eq!(bank.read(Register::TriggerDestination), RegisterValue::U8(4));

        assert!(bank.write(Register::DoSet, RegisterValue::U8(0x10)).is_err());
        bank.write(Register::DoSet, RegisterValue::U8(0x0F)).unwrap();
    }

    #[test]
    fn threshold_bindings_are_written_per_line() {
        let mut bank = RegisterBank::new();
        bank.write(Register::Channel(OutputLine::Do1), RegisterValue::U8(3))
            .unwrap();
        bank.write(
            Register::ThresholdValue(OutputLine::Do1),
            RegisterValue::I16(-1200),
        )
        .unwrap();
        bank.write(Register::UpSamples(OutputLine::Do1), RegisterValue::U16(7))
            .unwrap();
        bank.write(Register::DownSamples(OutputLine::Do1), RegisterValue::U16(9))
            .unwrap();
        assert_eq!(
            bank.bindings()[1],
            ThresholdBinding {
                source: Channel::new(3),
                threshold: -1200,
                up_samples: 7,
                down_samples: 9,
            }
        );
        assert_eq!(bank.bindings()[0], ThresholdBinding::DEFAULT);

        assert_eq!(
            bank.write(Register::Channel(OutputLine::Do1), RegisterValue::U8(5)),
            Err(RegisterError::InvalidValue)
        );
        assert_eq!(bank.read(Register::Channel(OutputLine::Do1)), RegisterValue::U8(3));
        bank.write(Register::Channel(OutputLine::Do1), RegisterValue::U8(8))
            .unwrap();
        assert_eq!(bank.bindings()[1].source, None);
    }

    #[test]
    fn rejects_wrong_types_and_read_only_registers() {
        let mut bank = RegisterBank::new();
        let before = bank.clone();
        assert_eq!(
            bank.write(Register::Start, RegisterValue::U16(1)),
            Err(RegisterError::TypeMismatch)
        );
        assert_eq!(
            bank.write(Register::UpSamples(OutputLine::Do0), RegisterValue::I16(1)),
            Err(RegisterError::TypeMismatch)
        );
        assert_eq!(
            bank.write(Register::AnalogInputs, RegisterValue::I16Array([1; CHANNELS])),
            Err(RegisterError::ReadOnly)
        );
        assert_eq!(
            bank.write(Register::AnalogInputs, RegisterValue::I16(1)),
            Err(RegisterError::TypeMismatch)
        );
        assert_eq!(
            bank.write(Register::Thresholds, RegisterValue::U8(0)),
            Err(RegisterError::ReadOnly)
        );
        assert_eq!(bank, before);
    }

    #[test]
    fn start_register_enables_acquisition() {
        let mut bank = RegisterBank::new();
        assert!(!bank.acquisition_enabled());
        bank.write(Register::Start, RegisterValue::U8(7)).unwrap();
        assert!(bank.acquisition_enabled());
        bank.set_acquisition(false);
        assert_eq!(bank.read(Register::Start), RegisterValue::U8(0));
    }

    #[test]
    fn events_keep_every_publication_in_order() {
        let mut events = Events::new();
        events.publish(Event::AnalogInputs, RegisterValue::I16Array([1, 2, 3, 4]));
        events.publish(Event::DigitalOutputs, RegisterValue::U8(0x11));
        events.publish(Event::AnalogInputs, RegisterValue::I16Array([5, 6, 7, 8]));
        assert_eq!(events.len(), 3);

        assert_eq!(
            events.take(),
            Some(EventMessage {
                event: Event::AnalogInputs,
                value: RegisterValue::I16Array([1, 2, 3, 4])
            })
        );
        assert_eq!(events.take().map(|m| m.event), Some(Event::DigitalOutputs));
        assert_eq!(
            events.take().map(|m| m.value),
            Some(RegisterValue::I16Array([5, 6, 7, 8]))
        );
        assert_eq!(events.take(), None);
        assert!(events.is_empty());
        assert_eq!(Event::DigitalOutputs.register().address(), 36);
    }

    #[test]
    fn full_event_queue_drops_and_counts() {
        let mut events = Events::new();
        for n in 0..EVENT_QUEUE_LEN as u8 + 2 {
            events.publish(Event::DigitalInput, RegisterValue::U8(n));
        }
        assert_eq!(events.len(), EVENT_QUEUE_LEN - 1);
        assert_eq!(events.dropped(), 3);
        assert_eq!(events.take().map(|m| m.value), Some(RegisterValue::U8(0)));
    }
}
