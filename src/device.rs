//! The whole peripheral behind one owned value.
//!
//! [`Device`] owns the register bank, the acquisition and threshold state and the [`Board`].
//! The outside world drives it through three groups of hooks:
//!
//! - scheduler: [`Device::on_tick_1ms`], [`Device::on_tick_500us`], [`Device::on_new_second`],
//!   [`Device::on_standby`], [`Device::on_active`]
//! - interrupts: [`Device::on_busy_edge`], [`Device::on_input_edge`]
//! - host: [`Device::read_register`], [`Device::write_register`], [`Device::take_event`]
//!
//! Every hook runs to completion and takes `&mut self`, so callers sharing the device between
//! interrupt handlers must hold it in a critical section (see [`crate::interrupt`]).

use crate::{
    acquisition::{tick_starts_conversion, Acquisition, Tick},
    components::{Board, HardwareError},
    input::{EdgeClassifier, InputAction},
    output::{Do0Timer, OutputLine},
    registers::{
        Do0Mode, Event, EventMessage, Events, Register, RegisterBank, RegisterError,
        RegisterValue,
    },
    threshold::ThresholdEngine,
};

/// Four-channel analog input peripheral
pub struct Device<B> {
    /// Pins and converter
    board: B,
    /// Host-visible registers
    registers: RegisterBank,
    /// Debounce counters of the threshold outputs
    thresholds: ThresholdEngine,
    /// Pending conversion
    acquisition: Acquisition,
    /// DO0 toggle and pulse timing
    do0: Do0Timer,
    /// DI0 edge tracking
    input: EdgeClassifier,
    /// Events not yet sent to the host
    events: Events,
}

impl<B: Board> Device<B> {
    /// Device with reset register values. Call [`Device::init`] before the first hook to bring
    /// the hardware in line with the registers.
    pub fn new(board: B) -> Self {
        Self {
            board,
            registers: RegisterBank::new(),
            thresholds: ThresholdEngine::new(),
            acquisition: Acquisition::new(),
            do0: Do0Timer::new(),
            input: EdgeClassifier::new(),
            events: Events::new(),
        }
    }

    /// Apply the register contents to the hardware and take a first DI0 sample
    pub fn init(&mut self) -> Result<(), HardwareError> {
        self.board.apply_front_end(self.registers.front_end())?;
        let levels = self.registers.output_levels();
        for line in OutputLine::ALL {
            self.drive(line, levels & line.mask() != 0)?;
        }
        let level = self.board.input_level()?;
        self.input.observe(level);
        self.registers.set_di0(level);
        info!("device initialized");
        Ok(())
    }

    /// Restore every register to its reset value and forget all runtime state
    pub fn reset_registers(&mut self) -> Result<(), HardwareError> {
        self.acquisition.abort(&mut self.board)?;
        self.registers = RegisterBank::new();
        self.thresholds.clear();
        self.do0 = Do0Timer::new();
        self.events = Events::new();
        self.init()
    }

    /// Register bank
    pub fn registers(&self) -> &RegisterBank {
        &self.registers
    }

    /// Threshold debounce state
    pub fn thresholds(&self) -> &ThresholdEngine {
        &self.thresholds
    }

    /// Conversion bookkeeping
    pub fn acquisition(&self) -> &Acquisition {
        &self.acquisition
    }

    /// Board
    pub fn board(&self) -> &B {
        &self.board
    }

    /// Board, for interrupt flag handling
    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    /// Oldest event not yet sent to the host, with its register snapshot
    pub fn take_event(&mut self) -> Option<EventMessage> {
        self.events.take()
    }

    /// Events lost because the host did not drain the queue in time
    pub fn dropped_events(&self) -> u32 {
        self.events.dropped()
    }

    /// Host read. `DI0` is sampled from the pin, everything else is read back from the bank.
    pub fn read_register(&mut self, address: u8) -> Result<RegisterValue, RegisterError> {
        let register = Register::try_from(address)?;
        if register == Register::Di0 {
            match self.board.input_level() {
                Ok(level) => self.registers.set_di0(level),
                Err(err) => warn!("unable to sample DI0: {:?}", err),
            }
        }
        Ok(self.registers.read(register))
    }

    /// Host write. Rejected writes change nothing. Accepted writes are committed, then their
    /// hardware effects are applied.
    pub fn write_register(
        &mut self,
        address: u8,
        value: RegisterValue,
    ) -> Result<(), RegisterError> {
        let register = Register::try_from(address)?;
        if let Err(err) = self.registers.write(register, value) {
            debug!("rejected write to {:?}: {:?}", register, err);
            return Err(err);
        }
        self.apply_write(register, value).map_err(|err| {
            error!("unable to apply {:?} to hardware: {:?}", register, err);
            RegisterError::Hardware
        })
    }

    /// Millisecond tick
    pub fn on_tick_1ms(&mut self) -> Result<(), HardwareError> {
        self.poll_input()?;
        self.on_tick(Tick::Millisecond)?;
        if self.do0.pulse_tick(self.registers.do0_mode()) {
            self.drive(OutputLine::Do0, false)?;
        }
        Ok(())
    }

    /// Tick half-way between two millisecond ticks. Only starts conversions at 2 kHz.
    pub fn on_tick_500us(&mut self) -> Result<(), HardwareError> {
        self.on_tick(Tick::HalfMillisecond)
    }

    /// A new second started
    pub fn on_new_second(&mut self) {
        self.do0.new_second();
    }

    /// Device entered standby: acquisition stops
    pub fn on_standby(&mut self) {
        if self.registers.acquisition_enabled() {
            info!("standby: stopping acquisition");
        }
        self.registers.set_acquisition(false);
    }

    /// Device left standby
    pub fn on_active(&mut self) {
        debug!("device active");
    }

    /// BUSY changed level. Completes the pending conversion once the converter is idle.
    pub fn on_busy_edge(&mut self) -> Result<(), HardwareError> {
        if self.board.converter_busy()? {
            return Ok(());
        }

        let mut samples = *self.registers.analog_inputs();
        if !self.acquisition.finish(&mut self.board, &mut samples)? {
            return Ok(());
        }
        self.registers.set_analog_inputs(samples);
        self.publish(Event::AnalogInputs);

        if self.registers.acquisition_enabled() {
            self.run_thresholds()?;
        }
        Ok(())
    }

    /// DI0 changed level
    pub fn on_input_edge(&mut self) -> Result<(), HardwareError> {
        self.poll_input()
    }

    /// Work shared by both scheduler ticks
    fn on_tick(&mut self, tick: Tick) -> Result<(), HardwareError> {
        if self
            .do0
            .count_tick(self.registers.do0_mode(), self.registers.acquisition_enabled())
        {
            let high = !self.level(OutputLine::Do0);
            self.drive(OutputLine::Do0, high)?;
        }

        self.acquisition.age(&mut self.board)?;
        if tick_starts_conversion(tick, &self.registers) {
            self.acquisition
                .start(&mut self.board, self.registers.trigger_destination())?;
        }
        Ok(())
    }

    /// Sample DI0 and act on any edge
    fn poll_input(&mut self) -> Result<(), HardwareError> {
        let level = self.board.input_level()?;
        self.registers.set_di0(level);

        match self.input.classify(level, self.registers.input_mode()) {
            None => {}
            Some(InputAction::Report) => self.publish(Event::DigitalInput),
            Some(InputAction::StartAcquisition) => {
                debug!("DI0 edge: starting acquisition");
                self.registers.set_acquisition(true);
            }
            Some(InputAction::StopAcquisition) => {
                debug!("DI0 edge: stopping acquisition");
                self.registers.set_acquisition(false);
            }
            Some(InputAction::CatchSample) => {
                if self.registers.acquisition_enabled() {
                    self.acquisition
                        .start(&mut self.board, self.registers.trigger_destination())?;
                }
            }
        }
        Ok(())
    }

    /// Threshold pass over the latest samples
    fn run_thresholds(&mut self) -> Result<(), HardwareError> {
        let levels = self.registers.output_levels();
        let update = self.thresholds.evaluate(
            self.registers.analog_inputs(),
            self.registers.bindings(),
            self.registers.do0_mode() == Do0Mode::ToggleEachSecond,
            levels,
        );
        self.registers.set_threshold_status(update.status());

        for line in OutputLine::in_mask(update.levels ^ levels) {
            self.drive(line, update.levels & line.mask() != 0)?;
        }
        if update.any_changed() {
            self.publish(Event::DigitalOutputs);
        }
        Ok(())
    }

    /// Queue `event` with the current contents of its register
    fn publish(&mut self, event: Event) {
        let value = self.registers.read(event.register());
        self.events.publish(event, value);
    }

    /// Hardware effects of an accepted host write
    fn apply_write(&mut self, register: Register, value: RegisterValue) -> Result<(), HardwareError> {
        let RegisterValue::U8(bits) = value else {
            return Ok(());
        };

        match register {
            Register::Start => debug!("host set acquisition to {}", bits),
            Register::RangeAndInputFilter => {
                self.board.apply_front_end(self.registers.front_end())?
            }
            Register::DoSet => {
                for line in OutputLine::in_mask(bits) {
                    self.drive(line, true)?;
                }
                if bits & OutputLine::Do0.mask() != 0 {
                    self.arm_pulse();
                }
            }
            Register::DoClear => {
                for line in OutputLine::in_mask(bits) {
                    self.drive(line, false)?;
                }
            }
            Register::DoToggle => {
                for line in OutputLine::in_mask(bits) {
                    let high = !self.level(line);
                    self.drive(line, high)?;
                    if high && line == OutputLine::Do0 {
                        self.arm_pulse();
                    }
                }
            }
            Register::DoWrite => {
                for line in OutputLine::ALL {
                    self.drive(line, bits & line.mask() != 0)?;
                }
                if bits & OutputLine::Do0.mask() != 0 {
                    self.arm_pulse();
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Start a DO0 pulse if DO0 is in pulse mode
    fn arm_pulse(&mut self) {
        if self.registers.do0_mode() == Do0Mode::Pulse {
            self.do0.arm_pulse(self.registers.do0_pulse());
        }
    }

    /// Driven level of `line`
    fn level(&self, line: OutputLine) -> bool {
        self.registers.output_levels() & line.mask() != 0
    }

    /// Drive `line` and record its level in `DO_WRITE`
    fn drive(&mut self, line: OutputLine, high: bool) -> Result<(), HardwareError> {
        self.board.set_output(line, high)?;
        let levels = self.registers.output_levels();
        self.registers.set_output_levels(if high {
            levels | line.mask()
        } else {
            levels & !line.mask()
        });
        Ok(())
    }
}
