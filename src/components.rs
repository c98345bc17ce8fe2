//! Hardware seam of the firmware.
//!
//! [`Board`] is everything the acquisition core needs from the hardware. [`HalBoard`]
//! implements it on top of [`embedded_hal`] pins and an SPI bus, which is what the RP2040
//! binary uses.

use embedded_hal::{
    digital::{InputPin, OutputPin, PinState},
    spi::SpiBus,
};

use crate::{
    output::OutputLine,
    registers::{FrontEnd, CHANNELS, OUTPUTS},
};

/// Failure of a hardware access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HardwareError {
    /// A GPIO read or write failed
    Pin,
    /// The SPI transfer from the converter failed
    Spi,
}

/// Hardware operations used by the acquisition core
pub trait Board {
    /// Drive both convert-start lines of the converter
    fn set_convert_start(&mut self, asserted: bool) -> Result<(), HardwareError>;

    /// Drive a digital output line
    fn set_output(&mut self, line: OutputLine, high: bool) -> Result<(), HardwareError>;

    /// Level of digital input 0
    fn input_level(&mut self) -> Result<bool, HardwareError>;

    /// Whether the converter signals a conversion in progress
    fn converter_busy(&mut self) -> Result<bool, HardwareError>;

    /// Read one result per channel from the converter, channel 0 first
    fn read_conversion(&mut self, samples: &mut [i16; CHANNELS]) -> Result<(), HardwareError>;

    /// Drive the oversampling and range pins of the converter
    fn apply_front_end(&mut self, front_end: FrontEnd) -> Result<(), HardwareError>;
}

/// Set `pin` to `high`
fn drive<P: OutputPin>(pin: &mut P, high: bool) -> Result<(), HardwareError> {
    pin.set_state(PinState::from(high))
        .map_err(|_| HardwareError::Pin)
}

/// External converter: two convert-start lines, active-low chip select, BUSY and SPI data
pub struct Converter<SPI, P, IN> {
    /// Serial data interface
    spi: SPI,
    /// CONVST A and CONVST B
    convert_start: [P; 2],
    /// Chip select, active low
    chip_select: P,
    /// BUSY, high while converting
    busy: IN,
}

impl<SPI, P, IN> Converter<SPI, P, IN>
where
    SPI: SpiBus<u8>,
    P: OutputPin,
    IN: InputPin,
{
    /// Wrap the converter's lines. The chip select is released.
    pub fn new(
        spi: SPI,
        convert_start: [P; 2],
        mut chip_select: P,
        busy: IN,
    ) -> Result<Self, HardwareError> {
        drive(&mut chip_select, true)?;
        Ok(Self {
            spi,
            convert_start,
            chip_select,
            busy,
        })
    }

    /// BUSY pin, for interrupt control
    pub fn busy_pin(&mut self) -> &mut IN {
        &mut self.busy
    }

    /// Read all channels in one chip-select window: two bytes per channel, high byte first
    fn read_frame(&mut self, samples: &mut [i16; CHANNELS]) -> Result<(), HardwareError> {
        let mut frame = [0u8; 2 * CHANNELS];
        drive(&mut self.chip_select, false)?;
        let transfer = self
            .spi
            .read(&mut frame)
            .and_then(|()| self.spi.flush());
        drive(&mut self.chip_select, true)?;
        transfer.map_err(|_| HardwareError::Spi)?;

        for (sample, bytes) in samples.iter_mut().zip(frame.chunks_exact(2)) {
            *sample = i16::from_be_bytes([bytes[0], bytes[1]]);
        }
        Ok(())
    }
}

/// [`Board`] made of [`embedded_hal`] pins.
///
/// All output pins share one type `P` and both inputs one type `IN`, which on the RP2040 are
/// the type-erased GPIO pins.
pub struct HalBoard<SPI, P, IN> {
    /// The external converter
    converter: Converter<SPI, P, IN>,
    /// DO0 to DO3
    outputs: [P; OUTPUTS],
    /// DI0
    input: IN,
    /// OS0 to OS2
    oversampling: [P; 3],
    /// RANGE
    range: P,
}

impl<SPI, P, IN> HalBoard<SPI, P, IN>
where
    SPI: SpiBus<u8>,
    P: OutputPin,
    IN: InputPin,
{
    /// Assemble the board
    pub fn new(
        converter: Converter<SPI, P, IN>,
        outputs: [P; OUTPUTS],
        input: IN,
        oversampling: [P; 3],
        range: P,
    ) -> Self {
        Self {
            converter,
            outputs,
            input,
            oversampling,
            range,
        }
    }

    /// DI0 pin, for interrupt control
    pub fn input_pin(&mut self) -> &mut IN {
        &mut self.input
    }

    /// BUSY pin, for interrupt control
    pub fn busy_pin(&mut self) -> &mut IN {
        self.converter.busy_pin()
    }
}

impl<SPI, P, IN> Board for HalBoard<SPI, P, IN>
where
    SPI: SpiBus<u8>,
    P: OutputPin,
    IN: InputPin,
{
    fn set_convert_start(&mut self, asserted: bool) -> Result<(), HardwareError> {
        for pin in self.converter.convert_start.iter_mut() {
            drive(pin, asserted)?;
        }
        Ok(())
    }

    fn set_output(&mut self, line: OutputLine, high: bool) -> Result<(), HardwareError> {
        drive(&mut self.outputs[line.index()], high)
    }

    fn input_level(&mut self) -> Result<bool, HardwareError> {
        self.input.is_high().map_err(|_| HardwareError::Pin)
    }

    fn converter_busy(&mut self) -> Result<bool, HardwareError> {
        self.converter
            .busy
            .is_high()
            .map_err(|_| HardwareError::Pin)
    }

    fn read_conversion(&mut self, samples: &mut [i16; CHANNELS]) -> Result<(), HardwareError> {
        self.converter.read_frame(samples)
    }

    fn apply_front_end(&mut self, front_end: FrontEnd) -> Result<(), HardwareError> {
        for (bit, pin) in self.oversampling.iter_mut().enumerate() {
            drive(pin, front_end.oversampling & (1 << bit) != 0)?;
        }
        drive(&mut self.range, front_end.range_10v)
    }
}
