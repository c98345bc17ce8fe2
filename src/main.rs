//! RP2040 firmware for the four-channel analog input board.
//!
//! All work happens in interrupts: the 500 µs timer alarm runs the scheduler hooks, and the
//! GPIO bank interrupt reports BUSY and DI0 edges.
#![no_std]
#![no_main]
#![warn(missing_docs)]

use analog_input::{
    components::{Converter, HalBoard},
    device::Device,
    interrupt::SharedDevice,
    output::TICKS_PER_SECOND,
};
use core::cell::RefCell;
use critical_section::Mutex;
use defmt::{debug, error, info, warn};
#[allow(unused_imports)]
use defmt_rtt as _;
use embedded_hal::digital::OutputPin;
#[allow(unused_imports)]
use panic_probe as _;
use rp2040_hal::{
    clocks::init_clocks_and_plls,
    entry,
    fugit::{MicrosDurationU32, RateExtU32},
    gpio::{
        bank0::{Gpio16, Gpio18, Gpio19},
        DynPinId, FunctionSioInput, FunctionSioOutput, FunctionSpi, Interrupt, Pin, Pins,
        PullDown, PullUp,
    },
    pac::{self, interrupt},
    spi::Enabled,
    timer::{Alarm, Alarm0},
    Clock, Sio, Spi, Timer, Watchdog,
};

/// Second-stage bootloader, from [rp2040-boot2](https://docs.rs/rp2040-boot2)
#[link_section = ".boot2"]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;
/// External high-speed crystal on the pico board is 12Mhz
pub const XOSC_FREQ_HZ: u32 = 12_000_000;
/// SPI clock towards the converter
pub const SPI_FREQ_HZ: u32 = 4_000_000;
/// Converter power-up time before its reset pulse
pub const CONVERTER_POWER_UP_MS: u32 = 100;
/// Scheduler period
const TICK_PERIOD: MicrosDurationU32 = MicrosDurationU32::micros(500);

/// MOSI, MISO and SCK of SPI0
type SpiPins = (
    Pin<Gpio19, FunctionSpi, PullDown>,
    Pin<Gpio16, FunctionSpi, PullDown>,
    Pin<Gpio18, FunctionSpi, PullDown>,
);
/// Push-pull output
type OutPin = Pin<DynPinId, FunctionSioOutput, PullDown>;
/// Pulled-up input
type InPin = Pin<DynPinId, FunctionSioInput, PullUp>;
/// The board as wired on the RP2040
type FirmwareBoard = HalBoard<Spi<Enabled, pac::SPI0, SpiPins, 8>, OutPin, InPin>;

/// Device shared by the interrupt handlers
static DEVICE: SharedDevice<FirmwareBoard> = SharedDevice::new();
/// Scheduler alarm, re-armed on every tick
static SCHEDULER: Mutex<RefCell<Option<Alarm0>>> = Mutex::new(RefCell::new(None));

/// Bring up the board, then sleep between interrupts
#[entry]
fn main() -> ! {
    info!("Analog input startup");
    let mut pac = pac::Peripherals::take().unwrap();
    let core = pac::CorePeripherals::take().unwrap();
    let mut watchdog = Watchdog::new(pac.WATCHDOG);
    let sio = Sio::new(pac.SIO);

    let clocks = init_clocks_and_plls(
        XOSC_FREQ_HZ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .ok()
    .unwrap();
    let mut delay = cortex_m::delay::Delay::new(core.SYST, clocks.system_clock.freq().to_Hz());
    let pins = Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    // Converter
    let spi_pins: SpiPins = (
        pins.gpio19.into_function(),
        pins.gpio16.into_function(),
        pins.gpio18.into_function(),
    );
    let spi = Spi::<_, _, _, 8>::new(pac.SPI0, spi_pins).init(
        &mut pac.RESETS,
        clocks.peripheral_clock.freq(),
        SPI_FREQ_HZ.Hz(),
        embedded_hal::spi::MODE_0,
    );
    let mut busy: InPin = pins.gpio20.into_pull_up_input().into_dyn_pin();
    busy.set_interrupt_enabled(Interrupt::EdgeLow, true);
    let converter = Converter::new(
        spi,
        [
            pins.gpio6.into_push_pull_output().into_dyn_pin(),
            pins.gpio7.into_push_pull_output().into_dyn_pin(),
        ],
        pins.gpio17.into_push_pull_output().into_dyn_pin(),
        busy,
    )
    .unwrap();

    // Converter needs 100 ms after power-up before it accepts a reset
    delay.delay_ms(CONVERTER_POWER_UP_MS);
    let mut reset = pins.gpio22.into_push_pull_output();
    reset.set_high().unwrap();
    delay.delay_us(1);
    reset.set_low().unwrap();

    let mut input: InPin = pins.gpio21.into_pull_up_input().into_dyn_pin();
    input.set_interrupt_enabled(Interrupt::EdgeHigh, true);
    input.set_interrupt_enabled(Interrupt::EdgeLow, true);

    let board = HalBoard::new(
        converter,
        [
            pins.gpio2.into_push_pull_output().into_dyn_pin(),
            pins.gpio3.into_push_pull_output().into_dyn_pin(),
            pins.gpio4.into_push_pull_output().into_dyn_pin(),
            pins.gpio5.into_push_pull_output().into_dyn_pin(),
        ],
        input,
        [
            pins.gpio10.into_push_pull_output().into_dyn_pin(),
            pins.gpio11.into_push_pull_output().into_dyn_pin(),
            pins.gpio12.into_push_pull_output().into_dyn_pin(),
        ],
        pins.gpio13.into_push_pull_output().into_dyn_pin(),
    );
    let mut device = Device::new(board);
    device
        .init()
        .unwrap_or_else(|err| error!("Unable to apply reset registers: {}", err));
    DEVICE.init(device);

    // Scheduler
    let mut timer = Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);
    let mut alarm = timer.alarm_0().unwrap();
    alarm.schedule(TICK_PERIOD).unwrap();
    alarm.enable_interrupt();
    debug!("critical_section: init scheduler alarm");
    critical_section::with(|cs| SCHEDULER.replace(cs, Some(alarm)));

    info!("Initialization complete");
    unsafe {
        pac::NVIC::unmask(pac::Interrupt::TIMER_IRQ_0);
        pac::NVIC::unmask(pac::Interrupt::IO_IRQ_BANK0);
    }
    loop {
        // All functionality in interrupts
        cortex_m::asm::wfi();
    }
}

/// 500 µs scheduler tick. Odd ticks are the half-millisecond hook, even ticks the millisecond
/// hook, and every [`TICKS_PER_SECOND`] ticks a new second starts.
#[interrupt]
fn TIMER_IRQ_0() {
    static mut TICKS: u16 = 0;

    critical_section::with(|cs| {
        if let Some(alarm) = SCHEDULER.borrow_ref_mut(cs).as_mut() {
            alarm.clear_interrupt();
            if alarm.schedule(TICK_PERIOD).is_err() {
                warn!("Unable to re-arm scheduler alarm");
            }
        }
    });

    *TICKS += 1;
    let tick = *TICKS;
    if tick == TICKS_PER_SECOND {
        *TICKS = 0;
    }

    DEVICE.with(|device| {
        let result = if tick % 2 == 1 {
            device.on_tick_500us()
        } else {
            device.on_tick_1ms()
        };
        if let Err(err) = result {
            error!("Scheduler tick failed: {}", err);
        }
        if tick == TICKS_PER_SECOND {
            device.on_new_second();
        }
    });
}

/// BUSY falling edge and DI0 edges
#[interrupt]
fn IO_IRQ_BANK0() {
    DEVICE.with(|device| {
        let busy = device.board_mut().busy_pin();
        if busy.interrupt_status(Interrupt::EdgeLow) {
            busy.clear_interrupt(Interrupt::EdgeLow);
            if let Err(err) = device.on_busy_edge() {
                error!("Unable to read conversion: {}", err);
            }
        }

        let input = device.board_mut().input_pin();
        let mut edge = false;
        for kind in [Interrupt::EdgeHigh, Interrupt::EdgeLow] {
            if input.interrupt_status(kind) {
                input.clear_interrupt(kind);
                edge = true;
            }
        }
        if edge {
            if let Err(err) = device.on_input_edge() {
                error!("Unable to sample DI0: {}", err);
            }
        }
    });
}
