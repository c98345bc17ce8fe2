//! Firmware core for a four-channel, 16-bit analog input board with one digital input and four
//! digital outputs, built for the [RP2040](https://docs.rs/rp2040-hal).
//!
//! The host configures the device through a bank of numbered registers ([`registers`]). Once
//! acquisition is started, a 500 µs scheduler starts conversions at 1 kHz or 2 kHz; each
//! completed conversion is published to the host and fed through per-output debounced
//! thresholds ([`threshold`]) that drive the digital outputs. DI0 can start, stop or trigger
//! acquisition ([`input`]), and DO0 can toggle each second or emit timed pulses ([`output`]).
//!
//! Everything hardware-facing goes through the [`components::Board`] trait, so the core runs
//! (and is tested) on the host.
//!
//! ## Crate features
//!
//! - `rp2040`: Builds the firmware binary for the RP2040, with [`defmt`](https://docs.rs/defmt)
//!   logging over RTT.
//! - `defmt`: Logs through `defmt`, and derives `defmt::Format` on the public enums.
//! - `log`: Logs through the [`log`](https://docs.rs/log) facade instead. Ignored when `defmt`
//!   is enabled.
//! - `trace_samples`: Logs every converted sample at trace level. Very noisy!
//!
//! ## Demo
//!
//! ```
//! use analog_input::{
//!     components::{Board, HardwareError},
//!     device::Device,
//!     output::OutputLine,
//!     registers::{Event, FrontEnd, Register, RegisterValue},
//! };
//!
//! /// Converter that always reads mid-scale on channel 1
//! struct Bench;
//!
//! impl Board for Bench {
//!     fn set_convert_start(&mut self, _: bool) -> Result<(), HardwareError> { Ok(()) }
//!     fn set_output(&mut self, _: OutputLine, _: bool) -> Result<(), HardwareError> { Ok(()) }
//!     fn input_level(&mut self) -> Result<bool, HardwareError> { Ok(false) }
//!     fn converter_busy(&mut self) -> Result<bool, HardwareError> { Ok(false) }
//!     fn read_conversion(&mut self, samples: &mut [i16; 4]) -> Result<(), HardwareError> {
//!         *samples = [0, 16_384, 0, 0];
//!         Ok(())
//!     }
//!     fn apply_front_end(&mut self, _: FrontEnd) -> Result<(), HardwareError> { Ok(()) }
//! }
//!
//! let mut device = Device::new(Bench);
//! device.init().unwrap();
//! device
//!     .write_register(Register::Start.address(), RegisterValue::U8(1))
//!     .unwrap();
//!
//! device.on_tick_1ms().unwrap();
//! device.on_busy_edge().unwrap();
//! let message = device.take_event().unwrap();
//! assert_eq!(message.event, Event::AnalogInputs);
//! assert_eq!(message.value, RegisterValue::I16Array([0, 16_384, 0, 0]));
//! assert_eq!(
//!     device.read_register(Register::AnalogInputs.address()),
//!     Ok(RegisterValue::I16Array([0, 16_384, 0, 0]))
//! );
//! ```

// Copyright 2026 analog_input developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), feature(doc_auto_cfg), feature(doc_cfg_hide))]

// Must come first so the logging macros are visible to every module below
mod fmt;

pub mod acquisition;
pub mod components;
pub mod device;
pub mod input;
pub mod interrupt;
pub mod output;
pub mod registers;
pub mod threshold;
