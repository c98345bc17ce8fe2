//! Interrupt-safe ownership of the [`Device`], behind a static [`Mutex`].
//!
//! The timer, GPIO and host paths all run [`Device`] hooks. Each one enters a critical section
//! through [`SharedDevice::with`], so hooks never interleave.

use core::cell::RefCell;
use critical_section::Mutex;

use crate::{components::Board, device::Device};

/// Slot for the device, shared between interrupt handlers
pub struct SharedDevice<B> {
    /// The device, once [`SharedDevice::init`] has run
    device: Mutex<RefCell<Option<Device<B>>>>,
}

impl<B: Board> Default for SharedDevice<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Board> SharedDevice<B> {
    /// Empty slot, usable in a `static`
    pub const fn new() -> Self {
        Self {
            device: Mutex::new(RefCell::new(None)),
        }
    }

    /// Move `device` into the slot, replacing any previous one
    pub fn init(&self, device: Device<B>) {
        debug!("critical_section: init device");
        critical_section::with(|cs| {
            self.device.replace(cs, Some(device));
        });
    }

    /// Run `f` on the device inside a critical section.
    ///
    /// Returns `None` if the slot is still empty.
    pub fn with<R>(&self, f: impl FnOnce(&mut Device<B>) -> R) -> Option<R> {
        critical_section::with(|cs| {
            let mut slot = self.device.borrow_ref_mut(cs);
            slot.as_mut().map(f)
        })
    }
}
