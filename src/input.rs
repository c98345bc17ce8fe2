//! Edge classification for digital input 0.
//!
//! The classifier only sees raw levels. It remembers the last one and turns a change into an
//! action according to the configured [`InputMode`]. No debouncing happens here: each level
//! change is acted on once, and a steady level is never acted on twice.

use crate::registers::InputMode;

/// Direction of a level change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// Low to high
    Rising,
    /// High to low
    Falling,
}

/// What a DI0 edge asks the device to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputAction {
    /// Report the new level to the host
    Report,
    /// Enable acquisition
    StartAcquisition,
    /// Disable acquisition
    StopAcquisition,
    /// Start a single conversion
    CatchSample,
}

/// Previous-level tracker for DI0
#[derive(Debug, Default)]
pub struct EdgeClassifier {
    /// Last observed level, `None` until the first observation
    previous: Option<bool>,
}

impl EdgeClassifier {
    /// Classifier that has not seen the line yet
    pub const fn new() -> Self {
        Self { previous: None }
    }

    /// Last observed level
    pub fn level(&self) -> Option<bool> {
        self.previous
    }

    /// Record `level` and return the edge it forms with the previous observation.
    ///
    /// The first observation only seeds the tracker.
    pub fn observe(&mut self, level: bool) -> Option<Edge> {
        let previous = self.previous.replace(level)?;
        match (previous, level) {
            (false, true) => Some(Edge::Rising),
            (true, false) => Some(Edge::Falling),
            _ => None,
        }
    }

    /// Record `level` and return the action its edge means in `mode`
    pub fn classify(&mut self, level: bool, mode: InputMode) -> Option<InputAction> {
        let edge = self.observe(level)?;
        match (mode, edge) {
            (InputMode::Sync, _) => Some(InputAction::Report),
            (InputMode::RiseStartsAcquisition, Edge::Rising)
            | (InputMode::FallStartsAcquisition, Edge::Falling) => {
                Some(InputAction::StartAcquisition)
            }
            (InputMode::RiseStartsAcquisition, Edge::Falling)
            | (InputMode::FallStartsAcquisition, Edge::Rising) => {
                Some(InputAction::StopAcquisition)
            }
            (InputMode::RiseCatchesSample, Edge::Rising) => Some(InputAction::CatchSample),
            (InputMode::RiseCatchesSample, Edge::Falling) => None,
        }
    }
}
