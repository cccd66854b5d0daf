//! Host capability surface consumed by simulated chips.
//!
//! A chip never owns pins, attributes or timers. It registers them by name
//! with the host and keeps the opaque handles the host hands back. All I/O
//! afterwards goes through those handles.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use crate::error::HostError;

/// Opaque handle to a registered pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PinId(pub u32);

/// Opaque handle to a registered attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttrId(pub u32);

/// Opaque handle to a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u32);

/// How a pin is driven.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    /// Digital input, floating.
    Input,
    /// Digital output.
    Output,
    /// Digital input with pull-up.
    InputPullup,
    /// Digital input with pull-down.
    InputPulldown,
    /// Analog pin: sampled by the ADC and driven by the DAC.
    Analog,
}

/// Services a simulator offers to a chip.
///
/// Registration is fallible; reads and writes are not. Out-of-range analog
/// values are the host's to clamp on both directions.
pub trait Host {
    /// Register a pin by name.
    fn pin_init(&mut self, name: &str, mode: PinMode) -> Result<PinId, HostError>;

    /// Sample the voltage currently present on a pin.
    fn pin_adc_read(&self, pin: PinId) -> f32;

    /// Drive a pin to `voltage`, clamped to the host's rails.
    fn pin_dac_write(&mut self, pin: PinId, voltage: f32);

    /// Register a float attribute with its default value.
    fn attr_init_float(&mut self, name: &str, default: f32) -> Result<AttrId, HostError>;

    /// Current value of an attribute, including live user edits.
    fn attr_read_float(&self, attr: AttrId) -> f32;

    /// Allocate a timer whose expirations are delivered to the owning chip.
    fn timer_init(&mut self) -> Result<TimerId, HostError>;

    /// Arm a timer to fire after `period_us` microseconds, repeatedly if `repeat`.
    fn timer_start(&mut self, timer: TimerId, period_us: u32, repeat: bool)
        -> Result<(), HostError>;

    /// Disarm a timer.
    fn timer_stop(&mut self, timer: TimerId) -> Result<(), HostError>;
}
