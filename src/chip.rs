//! Trait-based chip definitions.

#![forbid(unsafe_code)]

use crate::error::ChipResult;
use crate::host::{Host, TimerId};

/// A simulated peripheral driven by a host.
///
/// `init` runs once at load time and returns the chip's persistent context.
/// The host then hands that context back on every timer expiry.
pub trait Chip: Sized + 'static {
    /// Register pins, attributes and timers with the host.
    fn init<H: Host>(host: &mut H) -> ChipResult<Self>;

    /// Handle the expiry of one of the chip's timers.
    fn on_timer<H: Host>(&self, host: &mut H, timer: TimerId);
}
