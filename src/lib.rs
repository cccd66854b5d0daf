//! Ideal dual op-amp peripheral for timer-driven circuit simulators.
//!
//! The chip registers its pins and attributes with a [`host::Host`], arms a
//! 1 kHz timer, and on every tick drives each output to
//! `(plus - minus) * gain + offset`. [`sim`] provides an in-process host for
//! running it without an external simulator.

pub mod chip;
pub mod error;
pub mod host;
#[doc(hidden)]
pub mod invariant_ppt;
pub mod manifest;
pub mod opamp;
pub mod sim;
pub mod trace;

pub use chip::Chip;
pub use error::{ChipError, ChipResult, HostError};
pub use host::{AttrId, Host, PinId, PinMode, TimerId};
pub use opamp::{Channel, ChannelInputs, ChannelParams, DualOpAmp};
pub use sim::{SimConfig, SimHost, Simulation};
