//! Ideal dual operational amplifier.
//!
//! Two independent differential stages, A and B. Each stage samples its
//! `+`/`-` inputs once per tick and drives
//! `(plus - minus) * gain + offset` on its output. Gain and offset are host
//! attributes, so users can retune them while the simulation runs.

#![forbid(unsafe_code)]

mod stage;

pub use stage::{transfer, ChannelInputs, ChannelParams};

use crate::chip::Chip;
use crate::error::ChipResult;
use crate::host::{AttrId, Host, PinId, PinMode, TimerId};
use crate::invariant_ppt::{assert_invariant, ATTRS_REGISTERED, PINS_REGISTERED};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Evaluation period: 1 kHz.
pub const TICK_PERIOD_US: u32 = 1000;
/// Gain both channels start with.
pub const DEFAULT_GAIN: f32 = 1.0;
/// Output offset both channels start with, in volts.
pub const DEFAULT_OFFSET: f32 = 2.5;

/// One of the two amplifier stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    A,
    B,
}

impl Channel {
    /// Both channels, in registration order.
    pub const ALL: [Channel; 2] = [Channel::A, Channel::B];

    /// Position in [`Channel::ALL`].
    pub const fn index(self) -> usize {
        match self {
            Channel::A => 0,
            Channel::B => 1,
        }
    }

    /// Name of the stage's output pin.
    pub const fn output_pin(self) -> &'static str {
        match self {
            Channel::A => "OUTA",
            Channel::B => "OUTB",
        }
    }

    /// Name of the non-inverting input pin.
    pub const fn plus_pin(self) -> &'static str {
        match self {
            Channel::A => "INA+",
            Channel::B => "INB+",
        }
    }

    /// Name of the inverting input pin.
    pub const fn minus_pin(self) -> &'static str {
        match self {
            Channel::A => "INA-",
            Channel::B => "INB-",
        }
    }

    /// Name of the gain attribute.
    pub const fn gain_attr(self) -> &'static str {
        match self {
            Channel::A => "gainA",
            Channel::B => "gainB",
        }
    }

    /// Name of the offset attribute, in volts.
    pub const fn offset_attr(self) -> &'static str {
        match self {
            Channel::A => "offsetA",
            Channel::B => "offsetB",
        }
    }
}

/// Host handles owned by one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChannelPorts {
    out: PinId,
    plus: PinId,
    minus: PinId,
    gain: AttrId,
    offset: AttrId,
}

/// Persistent context of a loaded dual op-amp.
///
/// Holds only handles; the host owns the pins, attributes and timer. The
/// handles are fixed at `init` and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DualOpAmp {
    channels: [ChannelPorts; 2],
    timer: TimerId,
}

impl DualOpAmp {
    /// The repeating timer that drives evaluation.
    pub fn timer(&self) -> TimerId {
        self.timer
    }

    /// Output pin handle for a channel.
    pub fn output(&self, channel: Channel) -> PinId {
        self.channels[channel.index()].out
    }

    /// `(plus, minus)` input pin handles for a channel.
    pub fn inputs(&self, channel: Channel) -> (PinId, PinId) {
        let ports = &self.channels[channel.index()];
        (ports.plus, ports.minus)
    }

    /// `(gain, offset)` attribute handles for a channel.
    pub fn params(&self, channel: Channel) -> (AttrId, AttrId) {
        let ports = &self.channels[channel.index()];
        (ports.gain, ports.offset)
    }
}

impl Chip for DualOpAmp {
    fn init<H: Host>(host: &mut H) -> ChipResult<Self> {
        // Pins for both stages first, then attributes, matching the part's pinout order.
        let mut pins = [[PinId(0); 3]; 2];
        for channel in Channel::ALL {
            let slot = &mut pins[channel.index()];
            slot[0] = host.pin_init(channel.output_pin(), PinMode::Analog)?;
            slot[1] = host.pin_init(channel.plus_pin(), PinMode::Analog)?;
            slot[2] = host.pin_init(channel.minus_pin(), PinMode::Analog)?;
            debug!(
                "Registered channel {:?} pins: out={:?} plus={:?} minus={:?}",
                channel, slot[0], slot[1], slot[2]
            );
        }
        let distinct_pins: BTreeSet<PinId> = pins.iter().flatten().copied().collect();
        assert_invariant(
            PINS_REGISTERED,
            distinct_pins.len() == 6,
            "Six distinct analog pins registered",
            Some("DualOpAmp::init"),
        );

        let mut attrs = [[AttrId(0); 2]; 2];
        for channel in Channel::ALL {
            let slot = &mut attrs[channel.index()];
            slot[0] = host.attr_init_float(channel.gain_attr(), DEFAULT_GAIN)?;
            slot[1] = host.attr_init_float(channel.offset_attr(), DEFAULT_OFFSET)?;
        }
        let distinct_attrs: BTreeSet<AttrId> = attrs.iter().flatten().copied().collect();
        assert_invariant(
            ATTRS_REGISTERED,
            distinct_attrs.len() == 4,
            "Four distinct float attributes registered",
            Some("DualOpAmp::init"),
        );

        let channels = Channel::ALL.map(|channel| {
            let [out, plus, minus] = pins[channel.index()];
            let [gain, offset] = attrs[channel.index()];
            ChannelPorts {
                out,
                plus,
                minus,
                gain,
                offset,
            }
        });

        let timer = host.timer_init()?;
        host.timer_start(timer, TICK_PERIOD_US, true)?;

        let chip = Self { channels, timer };
        info!(
            "Dual op-amp loaded: evaluating every {} us via {:?}",
            TICK_PERIOD_US, timer
        );
        Ok(chip)
    }

    fn on_timer<H: Host>(&self, host: &mut H, timer: TimerId) {
        if timer == self.timer {
            self.tick(host);
        }
    }
}
