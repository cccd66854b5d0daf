//! Per-tick evaluation of the two amplifier stages.

// Runs on every timer tick: no invariant logging, no allocation, no clamping.

use super::{Channel, ChannelPorts, DualOpAmp, DEFAULT_GAIN, DEFAULT_OFFSET};
use crate::host::Host;

/// Differential input voltages of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelInputs {
    pub plus: f32,
    pub minus: f32,
}

/// Transfer parameters of one stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelParams {
    pub gain: f32,
    /// Added to the amplified difference, in volts.
    pub offset: f32,
}

impl Default for ChannelParams {
    fn default() -> Self {
        Self {
            gain: DEFAULT_GAIN,
            offset: DEFAULT_OFFSET,
        }
    }
}

/// Ideal differential stage: `(plus - minus) * gain + offset`.
///
/// The result is unclamped; limiting to the supply rails is the host's job.
#[inline]
pub fn transfer(inputs: ChannelInputs, params: ChannelParams) -> f32 {
    (inputs.plus - inputs.minus) * params.gain + params.offset
}

impl ChannelPorts {
    fn sample<H: Host>(&self, host: &H) -> (ChannelInputs, ChannelParams) {
        let inputs = ChannelInputs {
            plus: host.pin_adc_read(self.plus),
            minus: host.pin_adc_read(self.minus),
        };
        let params = ChannelParams {
            gain: host.attr_read_float(self.gain),
            offset: host.attr_read_float(self.offset),
        };
        (inputs, params)
    }
}

impl DualOpAmp {
    /// Output voltages of both stages, indexed by [`Channel::index`].
    ///
    /// Pure: no host involved, so it can be checked without a simulator.
    #[inline]
    pub fn evaluate(inputs: [ChannelInputs; 2], params: [ChannelParams; 2]) -> [f32; 2] {
        [
            transfer(inputs[0], params[0]),
            transfer(inputs[1], params[1]),
        ]
    }

    /// Sample every input and parameter, then drive both outputs.
    pub fn tick<H: Host>(&self, host: &mut H) {
        let (in_a, params_a) = self.channels[Channel::A.index()].sample(host);
        let (in_b, params_b) = self.channels[Channel::B.index()].sample(host);

        let outputs = Self::evaluate([in_a, in_b], [params_a, params_b]);

        for channel in Channel::ALL {
            host.pin_dac_write(self.channels[channel.index()].out, outputs[channel.index()]);
        }
    }
}
