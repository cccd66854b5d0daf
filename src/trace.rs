//! Offline capture of pin waveforms.
//!
//! `render_offline` runs a simulation for a stretch of simulated time and
//! samples the probed pins right after every timer delivery. The resulting
//! [`Trace`] can be exported as a float WAV, one channel per probe.

use crate::chip::Chip;
use crate::error::{ChipError, ChipResult};
use crate::host::PinId;
use crate::invariant_ppt::{assert_invariant, TRACE_ALIGNED};
use crate::sim::{SimHost, Simulation};
use std::io::{Seek, Write};
use std::path::Path;
use tracing::debug;

/// Sample rate reported when a trace is too short to measure one.
pub const FALLBACK_SAMPLE_RATE_HZ: u32 = 1000;

/// Samples captured from one pin.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceChannel {
    pub name: String,
    pub samples: Vec<f32>,
}

/// A multi-pin capture.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Trace {
    /// Simulated time of each sample, in microseconds.
    pub times_us: Vec<u64>,
    pub channels: Vec<TraceChannel>,
}

impl Trace {
    pub fn len(&self) -> usize {
        self.times_us.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times_us.is_empty()
    }

    /// Samples of a probed pin.
    pub fn channel(&self, name: &str) -> Option<&[f32]> {
        self.channels
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.samples.as_slice())
    }

    /// Rate implied by the first sample interval.
    pub fn sample_rate_hz(&self) -> u32 {
        match self.times_us.as_slice() {
            [first, second, ..] if second > first => {
                (1_000_000 / (second - first)).clamp(1, u64::from(u32::MAX)) as u32
            }
            _ => FALLBACK_SAMPLE_RATE_HZ,
        }
    }

    /// Export as a 32-bit float WAV file.
    pub fn write_wav(&self, path: impl AsRef<Path>) -> ChipResult<()> {
        let file = std::io::BufWriter::new(std::fs::File::create(path.as_ref())?);
        self.write_wav_to(file)?;
        debug!(
            "Wrote {} samples x {} channels to {}",
            self.len(),
            self.channels.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Export as a 32-bit float WAV stream.
    pub fn write_wav_to<W: Write + Seek>(&self, writer: W) -> ChipResult<()> {
        if self.channels.is_empty() {
            return Err(ChipError::EmptyTrace);
        }
        if let Some(channel) = self.channels.iter().find(|c| c.samples.len() != self.len()) {
            return Err(ChipError::MisalignedTrace {
                channel: channel.name.clone(),
                samples: channel.samples.len(),
                expected: self.len(),
            });
        }
        let spec = hound::WavSpec {
            channels: self.channels.len() as u16,
            sample_rate: self.sample_rate_hz(),
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut wav = hound::WavWriter::new(writer, spec)?;
        for i in 0..self.len() {
            for channel in &self.channels {
                wav.write_sample(channel.samples[i])?;
            }
        }
        wav.finalize()?;
        Ok(())
    }
}

/// Run `sim` for `duration_us` and capture the probed pins after every tick.
///
/// `stimulus` runs before each tick with the tick's due time, so it can
/// drive inputs or edit attributes the way an external circuit or a user would.
/// If it stops or moves a timer, only expiries that still land inside the
/// window are delivered and sampled.
pub fn render_offline<C, F>(
    sim: &mut Simulation<C>,
    probes: &[&str],
    duration_us: u64,
    mut stimulus: F,
) -> ChipResult<Trace>
where
    C: Chip,
    F: FnMut(u64, &mut SimHost),
{
    let pins: Vec<PinId> = probes
        .iter()
        .map(|name| {
            sim.host()
                .pin(name)
                .ok_or_else(|| ChipError::UnknownProbe(name.to_string()))
        })
        .collect::<ChipResult<_>>()?;

    let mut trace = Trace {
        times_us: Vec::new(),
        channels: probes
            .iter()
            .map(|name| TraceChannel {
                name: name.to_string(),
                samples: Vec::new(),
            })
            .collect(),
    };

    let end = sim.now_us().saturating_add(duration_us);
    while let Some(due) = sim.next_tick_us().filter(|&due| due <= end) {
        stimulus(due, sim.host_mut());
        if sim.step_until(end).is_none() {
            continue;
        }
        trace.times_us.push(sim.now_us());
        for (channel, &pin) in trace.channels.iter_mut().zip(&pins) {
            let level = sim.host().pin_voltage(pin).unwrap_or_default();
            channel.samples.push(level);
        }
    }
    sim.run_for(end.saturating_sub(sim.now_us()));

    assert_invariant(
        TRACE_ALIGNED,
        trace
            .channels
            .iter()
            .all(|c| c.samples.len() == trace.times_us.len()),
        "Every probe has one sample per tick",
        Some("render_offline"),
    );
    Ok(trace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opamp::DualOpAmp;
    use crate::sim::SimConfig;
    use crate::host::Host;
    use std::io::Cursor;

    fn booted() -> Simulation<DualOpAmp> {
        Simulation::boot(SimConfig::default()).unwrap()
    }

    #[test]
    fn capture_has_one_sample_per_tick() {
        let mut sim = booted();
        let trace = render_offline(&mut sim, &["OUTA", "OUTB"], 5_000, |_, _| {}).unwrap();
        assert_eq!(trace.times_us, vec![1000, 2000, 3000, 4000, 5000]);
        assert_eq!(trace.channel("OUTA"), Some(&[2.5f32; 5][..]));
        assert_eq!(trace.channel("OUTB"), Some(&[2.5f32; 5][..]));
        assert_eq!(trace.sample_rate_hz(), 1000);
        assert_eq!(sim.now_us(), 5_000);
    }

    #[test]
    fn stimulus_runs_before_each_tick() {
        let mut sim = booted();
        let trace = render_offline(&mut sim, &["OUTA"], 3_000, |t, host| {
            host.drive("INA+", t as f32 / 1000.0);
        })
        .unwrap();
        // 1 V, 2 V, 3 V in, unity gain plus 2.5 V offset, clipped at 5 V.
        assert_eq!(trace.channel("OUTA"), Some(&[3.5f32, 4.5, 5.0][..]));
    }

    #[test]
    fn partial_window_advances_clock() {
        let mut sim = booted();
        let trace = render_offline(&mut sim, &["OUTA"], 2_500, |_, _| {}).unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(sim.now_us(), 2_500);
    }

    #[test]
    fn unknown_probe_is_rejected() {
        let mut sim = booted();
        let err = render_offline(&mut sim, &["VCC"], 1_000, |_, _| {}).unwrap_err();
        assert!(matches!(err, ChipError::UnknownProbe(ref n) if n == "VCC"));
        assert_eq!(sim.deliveries(), 0);
    }

    #[test]
    fn empty_trace_has_fallback_rate_and_cannot_export() {
        let trace = Trace::default();
        assert!(trace.is_empty());
        assert_eq!(trace.sample_rate_hz(), FALLBACK_SAMPLE_RATE_HZ);
        let err = trace.write_wav_to(Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, ChipError::EmptyTrace));
    }

    #[test]
    fn stimulus_stopping_the_timer_records_nothing() {
        let mut sim = booted();
        let timer = sim.chip().timer();
        let trace = render_offline(&mut sim, &["OUTA"], 3_000, |_, host| {
            host.timer_stop(timer).unwrap();
        })
        .unwrap();
        assert!(trace.is_empty());
        assert_eq!(trace.channel("OUTA").map(<[f32]>::len), Some(0));
        assert_eq!(sim.deliveries(), 0);
        assert_eq!(sim.now_us(), 3_000);
    }

    #[test]
    fn stimulus_rearming_past_window_stops_capture() {
        let mut sim = booted();
        let timer = sim.chip().timer();
        let trace = render_offline(&mut sim, &["OUTA"], 3_000, |t, host| {
            if t == 2_000 {
                host.timer_start(timer, 5_000, true).unwrap();
            }
        })
        .unwrap();
        assert_eq!(trace.times_us, vec![1_000]);
        assert_eq!(sim.deliveries(), 1);
        assert_eq!(sim.now_us(), 3_000);
        assert_eq!(sim.next_tick_us(), Some(6_000));
    }

    #[test]
    fn stimulus_rearming_inside_window_samples_actual_tick() {
        let mut sim = booted();
        let timer = sim.chip().timer();
        let trace = render_offline(&mut sim, &["OUTA"], 4_000, |t, host| {
            if t == 1_000 {
                host.timer_start(timer, 2_500, true).unwrap();
            }
        })
        .unwrap();
        assert_eq!(trace.times_us, vec![2_500]);
        assert_eq!(trace.channel("OUTA"), Some(&[2.5f32][..]));
    }

    #[test]
    fn misaligned_trace_is_rejected_on_export() {
        let trace = Trace {
            times_us: vec![1_000, 2_000],
            channels: vec![TraceChannel {
                name: "OUTA".to_string(),
                samples: vec![1.0],
            }],
        };
        let err = trace.write_wav_to(Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(
            err,
            ChipError::MisalignedTrace { ref channel, samples: 1, expected: 2 } if channel == "OUTA"
        ));
    }

    #[test]
    fn wav_export_interleaves_probes() {
        let mut sim = booted();
        sim.host_mut().drive("INB-", 1.0);
        let trace = render_offline(&mut sim, &["OUTA", "OUTB"], 2_000, |_, _| {}).unwrap();

        let mut bytes = Cursor::new(Vec::new());
        trace.write_wav_to(&mut bytes).unwrap();

        let reader = hound::WavReader::new(Cursor::new(bytes.into_inner())).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 1000);
        assert_eq!(spec.sample_format, hound::SampleFormat::Float);
        let samples: Vec<f32> = reader.into_samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![2.5, 1.5, 2.5, 1.5]);
    }
}
