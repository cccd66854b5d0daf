//! Sweep channel A through a ramp with a live gain change and dump both
//! outputs to `scope.wav`, next to a generated `chip.json`.

use dual_opamp::manifest::ChipManifest;
use dual_opamp::trace::render_offline;
use dual_opamp::{ChipResult, DualOpAmp, SimConfig, Simulation};

fn main() -> ChipResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    let mut sim = Simulation::<DualOpAmp>::boot(config)?;

    let manifest = ChipManifest::dual_opamp();
    manifest.validate(sim.host())?;
    manifest.save("chip.json")?;

    let trace = render_offline(&mut sim, &["OUTA", "OUTB"], 2_000_000, |t, host| {
        let ramp = (t % 1_000_000) as f32 / 1_000_000.0 * 5.0;
        host.drive("INA+", ramp);
        host.drive("INB+", 5.0 - ramp);
        if t == 1_000_000 {
            host.set_attr("gainA", 2.0);
        }
    })?;
    trace.write_wav("scope.wav")?;

    println!(
        "Captured {} samples at {} Hz; final OUTA = {:?} V",
        trace.len(),
        trace.sample_rate_hz(),
        trace.channel("OUTA").and_then(|s| s.last())
    );
    Ok(())
}
