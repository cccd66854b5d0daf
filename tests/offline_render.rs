use dual_opamp::trace::render_offline;
use dual_opamp::{DualOpAmp, SimConfig, Simulation};

fn triangle(t_us: u64) -> f32 {
    let phase = (t_us / 1000) % 10;
    if phase < 5 {
        phase as f32
    } else {
        (10 - phase) as f32
    }
}

fn capture() -> dual_opamp::trace::Trace {
    let config = SimConfig::default()
        .with_attr("gainA", 0.5)
        .with_attr("offsetA", 0.0)
        .with_attr("gainB", -0.5)
        .with_attr("offsetB", 5.0);
    let mut sim = Simulation::<DualOpAmp>::boot(config).unwrap();
    render_offline(&mut sim, &["OUTA", "OUTB"], 20_000, |t, host| {
        host.drive("INA+", triangle(t));
        host.drive("INB+", triangle(t));
    })
    .unwrap()
}

#[test]
fn offline_render_determinism() {
    assert_eq!(capture(), capture(), "Offline renders should be identical");
}

#[test]
fn offline_render_inverting_pair() {
    let trace = capture();
    assert_eq!(trace.len(), 20);
    let a = trace.channel("OUTA").unwrap();
    let b = trace.channel("OUTB").unwrap();
    for (i, (&va, &vb)) in a.iter().zip(b).enumerate() {
        assert_eq!(va + vb, 5.0, "sample {} should mirror around mid-rail", i);
    }
    assert_eq!(a.iter().cloned().fold(f32::MIN, f32::max), 2.5);
}

#[test]
fn offline_render_writes_wav() {
    let trace = capture();
    let path = std::env::temp_dir().join(format!("dual-opamp-{}.wav", std::process::id()));
    trace.write_wav(&path).unwrap();

    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.spec().channels, 2);
    assert_eq!(reader.spec().sample_rate, 1000);
    assert_eq!(reader.len() as usize, trace.len() * 2);
    std::fs::remove_file(&path).unwrap();
}
