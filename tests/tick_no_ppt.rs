use std::fs;
use std::path::Path;

/// The per-tick evaluator must stay off the invariant log, which takes a Mutex.
#[test]
fn evaluator_does_not_call_assert_invariant() {
    let stage_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("src")
        .join("opamp")
        .join("stage.rs");
    let src = fs::read_to_string(stage_path).expect("failed to read stage.rs");
    assert!(
        !src.contains("assert_invariant("),
        "Tick paths must not call assert_invariant (acquires Mutex)."
    );
    assert!(
        !src.contains("invariant_ppt"),
        "Tick paths must not depend on the invariant log."
    );
}
