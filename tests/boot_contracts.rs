//! Contract check over a full boot, capture and manifest validation.
//!
//! Kept as the only test in this binary so nothing else clears or races the
//! shared invariant log.

use dual_opamp::invariant_ppt::{
    clear_invariant_log, contract_test, ATTRS_REGISTERED, CONFIG_RAILS_ORDERED,
    MANIFEST_CONSISTENT, PINS_REGISTERED, TIMER_ARMED, TRACE_ALIGNED,
};
use dual_opamp::manifest::ChipManifest;
use dual_opamp::trace::render_offline;
use dual_opamp::{DualOpAmp, SimConfig, Simulation};

#[test]
fn boot_capture_and_manifest_enforce_invariants() {
    clear_invariant_log();

    let mut sim = Simulation::<DualOpAmp>::boot(SimConfig::default()).unwrap();
    contract_test(
        "chip boot",
        &[
            CONFIG_RAILS_ORDERED,
            PINS_REGISTERED,
            ATTRS_REGISTERED,
            TIMER_ARMED,
        ],
    );

    render_offline(&mut sim, &["OUTA"], 2_000, |_, _| {}).unwrap();
    contract_test("offline capture", &[TRACE_ALIGNED]);

    ChipManifest::dual_opamp().validate(sim.host()).unwrap();
    contract_test("manifest check", &[MANIFEST_CONSISTENT]);
}
