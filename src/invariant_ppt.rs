//! PPT Invariant System: boot-time invariant enforcement with contract tracking.
//!
//! Only load-time code (chip init, simulation boot, manifest checks) asserts
//! invariants here. The log sits behind a `Mutex`, so the tick path stays out.

#[cfg(feature = "ppt")]
use lazy_static::lazy_static;
#[cfg(feature = "ppt")]
use std::collections::HashSet;
#[cfg(feature = "ppt")]
use std::sync::Mutex;

pub const PINS_REGISTERED: u32 = 1;
pub const ATTRS_REGISTERED: u32 = 2;
/// A chip that allocated timers has at least one armed once it has loaded.
pub const TIMER_ARMED: u32 = 3;
pub const CONFIG_RAILS_ORDERED: u32 = 4;
pub const MANIFEST_CONSISTENT: u32 = 5;
pub const TRACE_ALIGNED: u32 = 6;

#[cfg(feature = "ppt")]
lazy_static! {
    static ref INVARIANT_LOG: Mutex<HashSet<u32>> = Mutex::new(HashSet::new());
}

#[cfg(feature = "ppt")]
/// Assert an invariant: logs it and panics on failure.
pub(crate) fn assert_invariant(id: u32, condition: bool, message: &str, context: Option<&str>) {
    if !condition {
        let full_message = if let Some(ctx) = context {
            format!("Invariant {} failed: {} (context: {})", id, message, ctx)
        } else {
            format!("Invariant {} failed: {}", id, message)
        };
        tracing::error!("{}", full_message);
        panic!("{}", full_message);
    }
    // A poisoned log only loses bookkeeping; keep going.
    if let Ok(mut log) = INVARIANT_LOG.lock() {
        log.insert(id);
    }
}

#[cfg(not(feature = "ppt"))]
/// Assert an invariant: checks condition and panics on failure.
pub(crate) fn assert_invariant(_id: u32, condition: bool, message: &str, _context: Option<&str>) {
    if !condition {
        panic!("Invariant failed: {}", message);
    }
}

#[cfg(feature = "ppt")]
/// Contract test: checks that specified invariants were asserted.
pub fn contract_test(test_name: &str, required_invariants: &[u32]) {
    let log = INVARIANT_LOG.lock().unwrap_or_else(|e| e.into_inner());
    let missing: Vec<u32> = required_invariants
        .iter()
        .copied()
        .filter(|inv| !log.contains(inv))
        .collect();
    drop(log);
    if !missing.is_empty() {
        panic!(
            "Contract test '{}' failed: invariants not enforced: {:?}",
            test_name, missing
        );
    }
}

#[cfg(not(feature = "ppt"))]
/// Contract test: no-op when PPT feature is disabled.
pub fn contract_test(_test_name: &str, _required_invariants: &[u32]) {}

#[cfg(feature = "ppt")]
/// Clear invariant log (for between test runs).
pub fn clear_invariant_log() {
    INVARIANT_LOG
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clear();
}

#[cfg(not(feature = "ppt"))]
/// Clear invariant log: no-op when PPT feature is disabled.
pub fn clear_invariant_log() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_invariant_pass() {
        assert_invariant(0, 1 + 1 == 2, "Math works", Some("basic"));
    }

    #[test]
    #[should_panic(expected = "Invariant")]
    fn test_assert_invariant_fail() {
        assert_invariant(0, 1 + 1 == 3, "Math broken", None);
    }

    #[test]
    fn test_contract_test_sees_asserted_ids() {
        assert_invariant(TRACE_ALIGNED, true, "probe lengths agree", None);
        contract_test("trace alignment", &[TRACE_ALIGNED]);
    }

    #[cfg(feature = "ppt")]
    #[test]
    #[should_panic(expected = "invariants not enforced")]
    fn test_contract_test_reports_missing() {
        contract_test("never asserted", &[u32::MAX]);
    }
}
