use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::thread::{self, ThreadId};
use lazy_static::lazy_static;
use log::{error, info};

/// The build directories are all attempted, in order, before the packaging tool runs.
pub const CLEANUP_PRECEDES_PACKAGING: &str = "Every build directory is cleaned before packaging";

/// Past the existence check the artifact was a regular file (at that moment).
pub const LAUNCH_TARGET_IS_FILE: &str = "Launch target is a regular file when checked";

lazy_static! {
    /// Invariant descriptions that have been asserted and held, per thread, so
    /// concurrent test threads never see or clear each other's records.
    static ref CHECKED_INVARIANTS: Mutex<HashMap<ThreadId, HashSet<String>>> = Mutex::new(HashMap::new());
}

/// Asserts an invariant of the packaging or launch workflow.
///
/// A violation is logged, and panics in debug and test builds so it is caught early.
/// A pass is recorded so `contract_test` can prove the check actually ran.
pub fn assert_invariant(condition: bool, description: &str, component: Option<&str>) {
    if !condition {
        let msg = format!(
            "INVARIANT VIOLATION [{}]: {}",
            component.unwrap_or("General"),
            description
        );
        error!("{}", msg);

        if cfg!(debug_assertions) || cfg!(test) {
            panic!("{}", msg);
        }
    } else {
        let mut ledger = CHECKED_INVARIANTS.lock().unwrap_or_else(|e| e.into_inner());
        ledger
            .entry(thread::current().id())
            .or_default()
            .insert(description.to_string());
    }
}

/// Panics unless every invariant in `required` was asserted on this thread.
#[allow(dead_code)]
pub fn contract_test(context: &str, required: &[&str]) {
    let missing: Vec<&str> = {
        let ledger = CHECKED_INVARIANTS.lock().unwrap_or_else(|e| e.into_inner());
        let checked = ledger.get(&thread::current().id());
        required
            .iter()
            .copied()
            .filter(|req| !checked.is_some_and(|set| set.contains(*req)))
            .collect()
    };

    if !missing.is_empty() {
        panic!(
            "Contract Test Failed for '{}'. The following invariants were NOT checked:\n{:#?}",
            context, missing
        );
    }
    info!("Contract Test Passed: {}", context);
}

/// Forgets what this thread has asserted. Call before an isolated run.
#[allow(dead_code)]
pub fn clear_invariant_log() {
    let mut ledger = CHECKED_INVARIANTS.lock().unwrap_or_else(|e| e.into_inner());
    ledger.remove(&thread::current().id());
}
