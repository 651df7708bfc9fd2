//! Chaos/failpoint hooks (feature: `failpoints`).
//!
//! The macro expands to nothing unless the feature is enabled. When enabled,
//! a point panics if it was armed with [`arm`], either by bare name
//! (`"unit.process_row"`) or scoped to one step (`"unit.process_row@filter"`).

#[cfg(feature = "failpoints")]
use std::collections::HashSet;
#[cfg(feature = "failpoints")]
use std::sync::{Mutex, OnceLock, PoisonError};

#[cfg(feature = "failpoints")]
fn armed() -> &'static Mutex<HashSet<String>> {
    static ARMED: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    ARMED.get_or_init(|| Mutex::new(HashSet::new()))
}

#[cfg(feature = "failpoints")]
pub fn arm(point: &str) {
    armed()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(point.to_string());
}

#[cfg(feature = "failpoints")]
pub fn disarm(point: &str) {
    armed()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(point);
}

#[cfg(feature = "failpoints")]
pub fn is_armed(point: &str, step: &str) -> bool {
    let set = armed().lock().unwrap_or_else(PoisonError::into_inner);
    set.contains(point) || set.contains(&format!("{point}@{step}"))
}

#[cfg(feature = "failpoints")]
#[macro_export]
macro_rules! fail_point {
    ($name:expr, $step:expr) => {{
        if $crate::failpoints::is_armed($name, $step) {
            panic!("failpoint triggered: {}@{}", $name, $step);
        }
    }};
}

#[cfg(not(feature = "failpoints"))]
#[macro_export]
macro_rules! fail_point {
    ($name:expr, $step:expr) => {
        let _ = (&$name, &$step);
    };
}
