//! Diagnostic logging for greenroom internals.
//!
//! Off by default. Call `set_diagnostics(true)` (the CLI wires this to
//! `--verbose`) and use the `diag!()` macro to trace session internals.

use std::sync::atomic::{AtomicBool, Ordering};

static DIAGNOSTICS: AtomicBool = AtomicBool::new(false);

/// Enable or disable diagnostic output.
pub fn set_diagnostics(enabled: bool) {
    DIAGNOSTICS.store(enabled, Ordering::SeqCst);
}

/// Check whether diagnostic output is enabled.
pub fn diagnostics_enabled() -> bool {
    DIAGNOSTICS.load(Ordering::SeqCst)
}

/// Log a formatted message when diagnostics are enabled.
#[macro_export]
macro_rules! diag {
    ($($arg:tt)*) => {
        if $crate::diag::diagnostics_enabled() {
            eprintln!("[greenroom] {}", format!($($arg)*));
        }
    };
}
