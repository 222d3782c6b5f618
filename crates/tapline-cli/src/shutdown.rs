//! Graceful shutdown: SIGINT/SIGTERM set a flag the drain loop checks between records

use std::sync::atomic::{AtomicBool, Ordering};

/// Exit status after a second signal (128 + SIGINT)
const FORCED_EXIT_CODE: i32 = 130;

/// Global shutdown flag, set by the signal handlers
pub fn shutdown_flag() -> &'static AtomicBool {
    static FLAG: AtomicBool = AtomicBool::new(false);
    &FLAG
}

pub fn is_shutdown_requested() -> bool {
    shutdown_flag().load(Ordering::Relaxed)
}

/// Record a signal on `flag`; true when one had already been seen.
fn signal_seen(flag: &AtomicBool) -> bool {
    flag.swap(true, Ordering::Relaxed)
}

/// First signal requests a graceful stop; a second one exits immediately.
pub fn install_handlers() -> std::io::Result<()> {
    for signal in [signal_hook::consts::SIGTERM, signal_hook::consts::SIGINT] {
        // SAFETY: the handler only swaps an atomic and may call
        // `low_level::exit`, which is `_exit` and async-signal-safe.
        unsafe {
            signal_hook::low_level::register(signal, || {
                if signal_seen(shutdown_flag()) {
                    signal_hook::low_level::exit(FORCED_EXIT_CODE);
                }
            })?;
        }
    }
    Ok(())
}
