use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Install a Ctrl-C handler that asks the bundler to stop between blobs.
/// A second Ctrl-C exits at once.
///
/// Returns `false` when the handler could not be installed; the run then
/// cannot be interrupted cleanly.
pub fn install_signal_handler() -> bool {
    let installed = ctrlc::set_handler(move || {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            std::process::exit(130);
        }
        SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
        eprintln!("\ninterrupt received, discarding partial archive...");
    });
    match installed {
        Ok(()) => true,
        Err(e) => {
            warn!("cannot install Ctrl-C handler: {e}");
            false
        }
    }
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_shutdown_by_default() {
        assert!(!shutdown_requested());
    }

    #[test]
    fn second_install_reports_failure() {
        assert!(install_signal_handler());
        assert!(!install_signal_handler());
        assert!(!shutdown_requested());
    }
}
